//! `@handle` and `@handle!` extraction from chat content.
//!
//! Works on bytes, not chars; every byte value, including 0x80-0xFF, is a
//! valid input to the ASCII class checks below.

use crate::chat::MAX_HANDLE_LEN;

/// Most mentions taken from one message; the rest are ignored.
pub const MAX_MENTIONS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub handle: String,
    /// `@handle!`: the sender wants the target interrupted.
    pub interrupt: bool,
}

fn is_handle_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Bytes that can end an email local part, e.g. the `r` in `user@host`.
fn is_email_prefix_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-' | b'+')
}

/// Mentions in `message`, left to right, first occurrence of each handle only.
pub fn extract_mentions(message: &str) -> Vec<Mention> {
    let bytes = message.as_bytes();
    let mut found: Vec<Mention> = Vec::new();
    let mut i = 0;

    while i < bytes.len() && found.len() < MAX_MENTIONS {
        if bytes[i] != b'@' || (i > 0 && is_email_prefix_byte(bytes[i - 1])) {
            i += 1;
            continue;
        }
        let start = i + 1;
        let len = bytes[start..]
            .iter()
            .take_while(|&&b| is_handle_byte(b))
            .count();
        if len == 0 {
            i += 1;
            continue;
        }
        let end = start + len;
        if len <= MAX_HANDLE_LEN {
            // handle bytes are ASCII, so these are char boundaries
            let handle = &message[start..end];
            if !found.iter().any(|m| m.handle == handle) {
                found.push(Mention {
                    handle: handle.to_string(),
                    interrupt: bytes.get(end) == Some(&b'!'),
                });
            }
        }
        i = end;
    }

    assert!(found.len() <= MAX_MENTIONS);
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handles(message: &str) -> Vec<(String, bool)> {
        extract_mentions(message)
            .into_iter()
            .map(|m| (m.handle, m.interrupt))
            .collect()
    }

    fn h(handle: &str, interrupt: bool) -> (String, bool) {
        (handle.to_string(), interrupt)
    }

    #[test]
    fn mentions_and_interrupts() {
        assert_eq!(
            handles("hi @bob and @carol!"),
            [h("bob", false), h("carol", true)]
        );
    }

    #[test]
    fn start_of_message_and_punctuation() {
        assert_eq!(
            handles("@alice, (@bob) \"@carol\":@dave"),
            [h("alice", false), h("bob", false), h("carol", false), h("dave", false)]
        );
    }

    #[test]
    fn email_addresses_are_not_mentions() {
        assert!(handles("mail user@example.com or a.b+c@d.org or x_y@z or q-r@s").is_empty());
    }

    #[test]
    fn handle_characters() {
        assert_eq!(
            handles("@worker_2-b.done @x/y"),
            [h("worker_2-b", false), h("x", false)]
        );
        assert!(handles("@ lone @! @.").is_empty());
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        assert_eq!(handles("@bob @bob! @bob"), [h("bob", false)]);
        assert_eq!(handles("@bob! @bob"), [h("bob", true)]);
    }

    #[test]
    fn high_bytes_do_not_suppress() {
        assert_eq!(handles("caf\u{e9}@bob"), [h("bob", false)]);
        assert_eq!(handles("\u{1f600}@bob \u{ff}@amy"), [h("bob", false), h("amy", false)]);
        assert_eq!(handles("@bob\u{e9}"), [h("bob", false)]);
    }

    #[test]
    fn overlong_handles_are_skipped() {
        let long = "a".repeat(MAX_HANDLE_LEN + 1);
        let exact = "b".repeat(MAX_HANDLE_LEN);
        assert_eq!(
            handles(&format!("@{long} @{exact}")),
            [h(&exact, false)]
        );
    }

    #[test]
    fn caps_at_max_mentions() {
        let message: String = (0..MAX_MENTIONS + 4).map(|i| format!("@h{i} ")).collect();
        let found = extract_mentions(&message);
        assert_eq!(found.len(), MAX_MENTIONS);
        assert_eq!(found[MAX_MENTIONS - 1].handle, format!("h{}", MAX_MENTIONS - 1));
    }

    #[test]
    fn double_at() {
        assert_eq!(handles("@@bob"), [h("bob", false)]);
    }
}
