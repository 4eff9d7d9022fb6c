//! Chat-to-bus bridge.
//!
//! After a message lands in a chat file, the bridge looks for an events
//! directory near the chat and publishes:
//!
//! 1. `chat-message` (normal): `handle: content`
//! 2. per `@name` mention, `chat-mention` (high), or `chat-interrupt`
//!    (critical) for `@name!`: `@name from handle: content`
//!
//! Publication is an in-process call into [`crate::bus`]. Nothing is written
//! to stdout, and no failure here ever reaches the chat caller.

mod discovery;
mod mentions;

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::bus::{self, Priority};

pub use discovery::{find_events_dir, MAX_DISCOVERY_DEPTH};
pub use mentions::{extract_mentions, Mention, MAX_MENTIONS};

/// Event source used for chat-derived events.
pub const CHAT_SOURCE: &str = "nbs-chat";

/// Event source used by the interactive terminal front end.
pub const TERMINAL_SOURCE: &str = "nbs-chat-terminal";

/// Payloads are cut to this many bytes; the full text stays in the chat.
pub const MAX_BRIDGE_PAYLOAD: usize = 2048;

/// What one bridge run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeReport {
    /// `None` when no events directory was found.
    pub events_dir: Option<PathBuf>,
    pub published: usize,
    pub failed: usize,
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn emit(
    report: &mut BridgeReport,
    dir: &Path,
    source: &str,
    event_type: &str,
    priority: Priority,
    payload: &str,
) {
    match bus::publish(dir, source, event_type, priority, truncate(payload, MAX_BRIDGE_PAYLOAD)) {
        Ok(name) => {
            debug!("bridge published {name}");
            report.published += 1;
        }
        Err(e) => {
            warn!("bridge: cannot publish {event_type} to {}: {e}", dir.display());
            report.failed += 1;
        }
    }
}

/// Publish the events derived from a message `handle` just wrote to `chat_path`.
pub fn after_send(chat_path: &Path, handle: &str, content: &str) -> BridgeReport {
    let Some(dir) = find_events_dir(chat_path) else {
        return BridgeReport::default();
    };
    let mut report = BridgeReport {
        events_dir: Some(dir.clone()),
        ..BridgeReport::default()
    };

    emit(
        &mut report,
        &dir,
        CHAT_SOURCE,
        "chat-message",
        Priority::Normal,
        &format!("{handle}: {content}"),
    );

    for mention in extract_mentions(content) {
        let (event_type, priority) = if mention.interrupt {
            ("chat-interrupt", Priority::Critical)
        } else {
            ("chat-mention", Priority::High)
        };
        emit(
            &mut report,
            &dir,
            CHAT_SOURCE,
            event_type,
            priority,
            &format!("@{} from {handle}: {content}", mention.handle),
        );
    }

    report
}

/// Publish a `human-input` event for a message typed at the terminal.
pub fn human_input(chat_path: &Path, handle: &str, content: &str) -> BridgeReport {
    let Some(dir) = find_events_dir(chat_path) else {
        return BridgeReport::default();
    };
    let mut report = BridgeReport {
        events_dir: Some(dir.clone()),
        ..BridgeReport::default()
    };
    emit(
        &mut report,
        &dir,
        TERMINAL_SOURCE,
        "human-input",
        Priority::High,
        &format!("{handle}: {content}"),
    );
    report
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{list, read, Event};
    use crate::chat;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    /// `<root>/.nbs/{chat,events}` with an empty chat file.
    fn project() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let root = tempdir().unwrap();
        let chat_dir = root.path().join(".nbs/chat");
        let events = root.path().join(".nbs/events");
        fs::create_dir_all(&chat_dir).unwrap();
        fs::create_dir_all(&events).unwrap();
        let chat = chat_dir.join("team.chat");
        chat::create(&chat).unwrap();
        (root, chat, events)
    }

    fn events_in(dir: &Path) -> Vec<Event> {
        list(dir, None)
            .unwrap()
            .iter()
            .map(|e| Event::parse(&String::from_utf8(read(dir, &e.filename).unwrap()).unwrap()))
            .collect()
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("h\u{e9}llo", 2), "h");
    }

    mod after_send {
        use super::*;

        #[test]
        fn message_mention_and_interrupt() {
            let (_root, chat, events) = project();
            let sent = chat::send(&chat, "alice", "hi @bob and @carol! mail user@example.com")
                .unwrap();
            assert_eq!(sent.bridge.published, 3);
            assert_eq!(sent.bridge.failed, 0);

            let got = events_in(&events);
            assert_eq!(got.len(), 3);
            // listing order: critical, high, normal
            assert_eq!(got[0].event_type, "chat-interrupt");
            assert_eq!(got[0].priority, Priority::Critical);
            assert_eq!(
                got[0].payload.as_deref(),
                Some("@carol from alice: hi @bob and @carol! mail user@example.com")
            );
            assert_eq!(got[1].event_type, "chat-mention");
            assert_eq!(got[1].priority, Priority::High);
            assert!(got[1].payload.as_deref().unwrap().starts_with("@bob from alice: "));
            assert_eq!(got[2].event_type, "chat-message");
            assert_eq!(got[2].priority, Priority::Normal);
            assert!(got.iter().all(|e| e.source == CHAT_SOURCE));
        }

        #[test]
        fn no_events_dir_is_a_noop() {
            let root = tempdir().unwrap();
            let chat = root.path().join("lonely.chat");
            chat::create(&chat).unwrap();
            let report = after_send(&chat, "alice", "@bob hi");
            assert_eq!(report, BridgeReport::default());
        }

        #[test]
        fn long_payload_is_truncated() {
            let (_root, chat, events) = project();
            let content = "x".repeat(MAX_BRIDGE_PAYLOAD * 2);
            after_send(&chat, "alice", &content);
            let got = events_in(&events);
            assert_eq!(got.len(), 1);
            assert_eq!(got[0].payload.as_ref().unwrap().len(), MAX_BRIDGE_PAYLOAD);
        }

        #[test]
        fn read_only_events_dir_never_fails_send() {
            let (_root, chat, events) = project();
            fs::create_dir_all(events.join("processed")).unwrap();
            fs::set_permissions(&events, fs::Permissions::from_mode(0o555)).unwrap();

            let sent = chat::send(&chat, "alice", "hi @bob");
            fs::set_permissions(&events, fs::Permissions::from_mode(0o755)).unwrap();

            let sent = sent.unwrap();
            assert_eq!(sent.index, 0);
            // root ignores directory permissions, so only check the totals add up
            assert_eq!(sent.bridge.published + sent.bridge.failed, 2);
            assert_eq!(chat::read(&chat).unwrap().messages.len(), 1);
        }
    }

    #[test]
    fn human_input_event() {
        let (_root, chat, events) = project();
        let report = human_input(&chat, "alice", "typed this");
        assert_eq!(report.published, 1);
        let got = events_in(&events);
        assert_eq!(got[0].source, TERMINAL_SOURCE);
        assert_eq!(got[0].event_type, "human-input");
        assert_eq!(got[0].priority, Priority::High);
        assert_eq!(got[0].payload.as_deref(), Some("alice: typed this"));
    }
}
