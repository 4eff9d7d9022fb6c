//! Chat header fields and the self-referential `file-length` solver.

use log::warn;

use super::Participant;

pub(crate) const MARKER: &str = "=== nbs-chat ===";
pub(crate) const DELIMITER: &str = "---";

/// Bytes of the `file-length` line excluding its digits.
const FILE_LENGTH_OVERHEAD: u64 = "file-length: \n".len() as u64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Header {
    pub last_writer: String,
    pub last_write: String,
    pub file_length: u64,
    pub participants: Vec<Participant>,
}

impl Header {
    /// Apply one `key: value` header line. Unknown keys are ignored.
    pub fn apply_line(&mut self, line: &str) {
        let Some((key, value)) = line.split_once(": ").or_else(|| {
            // `participants:` with the trailing space stripped
            line.strip_suffix(':').map(|key| (key, ""))
        }) else {
            return;
        };
        match key {
            "last-writer" => self.last_writer = value.to_string(),
            "last-write" => self.last_write = value.to_string(),
            "file-length" => match value.trim().parse() {
                Ok(n) => self.file_length = n,
                Err(_) => warn!("ignoring malformed file-length {value:?}"),
            },
            "participants" => self.participants = parse_participants(value),
            _ => {}
        }
    }

    /// Record one more message by `handle`, appending it if new.
    pub fn bump(&mut self, handle: &str) {
        match self.participants.iter_mut().find(|p| p.handle == handle) {
            Some(p) => p.count += 1,
            None => self.participants.push(Participant {
                handle: handle.to_string(),
                count: 1,
            }),
        }
    }

    fn render_fields(&self, with_length: bool) -> String {
        let mut out = String::new();
        out.push_str(MARKER);
        out.push('\n');
        out.push_str(&format!("last-writer: {}\n", self.last_writer));
        out.push_str(&format!("last-write: {}\n", self.last_write));
        if with_length {
            out.push_str(&format!("file-length: {}\n", self.file_length));
        }
        out.push_str(&format!(
            "participants: {}\n",
            format_participants(&self.participants)
        ));
        out.push_str(DELIMITER);
        out.push('\n');
        out
    }

    /// Render the complete file: header plus one line per encoded message.
    ///
    /// Sets `file_length` to the solved total before rendering it.
    pub fn render_file(&mut self, lines: &[String]) -> String {
        let body: usize = lines.iter().map(|l| l.len() + 1).sum();
        let base = (self.render_fields(false).len() + body) as u64;
        self.file_length = solve_file_length(base);

        let mut out = self.render_fields(true);
        out.reserve(body);
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
        assert_eq!(
            out.len() as u64,
            self.file_length,
            "rendered chat size disagrees with solved file-length"
        );
        out
    }
}

/// `alice(2), bob(1)`
pub(crate) fn format_participants(participants: &[Participant]) -> String {
    participants
        .iter()
        .map(|p| format!("{}({})", p.handle, p.count))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn parse_participants(value: &str) -> Vec<Participant> {
    let mut out = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let parsed = entry
            .strip_suffix(')')
            .and_then(|e| e.rsplit_once('('))
            .and_then(|(handle, count)| Some((handle, count.parse::<u64>().ok()?)));
        match parsed {
            Some((handle, count)) if !handle.is_empty() => out.push(Participant {
                handle: handle.to_string(),
                count,
            }),
            _ => warn!("ignoring malformed participant entry {entry:?}"),
        }
    }
    out
}

fn decimal_digits(mut n: u64) -> u64 {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Total file size when `base` bytes of content gain a `file-length` line.
///
/// The value counts its own digits, so a width change can push it across a
/// power of ten; iterate to the fixed point.
pub(crate) fn solve_file_length(base: u64) -> u64 {
    let mut candidate = base + FILE_LENGTH_OVERHEAD + 1;
    for _ in 0..4 {
        let next = base + FILE_LENGTH_OVERHEAD + decimal_digits(candidate);
        if next == candidate {
            return candidate;
        }
        candidate = next;
    }
    panic!("file-length did not converge for base size {base}");
}
