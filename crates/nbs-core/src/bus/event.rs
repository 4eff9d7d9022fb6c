//! Event file content and filenames.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{Priority, EVENT_SUFFIX};

/// Parsed content of an event file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub priority: Priority,
    pub timestamp: String,
    pub dedup_key: String,
    pub payload: Option<String>,
}

impl Event {
    /// Render the YAML-ish body. A non-empty payload becomes a literal block
    /// with every line indented by two spaces.
    pub fn render(&self) -> String {
        let mut out = format!(
            "source: {}\ntype: {}\npriority: {}\ntimestamp: {}\ndedup-key: {}\n",
            self.source, self.event_type, self.priority, self.timestamp, self.dedup_key
        );
        if let Some(payload) = self.payload.as_deref().filter(|p| !p.is_empty()) {
            out.push_str("payload: |\n");
            for line in payload.split_inclusive('\n') {
                out.push_str("  ");
                out.push_str(line);
            }
            if !payload.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }

    /// Parse an event body. Missing fields come back empty, a missing or
    /// unknown priority as `normal`. The first occurrence of a key wins.
    pub fn parse(text: &str) -> Event {
        let mut event = Event {
            source: String::new(),
            event_type: String::new(),
            priority: Priority::Normal,
            timestamp: String::new(),
            dedup_key: String::new(),
            payload: None,
        };
        let mut seen = [false; 5];
        let mut lines = text.lines();
        while let Some(line) = lines.next() {
            if line == "payload: |" {
                let body: Vec<&str> = lines
                    .by_ref()
                    .map(|l| l.strip_prefix("  ").unwrap_or(l))
                    .collect();
                event.payload = Some(body.join("\n"));
                break;
            }
            let Some((key, value)) = line.split_once(": ") else {
                continue;
            };
            let slot = match key {
                "source" => 0,
                "type" => 1,
                "priority" => 2,
                "timestamp" => 3,
                "dedup-key" => 4,
                _ => continue,
            };
            if std::mem::replace(&mut seen[slot], true) {
                continue;
            }
            match slot {
                0 => event.source = value.to_string(),
                1 => event.event_type = value.to_string(),
                2 => event.priority = value.parse().unwrap_or(Priority::Normal),
                3 => event.timestamp = value.to_string(),
                _ => event.dedup_key = value.to_string(),
            }
        }
        event
    }
}

/// `<us>-<source>-<type>-<pid>.event`
pub(crate) fn event_filename(ts_us: i64, source: &str, event_type: &str, pid: u32) -> String {
    format!("{ts_us}-{source}-{event_type}-{pid}{EVENT_SUFFIX}")
}

/// `.tmp-<us>-<pid>.event`; the leading dot keeps it out of listings.
pub(crate) fn temp_filename(ts_us: i64, pid: u32) -> String {
    format!(".tmp-{ts_us}-{pid}{EVENT_SUFFIX}")
}

static EVENT_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)-.+\.event$").unwrap());

/// Microsecond timestamp embedded in an event filename, if it is one.
pub(crate) fn filename_timestamp(name: &str) -> Option<i64> {
    EVENT_FILENAME
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}
