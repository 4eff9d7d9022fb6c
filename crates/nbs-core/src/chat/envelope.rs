//! Message line envelope: base64 of `[<UTC>] handle: content`.

use crate::clock;
use crate::codec;

use super::ChatMessage;

/// Encode one message line (no trailing newline).
pub(crate) fn encode_message(handle: &str, content: &str, timestamp: i64) -> String {
    let payload = format!("[{}] {handle}: {content}", clock::iso_utc(timestamp));
    codec::encode(payload.as_bytes())
}

/// Decode one message line. Returns `None` for anything that is not a message.
pub(crate) fn decode_line(line: &str) -> Option<ChatMessage> {
    let bytes = codec::decode(line).ok()?;
    parse_payload(&String::from_utf8_lossy(&bytes))
}

/// Split a decoded payload into handle, content and timestamp.
///
/// Accepted shapes, newest first:
/// - `[2026-02-04T10:15:30Z] alice: hi`
/// - `alice|1770200130: hi`
/// - `alice: hi` (timestamp 0)
pub(crate) fn parse_payload(text: &str) -> Option<ChatMessage> {
    let (mut timestamp, rest) = split_prefix(text);
    let (mut handle, content) = rest.split_once(": ")?;

    if timestamp == 0 {
        if let Some((name, epoch)) = handle.split_once('|') {
            if let Ok(secs) = epoch.parse::<i64>() {
                handle = name;
                timestamp = secs;
            }
        }
    }
    if handle.is_empty() {
        return None;
    }

    Some(ChatMessage {
        handle: handle.to_string(),
        content: content.to_string(),
        timestamp,
    })
}

fn split_prefix(text: &str) -> (i64, &str) {
    text.strip_prefix('[')
        .and_then(|t| t.split_once("] "))
        .and_then(|(ts, rest)| Some((clock::parse_iso_utc(ts)?, rest)))
        .unwrap_or((0, text))
}
