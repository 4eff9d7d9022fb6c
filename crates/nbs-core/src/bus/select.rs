//! Listing, reading and acknowledging pending events.

use std::fs;
use std::io;
use std::path::Path;

use log::{debug, warn};
use serde::Serialize;

use super::event::{filename_timestamp, Event};
use super::{ensure_processed, require_dir, validate_event_name, BusError, Priority};

/// One pending event as shown by `check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    pub filename: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub priority: Priority,
    pub timestamp_us: i64,
}

/// Every `.event` regular file in `dir` whose name carries a timestamp.
/// Unreadable files and other names are skipped.
pub(crate) fn scan(dir: &Path) -> Result<Vec<EventSummary>, BusError> {
    let mut events = Vec::new();
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(timestamp_us) = filename_timestamp(name) else {
            continue;
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let Ok(text) = fs::read_to_string(entry.path()) else {
            continue;
        };
        let event = Event::parse(&text);
        events.push(EventSummary {
            filename: name.to_string(),
            source: event.source,
            event_type: event.event_type,
            priority: event.priority,
            timestamp_us,
        });
    }
    Ok(events)
}

/// Pending events ordered by priority, then timestamp, then filename.
///
/// `source` restricts the result to events whose content names that source.
pub fn list(dir: &Path, source: Option<&str>) -> Result<Vec<EventSummary>, BusError> {
    require_dir(dir)?;
    let mut events = scan(dir)?;
    if let Some(source) = source.filter(|s| !s.is_empty()) {
        events.retain(|e| e.source == source);
    }
    events.sort_by(|a, b| {
        (a.priority, a.timestamp_us, &a.filename).cmp(&(b.priority, b.timestamp_us, &b.filename))
    });
    assert!(
        events
            .windows(2)
            .all(|w| (w[0].priority, w[0].timestamp_us) <= (w[1].priority, w[1].timestamp_us)),
        "event listing out of order"
    );
    Ok(events)
}

/// Raw bytes of the pending event `name`.
pub fn read(dir: &Path, name: &str) -> Result<Vec<u8>, BusError> {
    validate_event_name(name)?;
    require_dir(dir)?;
    let path = dir.join(name);
    if !path.is_file() {
        return Err(BusError::EventNotFound(name.to_string()));
    }
    match fs::read(&path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(BusError::EventNotFound(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Move the pending event `name` into `processed/`.
pub fn ack(dir: &Path, name: &str) -> Result<(), BusError> {
    validate_event_name(name)?;
    require_dir(dir)?;
    let source = dir.join(name);
    if !source.is_file() {
        return Err(BusError::EventNotFound(name.to_string()));
    }
    let processed = ensure_processed(dir)?;
    match fs::rename(&source, processed.join(name)) {
        Ok(()) => {
            debug!("acked {name}");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(BusError::EventNotFound(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Acknowledge every pending event, or only those from `source`.
/// Returns how many were moved.
pub fn ack_all(dir: &Path, source: Option<&str>) -> Result<usize, BusError> {
    let mut acked = 0;
    for event in list(dir, source)? {
        match ack(dir, &event.filename) {
            Ok(()) => acked += 1,
            // another consumer got there first
            Err(BusError::EventNotFound(_)) => {}
            Err(e) => warn!("cannot acknowledge {}: {}", event.filename, e),
        }
    }
    Ok(acked)
}

// ============================================================================
// TESTS
// ============================================================================
