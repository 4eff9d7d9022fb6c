//! Atomic event publication, with optional deduplication.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicI64, Ordering};

use log::debug;

use crate::clock;
use crate::lock::FileLock;

use super::event::{event_filename, filename_timestamp, temp_filename, Event};
use super::{
    ensure_processed, require_dir, validate_token, BusError, Priority, EVENT_SUFFIX,
    MAX_PAYLOAD_LEN,
};

/// Highest timestamp handed out by this process.
static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Current time in microseconds, strictly greater than any earlier result
/// in this process, so `(timestamp, pid)` filenames never collide.
fn next_timestamp() -> i64 {
    let now = clock::now_micros();
    let mut last = LAST_TIMESTAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(last.saturating_add(1));
        match LAST_TIMESTAMP.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Carries the new event's filename.
    Published(String),
    /// An event with the same dedup key is already pending within the window.
    Deduplicated,
}

fn validate(source: &str, event_type: &str, payload: &str) -> Result<(), BusError> {
    validate_token("source", source)?;
    validate_token("type", event_type)?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(BusError::InvalidArgument(format!(
            "payload is {} bytes, limit is {MAX_PAYLOAD_LEN}",
            payload.len()
        )));
    }
    Ok(())
}

/// Publish one event and return its filename.
///
/// The body is written to `.tmp-<us>-<pid>.event` and renamed into place;
/// the rename is the commit point. `processed/` is created if missing.
pub fn publish(
    dir: &Path,
    source: &str,
    event_type: &str,
    priority: Priority,
    payload: &str,
) -> Result<String, BusError> {
    validate(source, event_type, payload)?;
    require_dir(dir)?;
    ensure_processed(dir)?;

    let ts = next_timestamp();
    let pid = process::id();
    let filename = event_filename(ts, source, event_type, pid);
    let event = Event {
        source: source.to_string(),
        event_type: event_type.to_string(),
        priority,
        timestamp: clock::iso_utc_micros(ts),
        dedup_key: format!("{source}:{event_type}"),
        payload: (!payload.is_empty()).then(|| payload.to_string()),
    };

    let temp = dir.join(temp_filename(ts, pid));
    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&temp)?;
        file.write_all(event.render().as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp, dir.join(&filename))
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }

    debug!("published {} to {}", filename, dir.display());
    Ok(filename)
}

/// Publish unless an event with key `source:type` is pending and was
/// published within `window_us` microseconds. A window of 0 never dedups.
///
/// The scan and the publish run under `<dir>/.publish.lock`, so concurrent
/// callers cannot both pass the check.
pub fn publish_dedup(
    dir: &Path,
    source: &str,
    event_type: &str,
    priority: Priority,
    payload: &str,
    window_us: i64,
) -> Result<PublishOutcome, BusError> {
    validate(source, event_type, payload)?;
    if window_us < 0 {
        return Err(BusError::InvalidArgument(format!(
            "dedup window must not be negative: {window_us}"
        )));
    }
    if window_us == 0 {
        return publish(dir, source, event_type, priority, payload).map(PublishOutcome::Published);
    }
    require_dir(dir)?;

    let lock = FileLock::acquire(&dir.join(".publish"))?;
    let key = format!("{source}:{event_type}");
    let cutoff = clock::now_micros().saturating_sub(window_us);
    let outcome = if has_recent(dir, &key, cutoff)? {
        debug!("dedup: {key} dropped (duplicate within window)");
        PublishOutcome::Deduplicated
    } else {
        PublishOutcome::Published(publish(dir, source, event_type, priority, payload)?)
    };
    lock.release();
    Ok(outcome)
}

/// Is a pending event with `dedup-key: key` stamped at or after `cutoff_us`?
fn has_recent(dir: &Path, key: &str, cutoff_us: i64) -> Result<bool, BusError> {
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(EVENT_SUFFIX) {
            continue;
        }
        match filename_timestamp(name) {
            Some(ts) if ts >= cutoff_us => {}
            _ => continue,
        }
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let Ok(text) = fs::read_to_string(entry.path()) else {
            continue;
        };
        if Event::parse(&text).dedup_key == key {
            return Ok(true);
        }
    }
    Ok(false)
}

// ============================================================================
// TESTS
// ============================================================================
