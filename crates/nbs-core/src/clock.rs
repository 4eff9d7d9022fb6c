//! Wall-clock helpers.
//!
//! Chat headers carry local time with a numeric offset, while message
//! prefixes and event files carry UTC with a `Z` suffix. Both formats are
//! part of the on-disk interface.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Current time in microseconds since the Unix epoch.
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Current time in whole seconds since the Unix epoch.
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Format epoch seconds as `2026-02-04T10:15:30Z`.
pub fn iso_utc(secs: i64) -> String {
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(dt) => dt.format(UTC_FORMAT).to_string(),
        None => "1970-01-01T00:00:00Z".to_string(),
    }
}

/// Format epoch microseconds as UTC, dropping the sub-second part.
pub fn iso_utc_micros(micros: i64) -> String {
    iso_utc(micros.div_euclid(1_000_000))
}

/// Current local time with numeric offset, e.g. `2026-02-04T11:15:30+0100`.
pub fn iso_local_now() -> String {
    Local::now().format(LOCAL_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` string back to epoch seconds.
pub fn parse_iso_utc(s: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(s, UTC_FORMAT)
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}

/// Human age, coarsest unit wins: `42s ago`, `3m ago`, `5h ago`, `2d ago`.
pub fn format_age(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}
