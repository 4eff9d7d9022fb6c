//! Directory-as-queue event bus.
//!
//! Pending events are `.event` files at the top of the events directory;
//! acknowledging one renames it into `processed/`, and retention prunes
//! `processed/` oldest-first. Event content is authoritative; the filename
//! only carries the microsecond timestamp used for ordering.
//!
//! ## Layout
//!
//! ```text
//! <dir>/
//!   config.yaml                optional
//!   <us>-<source>-<type>-<pid>.event
//!   .tmp-<us>-<pid>.event      in-flight publish
//!   processed/
//!     <us>-<source>-<type>-<pid>.event
//! ```

mod config;
mod event;
mod publish;
mod retention;
mod select;

use std::fmt;
use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::exit;
use crate::lock::LockError;

pub use config::{BusConfig, DEFAULT_RETENTION_BYTES, MAX_WINDOW_SECS};
pub use event::Event;
pub use publish::{publish, publish_dedup, PublishOutcome};
pub use retention::{prune, status, BusStatus, PruneReport};
pub use select::{ack, ack_all, list, read, EventSummary};

/// Longest accepted `source` or `type`, in bytes.
pub const MAX_TOKEN_LEN: usize = 128;

/// Largest accepted payload, in bytes.
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024;

pub(crate) const PROCESSED_DIR: &str = "processed";
pub(crate) const EVENT_SUFFIX: &str = ".event";

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Events directory not found: {}", .0.display())]
    DirNotFound(PathBuf),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    pub fn exit_code(&self) -> i32 {
        match self {
            BusError::InvalidArgument(_) => exit::INVALID_ARGS,
            BusError::DirNotFound(_) => exit::NOT_FOUND,
            BusError::EventNotFound(_) => exit::EVENT_NOT_FOUND,
            BusError::Lock(_) | BusError::Io(_) => exit::FAILURE,
        }
    }
}

/// Event priority. Lower rank sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    pub fn rank(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            other => Err(BusError::InvalidArgument(format!(
                "priority must be critical, high, normal or low, got {other:?}"
            ))),
        }
    }
}

/// Check a `source` or `type` token: non-empty, bounded, no whitespace.
pub fn validate_token(kind: &str, value: &str) -> Result<(), BusError> {
    if value.is_empty() {
        return Err(BusError::InvalidArgument(format!("{kind} is empty")));
    }
    if value.len() > MAX_TOKEN_LEN {
        return Err(BusError::InvalidArgument(format!(
            "{kind} is {} bytes, limit is {MAX_TOKEN_LEN}",
            value.len()
        )));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(BusError::InvalidArgument(format!(
            "{kind} must not contain whitespace: {value:?}"
        )));
    }
    if value.contains('/') {
        return Err(BusError::InvalidArgument(format!(
            "{kind} must not contain '/': {value:?}"
        )));
    }
    Ok(())
}

/// Refuse anything but a bare file name before a path is ever built from it.
pub fn validate_event_name(name: &str) -> Result<(), BusError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0')
    {
        return Err(BusError::InvalidArgument(format!(
            "invalid event filename (path traversal): {name:?}"
        )));
    }
    Ok(())
}

/// Create `<dir>/processed` with mode 0755 unless it already exists.
pub(crate) fn ensure_processed(dir: &Path) -> Result<PathBuf, BusError> {
    let processed = dir.join(PROCESSED_DIR);
    match DirBuilder::new().mode(0o755).create(&processed) {
        Ok(()) => Ok(processed),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(processed),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn require_dir(dir: &Path) -> Result<(), BusError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(BusError::DirNotFound(dir.to_path_buf()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod priority {
        use super::*;

        #[test]
        fn parses_and_displays() {
            for p in Priority::ALL {
                assert_eq!(p.as_str().parse::<Priority>().unwrap(), p);
                assert_eq!(p.to_string(), p.as_str());
            }
        }

        #[test]
        fn ranks_in_urgency_order() {
            let ranks: Vec<_> = Priority::ALL.iter().map(|p| p.rank()).collect();
            assert_eq!(ranks, [0, 1, 2, 3]);
            assert!(Priority::Critical < Priority::Low);
        }

        #[test]
        fn rejects_unknown() {
            let err = "urgent".parse::<Priority>().unwrap_err();
            assert_eq!(err.exit_code(), exit::INVALID_ARGS);
            assert!("HIGH".parse::<Priority>().is_err());
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn tokens() {
            assert!(validate_token("source", "parser-worker").is_ok());
            assert!(validate_token("type", &"t".repeat(MAX_TOKEN_LEN)).is_ok());
            assert!(validate_token("type", &"t".repeat(MAX_TOKEN_LEN + 1)).is_err());
            for bad in ["", "a b", "a\tb", "a\rb", "a\nb", "a\x0bb", "a\x0cb", "a/b"] {
                assert!(validate_token("source", bad).is_err(), "{bad:?}");
            }
        }

        #[test]
        fn event_names() {
            assert!(validate_event_name("1-a-b-2.event").is_ok());
            assert!(validate_event_name("..foo").is_ok());
            for bad in ["", ".", "..", "../x", "processed/x.event", "/etc/passwd", "a\0b"] {
                let err = validate_event_name(bad).unwrap_err();
                assert!(matches!(err, BusError::InvalidArgument(_)), "{bad:?}");
            }
        }
    }
}
