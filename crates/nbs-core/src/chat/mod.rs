//! Single-file chat log.
//!
//! A chat file is a small header followed by one base64 line per message:
//!
//! ```text
//! === nbs-chat ===
//! last-writer: alice
//! last-write: 2026-02-04T11:15:30+0100
//! file-length: 231
//! participants: alice(2), bob(1)
//! ---
//! WzIwMjYtMDItMDRUMTA6MTU6MzBaXSBhbGljZTogaGk=
//! ```
//!
//! Every mutation happens under the [`FileLock`](crate::lock::FileLock) and
//! replaces the file by rename, so unlocked readers always see a complete
//! snapshot. `file-length` counts the whole file including its own line.

mod cursor;
mod envelope;
mod header;
mod store;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::bridge::{self, BridgeReport};
use crate::exit;
use crate::lock::LockError;

pub use cursor::{read_cursor, write_cursor, MAX_CURSOR_INDEX};
pub use store::{append, create, read, Appended};

/// Longest accepted handle, in bytes.
pub const MAX_HANDLE_LEN: usize = 64;

/// Longest accepted message content, in bytes.
pub const MAX_CONTENT_LEN: usize = 1024 * 1024;

/// Interval between scans in [`poll`].
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Chat file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Chat file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Not a chat file: {}", .0.display())]
    Malformed(PathBuf),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ChatError::InvalidArgument(_) => exit::INVALID_ARGS,
            ChatError::NotFound(_) => exit::NOT_FOUND,
            ChatError::AlreadyExists(_)
            | ChatError::Malformed(_)
            | ChatError::Lock(_)
            | ChatError::Io(_) => exit::FAILURE,
        }
    }
}

/// A `(handle, count)` record from the `participants` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub handle: String,
    pub count: u64,
}

/// One decoded message line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub handle: String,
    pub content: String,
    /// Seconds since the Unix epoch; 0 for lines written without a timestamp.
    pub timestamp: i64,
}

/// Parsed view of a chat file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatState {
    pub last_writer: String,
    pub last_write: String,
    pub file_length: u64,
    pub participants: Vec<Participant>,
    pub messages: Vec<ChatMessage>,
}

impl ChatState {
    /// Send count recorded for `handle`, or 0.
    pub fn count_for(&self, handle: &str) -> u64 {
        self.participants
            .iter()
            .find(|p| p.handle == handle)
            .map_or(0, |p| p.count)
    }
}

/// Result of a successful [`send`].
#[derive(Debug, Clone)]
pub struct Sent {
    /// Index of the new message, which is also the sender's cursor.
    pub index: usize,
    pub timestamp: i64,
    pub bridge: BridgeReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Messages by other participants that arrived while polling.
    NewMessages(Vec<ChatMessage>),
    Timeout,
}

/// Check that `handle` can be stored in the header, the cursor file and a message line.
pub fn validate_handle(handle: &str) -> Result<(), ChatError> {
    if handle.is_empty() {
        return Err(ChatError::InvalidArgument("handle is empty".into()));
    }
    if handle.len() > MAX_HANDLE_LEN {
        return Err(ChatError::InvalidArgument(format!(
            "handle is {} bytes, limit is {MAX_HANDLE_LEN}",
            handle.len()
        )));
    }
    if let Some(c) = handle
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || matches!(c, ',' | '(' | ')' | '=' | '|'))
    {
        return Err(ChatError::InvalidArgument(format!(
            "handle {handle:?} contains {c:?}"
        )));
    }
    if handle.starts_with('#') || handle.starts_with('[') {
        return Err(ChatError::InvalidArgument(format!(
            "handle {handle:?} may not start with {:?}",
            &handle[..1]
        )));
    }
    Ok(())
}

/// Append a message and notify the event bus, if one can be found.
///
/// The bridge runs after the lock is released and never turns a successful
/// append into an error.
pub fn send(path: &Path, handle: &str, content: &str) -> Result<Sent, ChatError> {
    let appended = store::append(path, handle, content)?;
    let bridge = bridge::after_send(path, handle, content);
    Ok(Sent {
        index: appended.index,
        timestamp: appended.timestamp,
        bridge,
    })
}

/// Wait up to `timeout_secs` for a message from someone other than `observer`.
pub fn poll(path: &Path, observer: &str, timeout_secs: u64) -> Result<PollOutcome, ChatError> {
    poll_every(path, observer, timeout_secs, POLL_INTERVAL)
}

fn poll_every(
    path: &Path,
    observer: &str,
    ticks: u64,
    interval: Duration,
) -> Result<PollOutcome, ChatError> {
    let seen = store::read(path)?.messages.len();
    for _ in 0..ticks {
        thread::sleep(interval);
        let state = store::read(path)?;
        if state.messages.len() <= seen {
            continue;
        }
        let fresh: Vec<ChatMessage> = state.messages[seen..]
            .iter()
            .filter(|m| m.handle != observer)
            .cloned()
            .collect();
        if !fresh.is_empty() {
            return Ok(PollOutcome::NewMessages(fresh));
        }
    }
    Ok(PollOutcome::Timeout)
}

// ============================================================================
// TESTS
// ============================================================================
