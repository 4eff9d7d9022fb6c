//! Per-reader cursors in the `<chat>.cursors` sidecar.
//!
//! One `handle=index` line per reader. Updates take the chat's own lock so a
//! cursor write composes with a message append.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::lock::FileLock;
use crate::paths;

use super::{validate_handle, ChatError};

const COMMENT: &str = "# Read cursors - last-read message index per handle";

/// Largest index a cursor may hold.
pub const MAX_CURSOR_INDEX: usize = i32::MAX as usize;

fn parse_index(value: &str) -> Option<usize> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<usize>().ok().filter(|&n| n <= MAX_CURSOR_INDEX)
}

fn entry_handle(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    line.split_once('=').map(|(handle, _)| handle.trim())
}

/// Last-read message index of `handle`.
///
/// `None` when the file or entry is missing, or the stored value is empty,
/// non-numeric or out of range.
pub fn read_cursor(chat: &Path, handle: &str) -> Option<usize> {
    let text = fs::read_to_string(paths::cursor_path(chat)).ok()?;
    text.lines()
        .find(|line| entry_handle(line) == Some(handle))
        .and_then(|line| line.split_once('='))
        .and_then(|(_, value)| parse_index(value))
}

/// Set the cursor of `handle` to `index`, keeping every other entry.
pub fn write_cursor(chat: &Path, handle: &str, index: usize) -> Result<(), ChatError> {
    validate_handle(handle)?;
    if index > MAX_CURSOR_INDEX {
        return Err(ChatError::InvalidArgument(format!(
            "cursor {index} exceeds {MAX_CURSOR_INDEX}"
        )));
    }
    let lock = FileLock::acquire(chat)?;
    let result = write_locked(&lock, chat, handle, index);
    lock.release();
    result
}

/// Rewrite the cursor file while the caller holds `_lock`.
pub(crate) fn write_locked(
    _lock: &FileLock,
    chat: &Path,
    handle: &str,
    index: usize,
) -> Result<(), ChatError> {
    let path = paths::cursor_path(chat);
    let existing = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let mut out = String::with_capacity(existing.len() + handle.len() + 16);
    out.push_str(COMMENT);
    out.push('\n');
    let mut written = false;
    for line in existing.lines() {
        if line.trim().is_empty() || line == COMMENT {
            continue;
        }
        if entry_handle(line) == Some(handle) {
            if !written {
                out.push_str(&format!("{handle}={index}\n"));
                written = true;
            }
            continue;
        }
        // other readers' entries stay byte-for-byte, even malformed ones
        out.push_str(line);
        out.push('\n');
    }
    if !written {
        out.push_str(&format!("{handle}={index}\n"));
    }

    let temp = paths::sidecar(&path, ".tmp");
    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&temp)?;
        file.write_all(out.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp, &path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result.map_err(ChatError::from)
}
