//! Chat file create, read and append.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use log::{debug, warn};

use crate::clock;
use crate::lock::FileLock;
use crate::paths;

use super::cursor;
use super::envelope;
use super::header::{Header, DELIMITER, MARKER};
use super::{validate_handle, ChatError, ChatMessage, ChatState, MAX_CONTENT_LEN};

/// Result of [`append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    pub index: usize,
    pub timestamp: i64,
}

/// A chat file as stored: header, raw message lines, decoded messages.
struct Loaded {
    header: Header,
    lines: Vec<String>,
    messages: Vec<ChatMessage>,
}

impl Loaded {
    fn into_state(self) -> ChatState {
        ChatState {
            last_writer: self.header.last_writer,
            last_write: self.header.last_write,
            file_length: self.header.file_length,
            participants: self.header.participants,
            messages: self.messages,
        }
    }
}

fn load(path: &Path) -> Result<Loaded, ChatError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ChatError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    let text = String::from_utf8_lossy(&raw);

    let mut iter = text.lines();
    if iter.next().map(|l| l.trim_end_matches('\r')) != Some(MARKER) {
        return Err(ChatError::Malformed(path.to_path_buf()));
    }

    let mut header = Header::default();
    let mut in_header = true;
    let mut lines = Vec::new();
    let mut messages = Vec::new();
    for line in iter {
        let line = line.trim_end_matches('\r');
        if in_header {
            if line == DELIMITER {
                in_header = false;
            } else {
                header.apply_line(line);
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if let Some(msg) = envelope::decode_line(line) {
            messages.push(msg);
        }
        lines.push(line.to_string());
    }
    if in_header {
        return Err(ChatError::Malformed(path.to_path_buf()));
    }

    if header.file_length != raw.len() as u64 {
        warn!(
            "{}: file-length header says {} but file has {} bytes",
            path.display(),
            header.file_length,
            raw.len()
        );
    }

    Ok(Loaded {
        header,
        lines,
        messages,
    })
}

/// Write `contents` to a temp sibling and rename it over `path`.
fn replace_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let temp = paths::sidecar(path, &format!(".tmp-{}", std::process::id()));
    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&temp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&temp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn assert_size(path: &Path, expected: u64) -> io::Result<()> {
    let actual = fs::metadata(path)?.len();
    assert_eq!(
        actual,
        expected,
        "{}: file-length header {} != actual size {}",
        path.display(),
        expected,
        actual
    );
    Ok(())
}

/// Create a new, empty chat file with mode 0600.
///
/// # Errors
///
/// Returns `AlreadyExists` if anything is already at `path`.
pub fn create(path: &Path) -> Result<(), ChatError> {
    let mut header = Header {
        last_writer: "system".to_string(),
        last_write: clock::iso_local_now(),
        ..Header::default()
    };
    let contents = header.render_file(&[]);

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(ChatError::AlreadyExists(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if let Err(e) = file.write_all(contents.as_bytes()).and_then(|_| file.sync_all()) {
        let _ = fs::remove_file(path);
        return Err(e.into());
    }

    assert_size(path, header.file_length)?;
    debug!("created chat {}", path.display());
    Ok(())
}

/// Parse the chat at `path` without taking the lock.
///
/// Lines that do not decode to `handle: content` are skipped. A
/// `file-length` mismatch is logged, not fatal.
pub fn read(path: &Path) -> Result<ChatState, ChatError> {
    Ok(load(path)?.into_state())
}

/// Append one message under the lock and move the sender's cursor onto it.
///
/// Does not notify the event bus; see [`chat::send`](super::send).
pub fn append(path: &Path, handle: &str, content: &str) -> Result<Appended, ChatError> {
    validate_handle(handle)?;
    if content.len() > MAX_CONTENT_LEN {
        return Err(ChatError::InvalidArgument(format!(
            "message is {} bytes, limit is {MAX_CONTENT_LEN}",
            content.len()
        )));
    }

    let lock = FileLock::acquire(path)?;
    let mut loaded = load(path)?;

    // Never step backwards, even if the wall clock does.
    let now = clock::now_secs();
    let timestamp = loaded
        .messages
        .last()
        .map_or(now, |last| now.max(last.timestamp));

    let index = loaded.messages.len();
    let before = loaded.lines.len();
    loaded
        .lines
        .push(envelope::encode_message(handle, content, timestamp));

    let header = &mut loaded.header;
    header.bump(handle);
    header.last_writer = handle.to_string();
    header.last_write = clock::iso_local_now();
    let contents = header.render_file(&loaded.lines);

    replace_file(path, contents.as_bytes())?;
    assert_size(path, header.file_length)?;
    assert_eq!(loaded.lines.len(), before + 1, "append must add exactly one line");

    if let Err(e) = cursor::write_locked(&lock, path, handle, index) {
        warn!("cursor update for {handle} failed: {e}");
    }
    lock.release();

    debug!("{handle} appended message {index} to {}", path.display());
    Ok(Appended { index, timestamp })
}

// ============================================================================
// TESTS
// ============================================================================
