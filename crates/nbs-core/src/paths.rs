//! Path helpers shared by the chat store, the lock manager and the bridge.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Resolve `path` against the current working directory when it is relative.
///
/// No symlinks are followed and the path does not need to exist.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(env::current_dir()?.join(path))
}

/// Absolute path of `path` with its parent directory canonicalised, so
/// `d/room.chat`, `d/sub/../room.chat` and a symlinked `d` all agree.
///
/// The file itself need not exist; its parent must.
pub fn resolve(path: &Path) -> io::Result<PathBuf> {
    let abs = absolutize(path)?;
    match abs.file_name() {
        Some(name) => Ok(fs::canonicalize(parent_dir(&abs))?.join(name)),
        None => fs::canonicalize(&abs),
    }
}

/// Append `suffix` to the full file name, e.g. `chat.log` + `.lock` gives `chat.log.lock`.
pub fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Lock file guarding every read-modify-write of `chat`.
pub fn lock_path(chat: &Path) -> PathBuf {
    sidecar(chat, ".lock")
}

/// Per-reader cursor file of `chat`.
pub fn cursor_path(chat: &Path) -> PathBuf {
    sidecar(chat, ".cursors")
}

/// Directory holding `file`, treating a bare file name as living in `.`.
pub fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
