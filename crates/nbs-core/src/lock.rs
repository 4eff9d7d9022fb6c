//! Exclusive advisory lock on a `<target>.lock` sidecar.
//!
//! Chat files lock `<chat>.lock` around every read-modify-write; event
//! directories lock `<dir>/.publish.lock` around a dedup check and publish.
//!
//! The lock is a POSIX `fcntl` write lock over the whole sidecar file, taken
//! with `F_SETLKW` so waiters block inside the kernel instead of spinning.
//! Record locks belong to the process, so threads of one process would not
//! exclude each other and closing any descriptor of the file would drop the
//! lock. A process-wide gate keyed by the resolved lock path closes that
//! gap; the key has its parent canonicalised, so every spelling of one chat
//! shares one gate entry.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, OnceLock};

use log::{debug, warn};
use thiserror::Error;

use crate::paths;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("cannot open lock file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Lock paths currently held by some thread of this process.
type Gate = (Mutex<HashSet<PathBuf>>, Condvar);

static GATE: OnceLock<Gate> = OnceLock::new();

fn gate() -> &'static Gate {
    GATE.get_or_init(|| (Mutex::new(HashSet::new()), Condvar::new()))
}

fn enter_gate(path: &Path) {
    let (held, cvar) = gate();
    let mut held = held.lock().unwrap_or_else(|e| e.into_inner());
    while held.contains(path) {
        held = cvar.wait(held).unwrap_or_else(|e| e.into_inner());
    }
    held.insert(path.to_path_buf());
}

fn leave_gate(path: &Path) {
    let (held, cvar) = gate();
    let mut held = held.lock().unwrap_or_else(|e| e.into_inner());
    held.remove(path);
    cvar.notify_all();
}

/// Apply an `fcntl` record lock of `kind` over the whole file, retrying on EINTR.
fn set_lock(file: &File, kind: libc::c_int, cmd: libc::c_int) -> io::Result<()> {
    // SAFETY: flock is plain old data; all-zero is a valid value.
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = kind as libc::c_short;
    fl.l_whence = libc::SEEK_SET as libc::c_short;
    fl.l_start = 0;
    fl.l_len = 0;
    loop {
        // SAFETY: the descriptor is owned by `file` and `fl` outlives the call.
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), cmd, &fl as *const libc::flock) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// A held lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock for `target` is held.
    ///
    /// The sidecar `<target>.lock` is created on demand with mode 0600 next
    /// to the resolved target. The parent directory must exist.
    /// Rust opens every descriptor with close-on-exec, so spawned children
    /// never inherit the lock.
    pub fn acquire(target: &Path) -> Result<Self, LockError> {
        let abs = paths::resolve(target).map_err(|source| LockError::Open {
            path: target.to_path_buf(),
            source,
        })?;
        let path = paths::lock_path(&abs);

        enter_gate(&path);

        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(&path)
        {
            Ok(file) => file,
            Err(source) => {
                leave_gate(&path);
                return Err(LockError::Open { path, source });
            }
        };

        if let Err(source) = set_lock(&file, libc::F_WRLCK as libc::c_int, libc::F_SETLKW) {
            leave_gate(&path);
            return Err(LockError::Lock { path, source });
        }

        debug!("acquired {}", path.display());
        Ok(Self { file, path })
    }

    /// Path of the sidecar lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock. Consumes the handle so it cannot be released twice.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = set_lock(&self.file, libc::F_UNLCK as libc::c_int, libc::F_SETLK) {
            warn!("failed to unlock {}: {}", self.path.display(), e);
        }
        debug!("released {}", self.path.display());
        leave_gate(&self.path);
    }
}

// ============================================================================
// TESTS
// ============================================================================
