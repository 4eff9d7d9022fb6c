//! Locating the events directory that belongs to a chat file.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::paths;

/// Ancestor levels searched above the chat file's directory.
pub const MAX_DISCOVERY_DEPTH: usize = 10;

fn resolved_dir(candidate: PathBuf) -> Option<PathBuf> {
    fs::canonicalize(candidate).ok().filter(|p| p.is_dir())
}

/// Find the events directory for `chat_path`.
///
/// Walks up from the directory holding the chat. At each level `D` it tries
/// `D/../events` (a `chat/` directory next to `events/`), then
/// `D/.nbs/events`. Candidates are resolved with `canonicalize`, and a
/// relative `chat_path` is taken relative to the working directory.
pub fn find_events_dir(chat_path: &Path) -> Option<PathBuf> {
    let chat = paths::absolutize(chat_path).ok()?;
    let mut dir = paths::parent_dir(&chat);

    for _ in 0..MAX_DISCOVERY_DEPTH {
        let found = resolved_dir(dir.join("..").join("events"))
            .or_else(|| resolved_dir(dir.join(".nbs").join("events")));
        if let Some(found) = found {
            debug!("events dir for {} is {}", chat_path.display(), found.display());
            return Some(found);
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => break,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sibling_of_chat_dir() {
        let root = tempdir().unwrap();
        let nbs = root.path().join(".nbs");
        fs::create_dir_all(nbs.join("chat")).unwrap();
        fs::create_dir_all(nbs.join("events")).unwrap();

        let found = find_events_dir(&nbs.join("chat").join("team.chat")).unwrap();
        assert_eq!(found, fs::canonicalize(nbs.join("events")).unwrap());
    }

    #[test]
    fn dot_nbs_in_ancestor() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join(".nbs/events")).unwrap();
        let deep = root.path().join("src/module/notes");
        fs::create_dir_all(&deep).unwrap();

        let found = find_events_dir(&deep.join("x.chat")).unwrap();
        assert_eq!(found, fs::canonicalize(root.path().join(".nbs/events")).unwrap());
    }

    #[test]
    fn events_next_to_chat_file() {
        // chat at <root>/project/room.chat: level 0 checks <root>/events
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("project")).unwrap();
        fs::create_dir_all(root.path().join("events")).unwrap();

        let found = find_events_dir(&root.path().join("project/room.chat")).unwrap();
        assert_eq!(found, fs::canonicalize(root.path().join("events")).unwrap());
    }

    #[test]
    fn file_named_events_is_ignored() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("a/chat")).unwrap();
        fs::write(root.path().join("a/events"), "not a dir").unwrap();
        let found = find_events_dir(&root.path().join("a/chat/room.chat"));
        let root = fs::canonicalize(root.path()).unwrap();
        assert!(found.map_or(true, |p| !p.starts_with(&root)));
    }

    #[test]
    fn depth_is_bounded() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join(".nbs/events")).unwrap();
        let mut deep = root.path().to_path_buf();
        for i in 0..(MAX_DISCOVERY_DEPTH + 2) {
            deep = deep.join(format!("d{i}"));
        }
        fs::create_dir_all(&deep).unwrap();
        assert_eq!(find_events_dir(&deep.join("room.chat")), None);
    }
}
