//! Optional `config.yaml` of an events directory.

use std::fs;
use std::io;
use std::path::Path;

use log::warn;
use serde::Serialize;

/// Default cap on the size of `processed/`.
pub const DEFAULT_RETENTION_BYTES: u64 = 16 * 1024 * 1024;

/// Largest window or timeout, in seconds, whose microsecond value fits an `i64`.
pub const MAX_WINDOW_SECS: u64 = (i64::MAX / 1_000_000) as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusConfig {
    pub retention_max_bytes: u64,
    /// 0 disables deduplication.
    pub dedup_window_secs: u64,
    /// 0 disables the stale-event warning.
    pub ack_timeout_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            retention_max_bytes: DEFAULT_RETENTION_BYTES,
            dedup_window_secs: 0,
            ack_timeout_secs: 0,
        }
    }
}

impl BusConfig {
    /// Load `<dir>/config.yaml`. Returns defaults if the file doesn't exist
    /// or cannot be read; an unreadable file is logged.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join("config.yaml");
        match fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("cannot read {}: {e}; using defaults", path.display());
                }
                Self::default()
            }
        }
    }

    /// Parse `key: value` lines. Unknown keys, empty values and bad numbers
    /// leave the default in place.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for line in text.lines() {
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if value.is_empty() {
                continue;
            }
            match key {
                "retention-max-bytes" => match value.parse::<i64>() {
                    Ok(v) if v > 0 => config.retention_max_bytes = v as u64,
                    _ => warn!("config.yaml: ignoring retention-max-bytes {value:?}"),
                },
                "dedup-window" => match parse_window(value) {
                    Some(v) => config.dedup_window_secs = v,
                    None => warn!("config.yaml: ignoring dedup-window {value:?}"),
                },
                "ack-timeout" => match parse_window(value) {
                    Some(v) => config.ack_timeout_secs = v,
                    None => warn!("config.yaml: ignoring ack-timeout {value:?}"),
                },
                _ => {}
            }
        }
        config
    }
}

/// Non-negative seconds that survive conversion to microseconds.
pub(crate) fn parse_window(value: &str) -> Option<u64> {
    value
        .parse::<i64>()
        .ok()
        .filter(|&v| v >= 0)
        .map(|v| v as u64)
        .filter(|&v| v <= MAX_WINDOW_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        assert_eq!(BusConfig::load(dir.path()), BusConfig::default());
        assert_eq!(BusConfig::default().retention_max_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn unreadable_file_gives_defaults() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("config.yaml")).unwrap();
        assert_eq!(BusConfig::load(dir.path()), BusConfig::default());
    }

    #[test]
    fn reads_known_keys() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "# bus settings\nretention-max-bytes: 4096\ndedup-window: 30\nack-timeout: 600\ncolour: red\n",
        )
        .unwrap();
        let config = BusConfig::load(dir.path());
        assert_eq!(config.retention_max_bytes, 4096);
        assert_eq!(config.dedup_window_secs, 30);
        assert_eq!(config.ack_timeout_secs, 600);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = BusConfig::parse(
            "retention-max-bytes: 0\ndedup-window: -1\nack-timeout: soon\ndedup-window:\n",
        );
        assert_eq!(config, BusConfig::default());
    }

    #[test]
    fn window_overflow_guard() {
        let max = (i64::MAX / 1_000_000).to_string();
        let over = (i64::MAX / 1_000_000 + 1).to_string();
        assert_eq!(parse_window(&max), Some(MAX_WINDOW_SECS));
        assert_eq!(parse_window(&over), None);
        assert_eq!(parse_window("0"), Some(0));
    }
}
