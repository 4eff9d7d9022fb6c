//! Size-bounded pruning of `processed/` and the directory status report.

use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, warn};
use serde::Serialize;

use crate::clock;

use super::config::BusConfig;
use super::event::filename_timestamp;
use super::select::scan;
use super::{require_dir, BusError, Priority, EVENT_SUFFIX, PROCESSED_DIR};

fn kb(bytes: u64) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Outcome of [`prune`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub pruned: usize,
    /// Unlinks that failed; those files are still counted as remaining.
    pub failed: usize,
    pub remaining_bytes: u64,
    pub max_bytes: u64,
    /// False when `processed/` does not exist.
    pub processed_dir: bool,
    /// True when the directory was over the cap before pruning.
    pub over_limit: bool,
}

impl fmt::Display for PruneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.processed_dir {
            return write!(f, "Pruned 0 events (no processed directory)");
        }
        if !self.over_limit {
            return write!(
                f,
                "Pruned 0 events ({} / {} limit)",
                kb(self.remaining_bytes),
                kb(self.max_bytes)
            );
        }
        write!(
            f,
            "Pruned {} event{} ({} remaining, {} limit)",
            self.pruned,
            plural(self.pruned),
            kb(self.remaining_bytes),
            kb(self.max_bytes)
        )
    }
}

struct Processed {
    name: String,
    timestamp_us: i64,
    size: u64,
}

/// Delete the oldest acknowledged events until `processed/` holds at most
/// `max_bytes`. Age is the filename timestamp; pending events are never
/// touched. A file that cannot be removed is logged and skipped.
pub fn prune(dir: &Path, max_bytes: u64) -> Result<PruneReport, BusError> {
    require_dir(dir)?;
    let processed = dir.join(PROCESSED_DIR);
    let mut report = PruneReport {
        pruned: 0,
        failed: 0,
        remaining_bytes: 0,
        max_bytes,
        processed_dir: processed.is_dir(),
        over_limit: false,
    };
    if !report.processed_dir {
        return Ok(report);
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(&processed)? {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(timestamp_us) = filename_timestamp(name) else {
            continue;
        };
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        report.remaining_bytes += meta.len();
        entries.push(Processed {
            name: name.to_string(),
            timestamp_us,
            size: meta.len(),
        });
    }

    if report.remaining_bytes <= max_bytes {
        return Ok(report);
    }
    report.over_limit = true;

    entries.sort_by(|a, b| (a.timestamp_us, &a.name).cmp(&(b.timestamp_us, &b.name)));
    for entry in &entries {
        if report.remaining_bytes <= max_bytes {
            break;
        }
        match fs::remove_file(processed.join(&entry.name)) {
            Ok(()) => {
                report.remaining_bytes -= entry.size;
                report.pruned += 1;
            }
            Err(e) => {
                warn!("failed to prune {}: {}", entry.name, e);
                report.failed += 1;
            }
        }
    }

    debug!("pruned {} events from {}", report.pruned, processed.display());
    Ok(report)
}

/// Snapshot of an events directory, as printed by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusStatus {
    pub pending: usize,
    pub critical: usize,
    pub high: usize,
    pub normal: usize,
    pub low: usize,
    pub oldest_pending_us: Option<i64>,
    pub processed: usize,
    pub processed_bytes: u64,
    /// 0 when no timeout is configured.
    pub ack_timeout_secs: u64,
    /// Pending events older than the ack timeout.
    pub stale: usize,
}

impl BusStatus {
    pub fn count(&self, priority: Priority) -> usize {
        match priority {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
        }
    }
}

impl fmt::Display for BusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pending: {} total", self.pending)?;
        if self.pending > 0 {
            write!(
                f,
                " (critical={}, high={}, normal={}, low={})",
                self.critical, self.high, self.normal, self.low
            )?;
        }
        writeln!(f)?;
        if let Some(oldest) = self.oldest_pending_us {
            writeln!(f, "Oldest pending: {}", clock::iso_utc_micros(oldest))?;
        }
        write!(
            f,
            "Processed: {} events ({})",
            self.processed,
            kb(self.processed_bytes)
        )?;
        if self.ack_timeout_secs > 0 && self.stale > 0 {
            write!(
                f,
                "\nWARNING: {} stale event{} (unacked > {}s)",
                self.stale,
                plural(self.stale),
                self.ack_timeout_secs
            )?;
        }
        Ok(())
    }
}

/// Count pending events by priority, size up `processed/`, and flag
/// pending events older than the configured `ack-timeout`.
pub fn status(dir: &Path) -> Result<BusStatus, BusError> {
    require_dir(dir)?;
    let config = BusConfig::load(dir);
    let pending = scan(dir)?;

    let mut counts = [0usize; 4];
    for event in &pending {
        counts[event.priority.rank()] += 1;
    }
    assert_eq!(counts.iter().sum::<usize>(), pending.len());

    let mut processed = 0;
    let mut processed_bytes = 0;
    if let Ok(entries) = fs::read_dir(dir.join(PROCESSED_DIR)) {
        for entry in entries.flatten() {
            if !entry.file_name().to_string_lossy().ends_with(EVENT_SUFFIX) {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                if meta.is_file() {
                    processed += 1;
                    processed_bytes += meta.len();
                }
            }
        }
    }

    let stale = if config.ack_timeout_secs > 0 {
        let now = clock::now_micros();
        let timeout_us = config.ack_timeout_secs as i64 * 1_000_000;
        pending
            .iter()
            .filter(|e| now.saturating_sub(e.timestamp_us) > timeout_us)
            .count()
    } else {
        0
    };

    Ok(BusStatus {
        pending: pending.len(),
        critical: counts[0],
        high: counts[1],
        normal: counts[2],
        low: counts[3],
        oldest_pending_us: pending.iter().map(|e| e.timestamp_us).min(),
        processed,
        processed_bytes,
        ack_timeout_secs: config.ack_timeout_secs,
        stale,
    })
}

// ============================================================================
// TESTS
// ============================================================================
