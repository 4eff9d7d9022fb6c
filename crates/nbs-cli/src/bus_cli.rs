//! `nbs-bus` commands over an events directory.
//!
//! `publish` and `prune` fall back to the directory's `config.yaml` when
//! `--dedup-window` or `--max-bytes` is not given.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::debug;
use nbs_core::bus::{self, BusConfig, BusError, Priority, PublishOutcome, MAX_WINDOW_SECS};
use nbs_core::{clock, exit};

#[derive(Parser, Debug)]
#[command(name = "nbs-bus", about = "File-based event queue", version)]
pub struct BusCli {
    #[command(subcommand)]
    pub command: BusCommand,
}

#[derive(Subcommand, Debug)]
pub enum BusCommand {
    /// Publish an event and print its filename
    Publish {
        dir: PathBuf,
        source: String,
        #[arg(value_name = "TYPE")]
        event_type: String,
        #[arg(value_parser = parse_priority)]
        priority: Priority,
        #[arg(allow_hyphen_values = true, default_value = "")]
        payload: String,
        /// Skip if the same source:type is pending from the last N seconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(0..=MAX_WINDOW_SECS))]
        dedup_window: Option<u64>,
    },

    /// List pending events, highest priority first
    Check {
        dir: PathBuf,
        /// Only events from this source
        #[arg(long)]
        handle: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Print a pending event
    Read { dir: PathBuf, event: String },

    /// Move an event to processed/
    Ack { dir: PathBuf, event: String },

    /// Acknowledge every pending event
    AckAll {
        dir: PathBuf,
        /// Only events from this source
        #[arg(long)]
        handle: Option<String>,
    },

    /// Trim processed/ down to the retention limit
    Prune {
        dir: PathBuf,
        #[arg(long)]
        max_bytes: Option<u64>,
    },

    /// Summarise pending and processed events
    Status {
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    s.parse().map_err(|e: BusError| e.to_string())
}

/// Run one command, writing results to `out` and errors to stderr.
pub fn run(cli: BusCli, out: &mut impl Write) -> i32 {
    match execute(cli.command, out) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    }
}

fn execute(command: BusCommand, out: &mut impl Write) -> Result<i32, BusError> {
    match command {
        BusCommand::Publish {
            dir,
            source,
            event_type,
            priority,
            payload,
            dedup_window,
        } => {
            let window = match dedup_window {
                Some(secs) => secs,
                None => BusConfig::load(&dir).dedup_window_secs,
            };
            let window_us = (window.min(MAX_WINDOW_SECS) as i64) * 1_000_000;
            match bus::publish_dedup(&dir, &source, &event_type, priority, &payload, window_us)? {
                PublishOutcome::Published(name) => writeln!(out, "{name}")?,
                PublishOutcome::Deduplicated => {
                    debug!("{source}:{event_type} deduplicated");
                    return Ok(exit::DEDUPLICATED);
                }
            }
        }
        BusCommand::Check { dir, handle, json } => {
            let events = bus::list(&dir, handle.as_deref())?;
            if json {
                let text = serde_json::to_string_pretty(&events).map_err(io_error)?;
                writeln!(out, "{text}")?;
            } else {
                let now = clock::now_micros();
                for e in &events {
                    let age = clock::format_age((now - e.timestamp_us) / 1_000_000);
                    writeln!(out, "[{}] {} ({})", e.priority, e.filename, age)?;
                }
            }
        }
        BusCommand::Read { dir, event } => {
            out.write_all(&bus::read(&dir, &event)?)?;
        }
        BusCommand::Ack { dir, event } => {
            bus::ack(&dir, &event)?;
        }
        BusCommand::AckAll { dir, handle } => {
            let acked = bus::ack_all(&dir, handle.as_deref())?;
            writeln!(
                out,
                "Acknowledged {acked} event{}",
                if acked == 1 { "" } else { "s" }
            )?;
        }
        BusCommand::Prune { dir, max_bytes } => {
            let max = max_bytes.unwrap_or_else(|| BusConfig::load(&dir).retention_max_bytes);
            let report = bus::prune(&dir, max)?;
            writeln!(out, "{report}")?;
        }
        BusCommand::Status { dir, json } => {
            let status = bus::status(&dir)?;
            if json {
                let text = serde_json::to_string_pretty(&status).map_err(io_error)?;
                writeln!(out, "{text}")?;
            } else {
                writeln!(out, "{status}")?;
            }
        }
    }
    Ok(exit::SUCCESS)
}

fn io_error(e: serde_json::Error) -> BusError {
    BusError::Io(e.into())
}

// ============================================================================
// TESTS
// ============================================================================
