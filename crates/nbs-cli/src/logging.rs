//! Diagnostics on stderr via `env_logger`.
//!
//! Lines look like `[2026-02-04T10:15:30.123Z] WARN: message`. The default
//! level is `warn`; `RUST_LOG` overrides it.

use std::io::Write;

use chrono::Utc;
use env_logger::{Builder, Env, Target};

/// Install the global logger. Safe to call more than once.
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.args()
            )
        })
        .try_init();
}
