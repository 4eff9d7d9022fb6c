//! Command-line front ends over `nbs-core`.
//!
//! The binaries only parse arguments, set up logging and call into the
//! `chat_cli` / `bus_cli` modules, which write to any `io::Write` so they can
//! be exercised without spawning a process.

pub mod bus_cli;
pub mod chat_cli;
pub mod logging;

use std::process::ExitCode;

use clap::Parser;
use nbs_core::exit;

/// Parse the command line. Usage errors exit with 4, `--help` and
/// `--version` with 0.
pub fn parse_args<T: Parser>() -> Result<T, ExitCode> {
    T::try_parse().map_err(|err| {
        let _ = err.print();
        if err.use_stderr() {
            exit_code(exit::INVALID_ARGS)
        } else {
            exit_code(exit::SUCCESS)
        }
    })
}

pub fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
