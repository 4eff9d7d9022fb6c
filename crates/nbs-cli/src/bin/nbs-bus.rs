use std::io;
use std::process::ExitCode;

use nbs_cli::bus_cli::{self, BusCli};
use nbs_cli::{exit_code, logging, parse_args};

fn main() -> ExitCode {
    logging::init();
    let cli: BusCli = match parse_args() {
        Ok(cli) => cli,
        Err(code) => return code,
    };
    exit_code(bus_cli::run(cli, &mut io::stdout().lock()))
}
