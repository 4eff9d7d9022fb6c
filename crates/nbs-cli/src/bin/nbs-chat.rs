use std::io;
use std::process::ExitCode;

use nbs_cli::chat_cli::{self, ChatCli};
use nbs_cli::{exit_code, logging, parse_args};

fn main() -> ExitCode {
    logging::init();
    let cli: ChatCli = match parse_args() {
        Ok(cli) => cli,
        Err(code) => return code,
    };
    exit_code(chat_cli::run(cli, &mut io::stdout().lock()))
}
