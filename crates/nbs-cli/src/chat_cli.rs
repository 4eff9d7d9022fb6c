//! `nbs-chat` commands: create, send, read, poll, participants and cursor.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{debug, info};
use nbs_core::chat::{self, validate_handle, ChatError, ChatMessage, PollOutcome};
use nbs_core::{bridge, exit, paths};

#[derive(Parser, Debug)]
#[command(name = "nbs-chat", about = "File-based chat with atomic locking", version)]
pub struct ChatCli {
    #[command(subcommand)]
    pub command: ChatCommand,
}

#[derive(Subcommand, Debug)]
pub enum ChatCommand {
    /// Create a new, empty chat file
    Create { file: PathBuf },

    /// Append a message
    Send {
        file: PathBuf,
        handle: String,
        #[arg(allow_hyphen_values = true)]
        message: String,
        /// Also publish a human-input event
        #[arg(long)]
        human: bool,
    },

    /// Print messages as `handle: content`
    Read {
        file: PathBuf,
        /// Show only the last N messages
        #[arg(long)]
        last: Option<usize>,
        /// Show messages after the last one from this handle
        #[arg(long)]
        since: Option<String>,
        /// Show messages after this handle's cursor, then advance it
        #[arg(long)]
        unread: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Wait for a message from another participant
    Poll {
        file: PathBuf,
        handle: String,
        /// Timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// List participants and their message counts
    Participants { file: PathBuf },

    /// Show or set a handle's read cursor
    Cursor {
        file: PathBuf,
        handle: String,
        #[arg(long)]
        set: Option<usize>,
    },
}

/// Run one command, writing results to `out` and errors to stderr.
pub fn run(cli: ChatCli, out: &mut impl Write) -> i32 {
    match execute(cli.command, out) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    }
}

fn execute(command: ChatCommand, out: &mut impl Write) -> Result<i32, ChatError> {
    match command {
        ChatCommand::Create { file } => {
            chat::create(&file)?;
            let shown = paths::absolutize(&file).unwrap_or(file);
            writeln!(out, "Created: {}", shown.display())?;
        }
        ChatCommand::Send {
            file,
            handle,
            message,
            human,
        } => {
            let sent = chat::send(&file, &handle, &message)?;
            if human {
                bridge::human_input(&file, &handle, &message);
            }
            if sent.bridge.failed > 0 {
                info!(
                    "{} of {} bus events could not be published",
                    sent.bridge.failed,
                    sent.bridge.published + sent.bridge.failed
                );
            }
            debug!("sent message {} at {}", sent.index, sent.timestamp);
        }
        ChatCommand::Read {
            file,
            last,
            since,
            unread,
            json,
        } => read(&file, last, since.as_deref(), unread.as_deref(), json, out)?,
        ChatCommand::Poll {
            file,
            handle,
            timeout,
        } => {
            validate_handle(&handle)?;
            match chat::poll(&file, &handle, timeout)? {
                PollOutcome::NewMessages(messages) => print_messages(&messages, out)?,
                PollOutcome::Timeout => return Ok(exit::TIMEOUT),
            }
        }
        ChatCommand::Participants { file } => {
            let state = chat::read(&file)?;
            for p in &state.participants {
                writeln!(out, "{:<24} {} messages", p.handle, p.count)?;
            }
        }
        ChatCommand::Cursor { file, handle, set } => {
            validate_handle(&handle)?;
            if !file.is_file() {
                return Err(ChatError::NotFound(file));
            }
            match set {
                Some(index) => chat::write_cursor(&file, &handle, index)?,
                None => match chat::read_cursor(&file, &handle) {
                    Some(index) => writeln!(out, "{index}")?,
                    None => writeln!(out, "none")?,
                },
            }
        }
    }
    Ok(exit::SUCCESS)
}

fn read(
    file: &Path,
    last: Option<usize>,
    since: Option<&str>,
    unread: Option<&str>,
    json: bool,
    out: &mut impl Write,
) -> Result<(), ChatError> {
    if let Some(handle) = unread {
        validate_handle(handle)?;
    }
    let state = chat::read(file)?;
    let messages = &state.messages;

    let mut start = 0;
    if let Some(handle) = unread {
        if let Some(cursor) = chat::read_cursor(file, handle) {
            start = cursor.saturating_add(1).min(messages.len());
        }
    }
    if let Some(handle) = since {
        if let Some(i) = messages.iter().rposition(|m| m.handle == handle) {
            start = start.max(i + 1);
        }
    }
    let mut selected = &messages[start..];
    if let Some(n) = last {
        selected = &selected[selected.len().saturating_sub(n)..];
    }

    if json {
        let text = serde_json::to_string_pretty(selected)
            .map_err(|e| ChatError::Io(e.into()))?;
        writeln!(out, "{text}")?;
    } else {
        print_messages(selected, out)?;
    }

    if let Some(handle) = unread {
        if !selected.is_empty() {
            chat::write_cursor(file, handle, messages.len() - 1)?;
        }
    }
    Ok(())
}

fn print_messages(messages: &[ChatMessage], out: &mut impl Write) -> Result<(), ChatError> {
    for m in messages {
        writeln!(out, "{}: {}", m.handle, m.content)?;
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
