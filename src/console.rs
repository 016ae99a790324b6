//! Interactive commands read from stdin.

use dlm_core::SessionId;
use thiserror::Error;

/// Help text printed by the `help` command.
pub const HELP: &str = "\
commands:
  <url> | add <url>   start downloading a URL
  pause <id>          pause a download
  resume <id>         resume a paused download
  cancel <id>         cancel a download and delete its partial file
  list                show active downloads
  quit                cancel everything and exit";

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Pause(SessionId),
    Resume(SessionId),
    Cancel(SessionId),
    List,
    Help,
    Quit,
}

/// Why a console line could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (type 'help')")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("invalid transfer id '{0}'")]
    InvalidId(String),
}

/// Parses one input line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(word, rest)| (word, rest.trim()));

    let command = match word.to_ascii_lowercase().as_str() {
        "add" | "get" => Command::Add(required("add", rest)?.to_string()),
        "pause" => Command::Pause(parse_id("pause", rest)?),
        "resume" => Command::Resume(parse_id("resume", rest)?),
        "cancel" => Command::Cancel(parse_id("cancel", rest)?),
        "list" | "ls" => Command::List,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ if looks_like_url(word) && rest.is_empty() => Command::Add(word.to_string()),
        _ => return Err(CommandError::Unknown(word.to_string())),
    };
    Ok(Some(command))
}

fn required<'a>(command: &'static str, rest: &'a str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(rest)
    }
}

fn parse_id(command: &'static str, rest: &str) -> Result<SessionId, CommandError> {
    let raw = required(command, rest)?;
    raw.parse()
        .map_err(|_| CommandError::InvalidId(raw.to_string()))
}

fn looks_like_url(word: &str) -> bool {
    word.contains("://") || (word.contains('.') && !word.starts_with('.'))
}
