//! Input line parsing.
//!
//! Lines starting with `/` are commands; anything else is a message for the
//! current channel.

use thiserror::Error;

/// Shortest accepted nickname, in characters.
pub const MIN_NICK_LEN: usize = 2;

/// Longest accepted nickname, in characters.
pub const MAX_NICK_LEN: usize = 20;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Publish text to the current channel.
    Say(String),
    /// Switch to a channel.
    Join(String),
    /// Create a channel and switch to it.
    Create(String),
    /// Rediscover and list channels.
    Channels,
    /// Change nickname.
    Nick(String),
    /// Replay the current channel's history.
    History,
    /// Print the command list.
    Help,
    /// Leave the client.
    Quit,
    /// Command missing its argument.
    Usage(&'static str),
    /// Unrecognised command.
    Unknown(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let Some(cmd) = line.strip_prefix('/') else {
            return Some(Self::Say(line.to_string()));
        };

        let (name, arg) = cmd.split_once(char::is_whitespace).unwrap_or((cmd, ""));
        let arg = arg.trim();

        Some(match name {
            "join" | "j" => with_arg(arg, Self::Join, "/join <canal>"),
            "create" => with_arg(arg, Self::Create, "/create <canal>"),
            "nick" => with_arg(arg, Self::Nick, "/nick <nome>"),
            "channels" | "list" => Self::Channels,
            "history" => Self::History,
            "help" | "?" => Self::Help,
            "quit" | "q" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        })
    }
}

fn with_arg(arg: &str, build: fn(String) -> Command, usage: &'static str) -> Command {
    if arg.is_empty() { Command::Usage(usage) } else { build(arg.to_string()) }
}

/// Rejected nickname.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NickError {
    /// Fewer than [`MIN_NICK_LEN`] characters.
    #[error("Nickname deve ter pelo menos 2 caracteres")]
    TooShort,
    /// More than [`MAX_NICK_LEN`] characters.
    #[error("Nickname deve ter no máximo 20 caracteres")]
    TooLong,
}

/// Trim `nick` and check its length in characters.
pub fn validate_nick(nick: &str) -> Result<&str, NickError> {
    let nick = nick.trim();
    let len = nick.chars().count();

    if len < MIN_NICK_LEN {
        Err(NickError::TooShort)
    } else if len > MAX_NICK_LEN {
        Err(NickError::TooLong)
    } else {
        Ok(nick)
    }
}
