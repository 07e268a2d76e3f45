//! Command-line parsing for the interactive session.

use thiserror::Error;

use crate::domain::{BossId, EventId, IdentityToken, Nickname};

/// A command entered at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Join unconditionally, replacing any current record
    Join {
        boss_id: BossId,
        event_id: EventId,
        nickname: Nickname,
    },
    /// Join only when admission allows it
    TryJoin {
        boss_id: BossId,
        event_id: EventId,
        nickname: Nickname,
    },
    Leave,
    Status,
    CanJoin {
        boss_id: BossId,
    },
    /// Open a realtime preview; missing ids fall back to the joined boss
    Preview {
        boss_id: Option<BossId>,
        event_id: Option<EventId>,
    },
    Stop,
    Login {
        token: IdentityToken,
    },
    Logout,
    Help,
    Quit,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}'. Type 'help' for the list of commands")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

const JOIN_USAGE: &str = "join <boss> <event> <nickname>";
const TRY_JOIN_USAGE: &str = "try-join <boss> <event> <nickname>";
const CAN_JOIN_USAGE: &str = "can-join <boss>";
const PREVIEW_USAGE: &str = "preview [<boss> <event>]";
const LOGIN_USAGE: &str = "login <token>";

/// Help text listing every command
pub const HELP: &str = "\
Commands:
  join <boss> <event> <nickname>      join a boss (replaces the current join)
  try-join <boss> <event> <nickname>  join only if not joined to another boss
  leave                               leave the current boss
  status                              show identity, join and preview status
  can-join <boss>                     check whether joining <boss> is allowed
  preview [<boss> <event>]            open a realtime preview (defaults to the joined boss)
  stop                                close the realtime preview
  login <token>                       switch to an authenticated identity
  logout                              switch back to the guest identity
  help                                show this help
  quit                                exit";

/// Parse one line of input
///
/// The nickname takes the rest of the line, so it may contain spaces.
pub fn parse_command(line: &str) -> Result<Command, CommandParseError> {
    let Some((name, rest)) = next_word(line) else {
        return Err(CommandParseError::Empty);
    };

    match name.to_ascii_lowercase().as_str() {
        "join" => {
            let (boss_id, event_id, nickname) = join_args(rest, JOIN_USAGE)?;
            Ok(Command::Join {
                boss_id,
                event_id,
                nickname,
            })
        }
        "try-join" => {
            let (boss_id, event_id, nickname) = join_args(rest, TRY_JOIN_USAGE)?;
            Ok(Command::TryJoin {
                boss_id,
                event_id,
                nickname,
            })
        }
        "leave" => no_args(rest, "leave", Command::Leave),
        "status" => no_args(rest, "status", Command::Status),
        "can-join" => match words(rest).as_slice() {
            [boss] => Ok(Command::CanJoin {
                boss_id: BossId::new(*boss),
            }),
            _ => Err(CommandParseError::Usage(CAN_JOIN_USAGE)),
        },
        "preview" => match words(rest).as_slice() {
            [] => Ok(Command::Preview {
                boss_id: None,
                event_id: None,
            }),
            [boss, event] => Ok(Command::Preview {
                boss_id: Some(BossId::new(*boss)),
                event_id: Some(EventId::new(*event)),
            }),
            _ => Err(CommandParseError::Usage(PREVIEW_USAGE)),
        },
        "stop" => no_args(rest, "stop", Command::Stop),
        "login" => match words(rest).as_slice() {
            [token] => Ok(Command::Login {
                token: IdentityToken::new(*token),
            }),
            _ => Err(CommandParseError::Usage(LOGIN_USAGE)),
        },
        "logout" => no_args(rest, "logout", Command::Logout),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Err(CommandParseError::Unknown(name.to_string())),
    }
}

/// Split off the first whitespace-delimited word
fn next_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(end) => Some((&input[..end], input[end..].trim_start())),
        None => Some((input, "")),
    }
}

fn words(input: &str) -> Vec<&str> {
    input.split_whitespace().collect()
}

fn no_args(
    rest: &str,
    usage: &'static str,
    command: Command,
) -> Result<Command, CommandParseError> {
    if rest.trim().is_empty() {
        Ok(command)
    } else {
        Err(CommandParseError::Usage(usage))
    }
}

fn join_args(
    rest: &str,
    usage: &'static str,
) -> Result<(BossId, EventId, Nickname), CommandParseError> {
    let (boss, rest) = next_word(rest).ok_or(CommandParseError::Usage(usage))?;
    let (event, rest) = next_word(rest).ok_or(CommandParseError::Usage(usage))?;
    let nickname = rest.trim();
    if nickname.is_empty() {
        return Err(CommandParseError::Usage(usage));
    }
    Ok((BossId::new(boss), EventId::new(event), Nickname::new(nickname)))
}
