//! Command-line parsing for the interactive client.

use shared::COLS;
use thiserror::Error;

/// One line typed by the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create,
    Join(String),
    Train(u8),
    /// Zero-based column.
    Play(usize),
    Wait,
    Show,
    Rematch,
    Queue,
    Leave,
    Challenge(String),
    Invites,
    Accept(String),
    Decline(String),
    Cancel,
    Top(String),
    Profile(String),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown command '{0}', type 'help'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("column must be 1 to {max}, got '{got}'")]
    BadColumn { got: String, max: usize },
    #[error("level must be 1 to 5, got '{0}'")]
    BadLevel(String),
}

pub const HELP: &str = "\
Rooms:       create | join CODE | train LEVEL | 1-7 (or play N) | wait | show | rematch
Matchmaking: queue | leave
Challenges:  challenge NAME | invites | accept TICKET | decline TICKET | cancel
Accounts:    top [QUERY] | profile NAME
Other:       help | quit";

fn column(arg: &str) -> Result<usize, InputError> {
    match arg.parse::<usize>() {
        Ok(n) if (1..=COLS).contains(&n) => Ok(n - 1),
        _ => Err(InputError::BadColumn {
            got: arg.to_string(),
            max: COLS,
        }),
    }
}

fn required<'a>(name: &'static str, arg: Option<&'a str>) -> Result<&'a str, InputError> {
    arg.ok_or(InputError::MissingArgument(name))
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, InputError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    let keyword = head.to_ascii_lowercase();

    let command = match keyword.as_str() {
        "create" | "new" => Command::Create,
        "join" | "j" => Command::Join(required("join", arg)?.to_ascii_uppercase()),
        "train" | "bot" => {
            let level = required("train", arg)?;
            match level.parse::<u8>() {
                Ok(n) if (1..=5).contains(&n) => Command::Train(n),
                _ => return Err(InputError::BadLevel(level.to_string())),
            }
        }
        "play" | "p" => Command::Play(column(required("play", arg)?)?),
        digits if digits.chars().all(|c| c.is_ascii_digit()) => Command::Play(column(digits)?),
        "wait" | "w" => Command::Wait,
        "show" | "s" => Command::Show,
        "rematch" | "again" => Command::Rematch,
        "queue" | "q" => Command::Queue,
        "leave" => Command::Leave,
        "challenge" => Command::Challenge(required("challenge", arg)?.to_string()),
        "invites" => Command::Invites,
        "accept" => Command::Accept(required("accept", arg)?.to_string()),
        "decline" => Command::Decline(required("decline", arg)?.to_string()),
        "cancel" => Command::Cancel,
        "top" | "leaderboard" => Command::Top(arg.unwrap_or_default().to_string()),
        "profile" => Command::Profile(required("profile", arg)?.to_string()),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => return Err(InputError::Unknown(head.to_string())),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_are_one_based() {
        assert_eq!(parse_command("4"), Ok(Some(Command::Play(3))));
        assert_eq!(parse_command("play 1"), Ok(Some(Command::Play(0))));
        assert_eq!(parse_command(" P 7 "), Ok(Some(Command::Play(6))));
        assert_eq!(
            parse_command("8"),
            Err(InputError::BadColumn {
                got: "8".to_string(),
                max: 7
            })
        );
        assert!(parse_command("play 0").is_err());
    }

    #[test]
    fn test_arguments() {
        assert_eq!(
            parse_command("join abc234"),
            Ok(Some(Command::Join("ABC234".to_string())))
        );
        assert_eq!(parse_command("train 3"), Ok(Some(Command::Train(3))));
        assert_eq!(
            parse_command("train 9"),
            Err(InputError::BadLevel("9".to_string()))
        );
        assert_eq!(
            parse_command("challenge"),
            Err(InputError::MissingArgument("challenge"))
        );
        assert_eq!(parse_command("top"), Ok(Some(Command::Top(String::new()))));
    }

    #[test]
    fn test_blank_and_unknown() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(
            parse_command("dance"),
            Err(InputError::Unknown("dance".to_string()))
        );
        assert_eq!(parse_command("QUIT"), Ok(Some(Command::Quit)));
    }
}
