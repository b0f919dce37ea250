//! Local command grammar and the stdin line source.
//!
//! ```text
//!  /auth {Username} {Secret} {DisplayName}   → AUTH (also sets DisplayName)
//!  /join {ChannelID}                         → JOIN
//!  /rename {DisplayName}                     local only
//!  /help                                     local only
//!  <empty line> or end of input              → BYE
//!  anything else                             → MSG with the line as content
//! ```

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::field::{truncate_content, validate, FieldKind, MAX_CONTENT_LEN};

pub const HELP: &str = "\
Available commands:
  /auth {Username} {Secret} {DisplayName}  authenticate and set the display name
  /join {ChannelID}                        join a channel
  /rename {DisplayName}                    change the display name locally
  /help                                    print this message
Any other line is sent as a chat message. An empty line or end of input ends the session.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Auth {
        username: String,
        secret: String,
        display_name: String,
    },
    Join {
        channel_id: String,
    },
    Rename {
        display_name: String,
    },
    Help,
    /// Chat content, already cut to the cap; `truncated` is set if it was cut.
    Message {
        content: String,
        truncated: bool,
    },
    Bye,
}

/// Why a line was not turned into a command.  Shown to the operator as-is.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Invalid {command} command. Usage: {usage}")]
    ArgumentCount {
        command: &'static str,
        usage: &'static str,
    },

    #[error("Invalid {command} command: {source}")]
    InvalidArgument {
        command: &'static str,
        source: ChatError,
    },

    #[error("Unknown command {0:?}. Type /help for the list of commands.")]
    Unknown(String),

    #[error("Invalid message content: {0}")]
    InvalidContent(ChatError),
}

/// Classify one input line; `None` is end of input.
pub fn parse(line: Option<&str>) -> Result<Command, CommandError> {
    let line = match line {
        None | Some("") => return Ok(Command::Bye),
        Some(line) => line,
    };

    if !line.starts_with('/') {
        let (content, truncated) = truncate_content(line);
        validate(FieldKind::MessageContent, content).map_err(CommandError::InvalidContent)?;
        return Ok(Command::Message {
            content: content.to_string(),
            truncated,
        });
    }

    let mut words = line.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match name {
        "/auth" => {
            let [username, secret, display_name] = exact_args::<3>(
                &args,
                "AUTH",
                "/auth {Username} {Secret} {DisplayName}",
            )?;
            check("AUTH", FieldKind::Username, username)?;
            check("AUTH", FieldKind::Secret, secret)?;
            check("AUTH", FieldKind::DisplayName, display_name)?;
            Ok(Command::Auth {
                username: username.to_string(),
                secret: secret.to_string(),
                display_name: display_name.to_string(),
            })
        }
        "/join" => {
            let [channel_id] = exact_args::<1>(&args, "JOIN", "/join {ChannelID}")?;
            check("JOIN", FieldKind::ChannelId, channel_id)?;
            Ok(Command::Join {
                channel_id: channel_id.to_string(),
            })
        }
        "/rename" => {
            let [display_name] = exact_args::<1>(&args, "RENAME", "/rename {DisplayName}")?;
            check("RENAME", FieldKind::DisplayName, display_name)?;
            Ok(Command::Rename {
                display_name: display_name.to_string(),
            })
        }
        "/help" => Ok(Command::Help),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn exact_args<'a, const N: usize>(
    args: &[&'a str],
    command: &'static str,
    usage: &'static str,
) -> Result<[&'a str; N], CommandError> {
    <[&str; N]>::try_from(args).map_err(|_| CommandError::ArgumentCount { command, usage })
}

fn check(command: &'static str, kind: FieldKind, value: &str) -> Result<(), CommandError> {
    validate(kind, value).map_err(|source| CommandError::InvalidArgument { command, source })
}

/// Warning text shown when a chat line had to be cut.
pub fn truncation_notice() -> String {
    format!("Message is longer than {MAX_CONTENT_LEN} characters, it was truncated.")
}

/// Read stdin line by line on a background task.
///
/// The channel closes at end of input or on a read error, which the sender
/// loop treats as BYE.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.strip_suffix('\r').map(str::to_string).unwrap_or(line);
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_sets_all_three_fields() {
        assert_eq!(
            parse(Some("/auth alice s3cret Alice")).unwrap(),
            Command::Auth {
                username: "alice".into(),
                secret: "s3cret".into(),
                display_name: "Alice".into(),
            }
        );
    }

    #[test]
    fn join_and_rename_take_one_argument() {
        assert_eq!(
            parse(Some("/join general")).unwrap(),
            Command::Join {
                channel_id: "general".into()
            }
        );
        assert_eq!(
            parse(Some("/rename Bobby")).unwrap(),
            Command::Rename {
                display_name: "Bobby".into()
            }
        );
    }

    #[test]
    fn wrong_argument_counts_are_rejected() {
        for line in [
            "/auth a a",
            "/auth a a a a",
            "/join",
            "/join a b",
            "/rename aa a",
        ] {
            assert!(
                matches!(parse(Some(line)), Err(CommandError::ArgumentCount { .. })),
                "{line}"
            );
        }
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        let too_long = "a".repeat(21);
        for line in [
            format!("/rename {too_long}"),
            format!("/join {too_long}"),
            format!("/auth {too_long} a a"),
            "/join bad.channel".to_string(),
        ] {
            assert!(
                matches!(parse(Some(&line)), Err(CommandError::InvalidArgument { .. })),
                "{line}"
            );
        }
    }

    #[test]
    fn unknown_commands_are_reported() {
        assert!(matches!(parse(Some("/asd aa")), Err(CommandError::Unknown(_))));
        assert!(matches!(parse(Some("/ aa")), Err(CommandError::Unknown(_))));
        assert!(matches!(parse(Some("/authx a b c")), Err(CommandError::Unknown(_))));
    }

    #[test]
    fn help_is_local() {
        assert_eq!(parse(Some("/help")).unwrap(), Command::Help);
    }

    #[test]
    fn empty_line_and_eof_mean_bye() {
        assert_eq!(parse(Some("")).unwrap(), Command::Bye);
        assert_eq!(parse(None).unwrap(), Command::Bye);
    }

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            parse(Some("hello there")).unwrap(),
            Command::Message {
                content: "hello there".into(),
                truncated: false,
            }
        );
    }

    #[test]
    fn long_message_is_truncated_with_flag() {
        let long = "m".repeat(MAX_CONTENT_LEN + 21);
        match parse(Some(&long)).unwrap() {
            Command::Message { content, truncated } => {
                assert!(truncated);
                assert_eq!(content.len(), MAX_CONTENT_LEN);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_printable_message_is_rejected() {
        assert!(matches!(
            parse(Some("bell\x07")),
            Err(CommandError::InvalidContent(_))
        ));
    }

    #[test]
    fn error_text_names_the_command() {
        let err = parse(Some("/join")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid JOIN command. Usage: /join {ChannelID}");
    }
}
