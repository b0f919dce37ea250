//! TCP wire format: CRLF-terminated text lines.
//!
//! ```text
//!  AUTH {Username} AS {DisplayName} USING {Secret}\r\n
//!  JOIN {ChannelID} AS {DisplayName}\r\n
//!  MSG FROM {DisplayName} IS {MessageContent}\r\n
//!  ERR FROM {DisplayName} IS {MessageContent}\r\n
//!  BYE FROM {DisplayName}\r\n
//!  REPLY {OK|NOK} IS {MessageContent}\r\n
//! ```
//!
//! Keywords match case-insensitively.  Content is the remainder of the line
//! and may contain spaces.  CONFIRM and PING have no TCP form.
//!
//! TCP delivers bytes, not frames: [`LineBuffer`] accumulates reads and hands
//! out complete lines as their terminator arrives.

use crate::error::{ChatError, Result};
use crate::field::{prepare_content, validate, FieldKind, MAX_CONTENT_LEN};
use crate::message::Message;

/// Frame terminator.
pub const CRLF: &[u8] = b"\r\n";

/// Serialise `message` into one CRLF-terminated line.
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    let line = match message {
        Message::Auth {
            username,
            display_name,
            secret,
        } => {
            validate(FieldKind::Username, username)?;
            validate(FieldKind::DisplayName, display_name)?;
            validate(FieldKind::Secret, secret)?;
            format!("AUTH {username} AS {display_name} USING {secret}")
        }
        Message::Join {
            channel_id,
            display_name,
        } => {
            validate(FieldKind::ChannelId, channel_id)?;
            validate(FieldKind::DisplayName, display_name)?;
            format!("JOIN {channel_id} AS {display_name}")
        }
        Message::Msg {
            display_name,
            content,
        } => {
            validate(FieldKind::DisplayName, display_name)?;
            format!("MSG FROM {display_name} IS {}", prepare_content(content)?)
        }
        Message::Err {
            display_name,
            content,
        } => {
            validate(FieldKind::DisplayName, display_name)?;
            format!("ERR FROM {display_name} IS {}", prepare_content(content)?)
        }
        Message::Bye { display_name } => {
            validate(FieldKind::DisplayName, display_name)?;
            format!("BYE FROM {display_name}")
        }
        Message::Reply { ok, content, .. } => {
            let result = if *ok { "OK" } else { "NOK" };
            format!("REPLY {result} IS {}", prepare_content(content)?)
        }
        Message::Confirm { .. } | Message::Ping => {
            return Err(ChatError::MalformedFrame(format!(
                "{} has no TCP representation",
                message.message_type()
            )));
        }
    };
    let mut bytes = line.into_bytes();
    bytes.extend_from_slice(CRLF);
    Ok(bytes)
}

/// Parse one line with its terminator already stripped.
pub fn decode(line: &str) -> Result<Message> {
    let keyword = line.split(' ').next().unwrap_or_default().to_ascii_uppercase();
    match keyword.as_str() {
        "AUTH" => {
            let parts = fixed_parts(line, 6)?;
            expect_keyword(parts[2], "AS")?;
            expect_keyword(parts[4], "USING")?;
            Ok(Message::Auth {
                username: field(FieldKind::Username, parts[1])?,
                display_name: field(FieldKind::DisplayName, parts[3])?,
                secret: field(FieldKind::Secret, parts[5])?,
            })
        }
        "JOIN" => {
            let parts = fixed_parts(line, 4)?;
            expect_keyword(parts[2], "AS")?;
            Ok(Message::Join {
                channel_id: field(FieldKind::ChannelId, parts[1])?,
                display_name: field(FieldKind::DisplayName, parts[3])?,
            })
        }
        "MSG" | "ERR" => {
            let parts: Vec<&str> = line.splitn(5, ' ').collect();
            if parts.len() < 5 {
                return Err(frame_error(line));
            }
            expect_keyword(parts[1], "FROM")?;
            expect_keyword(parts[3], "IS")?;
            let display_name = field(FieldKind::DisplayName, parts[2])?;
            let content = field(FieldKind::MessageContent, parts[4])?;
            Ok(if keyword == "MSG" {
                Message::Msg {
                    display_name,
                    content,
                }
            } else {
                Message::Err {
                    display_name,
                    content,
                }
            })
        }
        "BYE" => {
            let parts = fixed_parts(line, 3)?;
            expect_keyword(parts[1], "FROM")?;
            Ok(Message::Bye {
                display_name: field(FieldKind::DisplayName, parts[2])?,
            })
        }
        "REPLY" => {
            let parts: Vec<&str> = line.splitn(4, ' ').collect();
            if parts.len() < 4 {
                return Err(frame_error(line));
            }
            let ok = match parts[1].to_ascii_uppercase().as_str() {
                "OK" => true,
                "NOK" => false,
                _ => return Err(frame_error(line)),
            };
            expect_keyword(parts[2], "IS")?;
            Ok(Message::Reply {
                ok,
                ref_id: 0,
                content: field(FieldKind::MessageContent, parts[3])?,
            })
        }
        _ => Err(frame_error(line)),
    }
}

fn fixed_parts(line: &str, count: usize) -> Result<Vec<&str>> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() != count {
        return Err(frame_error(line));
    }
    Ok(parts)
}

fn expect_keyword(actual: &str, keyword: &str) -> Result<()> {
    if actual.eq_ignore_ascii_case(keyword) {
        Ok(())
    } else {
        Err(ChatError::MalformedFrame(format!(
            "expected {keyword}, found {actual:?}"
        )))
    }
}

fn field(kind: FieldKind, value: &str) -> Result<String> {
    validate(kind, value)?;
    Ok(value.to_string())
}

fn frame_error(line: &str) -> ChatError {
    ChatError::MalformedFrame(format!("malformed frame: {line:?}"))
}

/// Longest legal frame: MSG or ERR with a 20-character display name and
/// full-length content.
pub const MAX_FRAME_LEN: usize =
    "MSG FROM ".len() + 20 + " IS ".len() + MAX_CONTENT_LEN + CRLF.len();

/// Accumulates TCP reads and splits them on CRLF.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already searched for a terminator.
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Take the next complete line (without its CRLF), if one has arrived.
    ///
    /// Non-ASCII bytes are replaced so that field validation rejects them.
    /// Once more than [`MAX_FRAME_LEN`] bytes are held without a terminator
    /// the buffer is discarded and a [`ChatError::MalformedFrame`] returned.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        // A CR at the end of the scanned prefix may pair with the next byte.
        let start = self.scanned.saturating_sub(CRLF.len() - 1);
        let found = self.pending[start..]
            .windows(CRLF.len())
            .position(|w| w == CRLF);

        let Some(offset) = found else {
            if self.pending.len() >= MAX_FRAME_LEN {
                let held = self.pending.len();
                self.pending.clear();
                self.scanned = 0;
                return Err(ChatError::MalformedFrame(format!(
                    "no line terminator within {held} bytes"
                )));
            }
            self.scanned = self.pending.len();
            return Ok(None);
        };

        let end = start + offset;
        let line = String::from_utf8_lossy(&self.pending[..end]).into_owned();
        self.pending.drain(..end + CRLF.len());
        self.scanned = 0;
        Ok(Some(line))
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
