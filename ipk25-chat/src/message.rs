//! Protocol message model shared by both wire encodings.
//!
//! [`Message`] is the closed set of logical messages; [`MessageType`] is its
//! discriminant, with the byte values used as the UDP type tag.

use std::fmt;

/// Message discriminant.  The numeric value is the UDP type byte.
///
/// `NotReply` never appears on the wire: it marks a negative REPLY so the
/// state machine can tell the two outcomes apart.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Confirm = 0x00,
    Reply = 0x01,
    Auth = 0x02,
    Join = 0x03,
    Msg = 0x04,
    NotReply = 0x05,
    Ping = 0xFD,
    Err = 0xFE,
    Bye = 0xFF,
}

impl MessageType {
    /// Map a UDP type byte to a wire message type.
    ///
    /// `0x05` is internal-only and yields `None` like any unknown byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::Confirm,
            0x01 => Self::Reply,
            0x02 => Self::Auth,
            0x03 => Self::Join,
            0x04 => Self::Msg,
            0xFD => Self::Ping,
            0xFE => Self::Err,
            0xFF => Self::Bye,
            _ => return None,
        })
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Confirm => "CONFIRM",
            Self::Reply | Self::NotReply => "REPLY",
            Self::Auth => "AUTH",
            Self::Join => "JOIN",
            Self::Msg => "MSG",
            Self::Ping => "PING",
            Self::Err => "ERR",
            Self::Bye => "BYE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Auth {
        username: String,
        display_name: String,
        secret: String,
    },
    Join {
        channel_id: String,
        display_name: String,
    },
    Msg {
        display_name: String,
        content: String,
    },
    Err {
        display_name: String,
        content: String,
    },
    Bye {
        display_name: String,
    },
    /// UDP only: acknowledges the datagram with id `ref_id`.
    Confirm {
        ref_id: u16,
    },
    /// `ref_id` is the id of the request being answered (UDP); 0 on TCP.
    Reply {
        ok: bool,
        ref_id: u16,
        content: String,
    },
    /// UDP only liveness probe.
    Ping,
}

impl Message {
    /// Discriminant of this message; a negative REPLY maps to `NotReply`.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Auth { .. } => MessageType::Auth,
            Self::Join { .. } => MessageType::Join,
            Self::Msg { .. } => MessageType::Msg,
            Self::Err { .. } => MessageType::Err,
            Self::Bye { .. } => MessageType::Bye,
            Self::Confirm { .. } => MessageType::Confirm,
            Self::Reply { ok: true, .. } => MessageType::Reply,
            Self::Reply { ok: false, .. } => MessageType::NotReply,
            Self::Ping => MessageType::Ping,
        }
    }

    /// Requests that must be answered by a REPLY.
    pub fn expects_reply(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::Join { .. })
    }

    /// Operator-facing rendering of an inbound message, if it has one.
    pub fn display_line(&self) -> Option<String> {
        match self {
            Self::Msg {
                display_name,
                content,
            } => Some(format!("{display_name}: {content}")),
            Self::Err {
                display_name,
                content,
            } => Some(format!("ERROR FROM {display_name}: {content}")),
            Self::Reply { ok, content, .. } => {
                let outcome = if *ok { "Success" } else { "Failure" };
                Some(format!("Action {outcome}: {content}"))
            }
            _ => None,
        }
    }
}
