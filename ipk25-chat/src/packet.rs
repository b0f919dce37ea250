//! UDP wire format: one logical message per datagram.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.  Variable fields are ASCII
//! strings terminated by a single `0x00` byte.
//!
//! ```text
//!  CONFIRM  | 0x00 | Ref_MessageID (2) |
//!  REPLY    | 0x01 | MessageID (2) | Result (1) | Ref_MessageID (2) | Content | 0 |
//!  AUTH     | 0x02 | MessageID (2) | Username | 0 | DisplayName | 0 | Secret | 0 |
//!  JOIN     | 0x03 | MessageID (2) | ChannelID | 0 | DisplayName | 0 |
//!  MSG      | 0x04 | MessageID (2) | DisplayName | 0 | Content | 0 |
//!  PING     | 0xFD | MessageID (2) |
//!  ERR      | 0xFE | MessageID (2) | DisplayName | 0 | Content | 0 |
//!  BYE      | 0xFF | MessageID (2) | DisplayName | 0 |
//! ```

use crate::error::{ChatError, Result};
use crate::field::{prepare_content, validate, FieldKind};
use crate::message::{Message, MessageType};

/// Type byte plus the 16-bit id; every datagram starts with it.
pub const HEADER_LEN: usize = 3;

// Byte offsets of the fixed header fields.
const OFF_TYPE: usize = 0;
const OFF_ID: usize = 1;
const OFF_REPLY_RESULT: usize = 3;
const OFF_REPLY_REF: usize = 4;
const OFF_REPLY_CONTENT: usize = 6;

/// A decoded or to-be-encoded datagram.
///
/// For `Confirm`, `id` is the acknowledged id; it is the only id a CONFIRM
/// carries on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: u16,
    pub message: Message,
}

impl Packet {
    pub fn new(id: u16, message: Message) -> Self {
        Self { id, message }
    }

    /// A CONFIRM acknowledging `ref_id`.
    pub fn confirm(ref_id: u16) -> Self {
        Self::new(ref_id, Message::Confirm { ref_id })
    }

    /// Serialise into a newly allocated datagram.
    ///
    /// Every field is validated first; content longer than the cap is
    /// truncated.  Nothing is emitted for an invalid field.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let tag = self.message.message_type();
        let tag = if tag == MessageType::NotReply {
            MessageType::Reply
        } else {
            tag
        };

        if let Message::Confirm { ref_id } = &self.message {
            let mut buf = Vec::with_capacity(HEADER_LEN);
            buf.push(tag.to_u8());
            buf.extend_from_slice(&ref_id.to_be_bytes());
            return Ok(buf);
        }

        let mut buf = Vec::with_capacity(64);
        buf.push(tag.to_u8());
        buf.extend_from_slice(&self.id.to_be_bytes());

        match &self.message {
            Message::Auth {
                username,
                display_name,
                secret,
            } => {
                put_field(&mut buf, FieldKind::Username, username)?;
                put_field(&mut buf, FieldKind::DisplayName, display_name)?;
                put_field(&mut buf, FieldKind::Secret, secret)?;
            }
            Message::Join {
                channel_id,
                display_name,
            } => {
                put_field(&mut buf, FieldKind::ChannelId, channel_id)?;
                put_field(&mut buf, FieldKind::DisplayName, display_name)?;
            }
            Message::Msg {
                display_name,
                content,
            }
            | Message::Err {
                display_name,
                content,
            } => {
                put_field(&mut buf, FieldKind::DisplayName, display_name)?;
                put_content(&mut buf, content)?;
            }
            Message::Bye { display_name } => {
                put_field(&mut buf, FieldKind::DisplayName, display_name)?;
            }
            Message::Reply {
                ok,
                ref_id,
                content,
            } => {
                buf.push(u8::from(*ok));
                buf.extend_from_slice(&ref_id.to_be_bytes());
                put_content(&mut buf, content)?;
            }
            Message::Ping => {}
            Message::Confirm { .. } => unreachable!("handled above"),
        }
        Ok(buf)
    }

    /// Parse a datagram.
    ///
    /// Returns [`ChatError::MalformedFrame`] if:
    /// - the type byte is unknown,
    /// - `buf` is shorter than the minimum for its type,
    /// - a NUL terminator is missing or bytes trail the last field, or
    /// - a REPLY result byte is neither 0 nor 1.
    ///
    /// Field rule violations yield [`ChatError::MalformedField`].
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let Some(&type_byte) = buf.get(OFF_TYPE) else {
            return Err(frame_error("empty datagram"));
        };
        let tag = MessageType::from_u8(type_byte)
            .ok_or_else(|| frame_error(format!("unknown message type 0x{type_byte:02X}")))?;

        if buf.len() < min_len(tag) {
            return Err(frame_error(format!("{tag} datagram too short ({} bytes)", buf.len())));
        }
        let id = u16::from_be_bytes([buf[OFF_ID], buf[OFF_ID + 1]]);
        let mut fields = FieldReader::new(&buf[HEADER_LEN..]);

        let message = match tag {
            MessageType::Confirm => {
                fields.finish()?;
                Message::Confirm { ref_id: id }
            }
            MessageType::Ping => {
                fields.finish()?;
                Message::Ping
            }
            MessageType::Reply => {
                let ok = match buf[OFF_REPLY_RESULT] {
                    0 => false,
                    1 => true,
                    other => return Err(frame_error(format!("invalid REPLY result {other}"))),
                };
                let ref_id = u16::from_be_bytes([buf[OFF_REPLY_REF], buf[OFF_REPLY_REF + 1]]);
                let mut fields = FieldReader::new(&buf[OFF_REPLY_CONTENT..]);
                let content = fields.next(FieldKind::MessageContent)?;
                fields.finish()?;
                Message::Reply {
                    ok,
                    ref_id,
                    content,
                }
            }
            MessageType::Auth => {
                let username = fields.next(FieldKind::Username)?;
                let display_name = fields.next(FieldKind::DisplayName)?;
                let secret = fields.next(FieldKind::Secret)?;
                fields.finish()?;
                Message::Auth {
                    username,
                    display_name,
                    secret,
                }
            }
            MessageType::Join => {
                let channel_id = fields.next(FieldKind::ChannelId)?;
                let display_name = fields.next(FieldKind::DisplayName)?;
                fields.finish()?;
                Message::Join {
                    channel_id,
                    display_name,
                }
            }
            MessageType::Msg | MessageType::Err => {
                let display_name = fields.next(FieldKind::DisplayName)?;
                let content = fields.next(FieldKind::MessageContent)?;
                fields.finish()?;
                if tag == MessageType::Msg {
                    Message::Msg {
                        display_name,
                        content,
                    }
                } else {
                    Message::Err {
                        display_name,
                        content,
                    }
                }
            }
            MessageType::Bye => {
                let display_name = fields.next(FieldKind::DisplayName)?;
                fields.finish()?;
                Message::Bye { display_name }
            }
            MessageType::NotReply => unreachable!("from_u8 never yields NotReply"),
        };

        Ok(Self { id, message })
    }
}

/// Type byte and id of a datagram, read without validating the body.
///
/// Used to acknowledge a datagram before (and regardless of) decoding it.
pub fn peek_header(buf: &[u8]) -> Option<(u8, u16)> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    Some((buf[OFF_TYPE], u16::from_be_bytes([buf[OFF_ID], buf[OFF_ID + 1]])))
}

/// Smallest well-formed datagram for each type (empty strings where allowed).
fn min_len(tag: MessageType) -> usize {
    match tag {
        MessageType::Confirm | MessageType::Ping => HEADER_LEN,
        // result + ref id + empty content + NUL
        MessageType::Reply => OFF_REPLY_CONTENT + 1,
        // three one-character fields with terminators
        MessageType::Auth => HEADER_LEN + 6,
        MessageType::Join => HEADER_LEN + 4,
        // one-character name + NUL + empty content + NUL
        MessageType::Msg | MessageType::Err => HEADER_LEN + 3,
        MessageType::Bye => HEADER_LEN + 2,
        MessageType::NotReply => usize::MAX,
    }
}

fn put_field(buf: &mut Vec<u8>, kind: FieldKind, value: &str) -> Result<()> {
    validate(kind, value)?;
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
    Ok(())
}

fn put_content(buf: &mut Vec<u8>, content: &str) -> Result<()> {
    let content = prepare_content(content)?;
    buf.extend_from_slice(content.as_bytes());
    buf.push(0);
    Ok(())
}

fn frame_error(msg: impl Into<String>) -> ChatError {
    ChatError::MalformedFrame(msg.into())
}

/// Cursor over consecutive NUL-terminated fields.
struct FieldReader<'a> {
    rest: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn new(rest: &'a [u8]) -> Self {
        Self { rest }
    }

    fn next(&mut self, kind: FieldKind) -> Result<String> {
        let end = self
            .rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| frame_error("missing NUL terminator"))?;
        let raw = &self.rest[..end];
        self.rest = &self.rest[end + 1..];

        let value = std::str::from_utf8(raw)
            .map_err(|_| ChatError::MalformedField("field is not ASCII".into()))?;
        validate(kind, value)?;
        Ok(value.to_string())
    }

    fn finish(&self) -> Result<()> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(frame_error(format!("{} unexpected trailing bytes", self.rest.len())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::MAX_CONTENT_LEN;

    fn roundtrip(id: u16, message: Message) -> Packet {
        let packet = Packet::new(id, message);
        Packet::decode(&packet.encode().unwrap()).unwrap()
    }

    #[test]
    fn auth_layout_is_byte_exact() {
        let bytes = Packet::new(
            0x0102,
            Message::Auth {
                username: "alice".into(),
                display_name: "Alice".into(),
                secret: "s3cret".into(),
            },
        )
        .encode()
        .unwrap();
        assert_eq!(bytes, b"\x02\x01\x02alice\0Alice\0s3cret\0".to_vec());
    }

    #[test]
    fn confirm_carries_only_the_ref_id() {
        let bytes = Packet::confirm(0xBEEF).encode().unwrap();
        assert_eq!(bytes, vec![0x00, 0xBE, 0xEF]);
        assert_eq!(Packet::decode(&bytes).unwrap(), Packet::confirm(0xBEEF));
    }

    #[test]
    fn reply_layout_and_roundtrip() {
        let reply = Message::Reply {
            ok: true,
            ref_id: 7,
            content: "Auth success.".into(),
        };
        let bytes = Packet::new(3, reply.clone()).encode().unwrap();
        assert_eq!(&bytes[..6], &[0x01, 0x00, 0x03, 0x01, 0x00, 0x07]);
        assert_eq!(*bytes.last().unwrap(), 0);
        assert_eq!(roundtrip(3, reply.clone()).message, reply);
    }

    #[test]
    fn negative_reply_encodes_reply_tag() {
        let bytes = Packet::new(
            1,
            Message::Reply {
                ok: false,
                ref_id: 0,
                content: "nope".into(),
            },
        )
        .encode()
        .unwrap();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[3], 0x00);
    }

    #[test]
    fn message_roundtrips_preserve_fields() {
        let join = Message::Join {
            channel_id: "general".into(),
            display_name: "Alice".into(),
        };
        assert_eq!(roundtrip(9, join.clone()), Packet::new(9, join));

        let msg = Message::Msg {
            display_name: "Alice".into(),
            content: "hello there\nsecond line".into(),
        };
        assert_eq!(roundtrip(10, msg.clone()).message, msg);

        let bye = Message::Bye {
            display_name: "Alice".into(),
        };
        assert_eq!(roundtrip(u16::MAX, bye.clone()), Packet::new(u16::MAX, bye));

        assert_eq!(roundtrip(4, Message::Ping).message, Message::Ping);

        let auth = Message::Auth {
            username: "alice_01".into(),
            display_name: "Al!ce".into(),
            secret: "s3cret-key".into(),
        };
        assert_eq!(roundtrip(11, auth.clone()), Packet::new(11, auth));

        let err = Message::Err {
            display_name: "Alice".into(),
            content: "something broke".into(),
        };
        assert_eq!(roundtrip(12, err.clone()), Packet::new(12, err));
    }

    #[test]
    fn long_content_is_truncated_to_cap() {
        let msg = Message::Msg {
            display_name: "Alice".into(),
            content: "z".repeat(MAX_CONTENT_LEN + 21),
        };
        let decoded = roundtrip(1, msg);
        match decoded.message {
            Message::Msg { content, .. } => assert_eq!(content.len(), MAX_CONTENT_LEN),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn encode_rejects_invalid_field() {
        let err = Packet::new(
            0,
            Message::Join {
                channel_id: "bad channel".into(),
                display_name: "Alice".into(),
            },
        )
        .encode()
        .unwrap_err();
        assert!(matches!(err, ChatError::MalformedField(_)));
    }

    #[test]
    fn decode_empty_buffer_returns_error() {
        assert!(matches!(Packet::decode(&[]), Err(ChatError::MalformedFrame(_))));
    }

    #[test]
    fn decode_unknown_tag_returns_error() {
        assert!(matches!(
            Packet::decode(&[0x05, 0, 1]),
            Err(ChatError::MalformedFrame(_))
        ));
        assert!(matches!(
            Packet::decode(&[0x42, 0, 1, b'a', 0]),
            Err(ChatError::MalformedFrame(_))
        ));
    }

    #[test]
    fn decode_short_buffer_returns_error() {
        assert!(matches!(
            Packet::decode(&[0xFF, 0x00, 0x01, 0x00]),
            Err(ChatError::MalformedFrame(_))
        ));
        assert!(matches!(
            Packet::decode(&[0x00, 0x01]),
            Err(ChatError::MalformedFrame(_))
        ));
    }

    #[test]
    fn decode_missing_terminator_returns_error() {
        assert!(matches!(
            Packet::decode(b"\x04\x00\x01bob\0hello"),
            Err(ChatError::MalformedFrame(_))
        ));
    }

    #[test]
    fn decode_bad_reply_result_returns_error() {
        assert!(matches!(
            Packet::decode(b"\x01\x00\x01\x02\x00\x00ok\0"),
            Err(ChatError::MalformedFrame(_))
        ));
    }

    #[test]
    fn decode_trailing_bytes_returns_error() {
        assert!(matches!(
            Packet::decode(b"\xFF\x00\x01bob\0x"),
            Err(ChatError::MalformedFrame(_))
        ));
        assert!(matches!(
            Packet::decode(&[0xFD, 0, 1, 0]),
            Err(ChatError::MalformedFrame(_))
        ));
    }

    #[test]
    fn decode_invalid_display_name_is_field_error() {
        assert!(matches!(
            Packet::decode(b"\x04\x00\x01b o b\0hi\0"),
            Err(ChatError::MalformedField(_))
        ));
    }

    #[test]
    fn peek_header_reads_type_and_id() {
        assert_eq!(peek_header(&[0x04, 0x12, 0x34, b'x']), Some((0x04, 0x1234)));
        assert_eq!(peek_header(&[0x04, 0x12]), None);
    }
}
