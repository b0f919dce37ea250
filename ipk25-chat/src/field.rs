//! Length and character-class rules for every semantic field.
//!
//! | Kind                    | Max    | Allowed                         |
//! |-------------------------|--------|---------------------------------|
//! | Username, ChannelId     | 20     | `[A-Za-z0-9_-]+`                |
//! | Secret                  | 128    | `[A-Za-z0-9_-]+`                |
//! | DisplayName             | 20     | printable ASCII `0x21..=0x7E`   |
//! | MessageContent          | 60000  | `0x20..=0x7E` plus `\n`, may be empty |
//! | SequenceId              | —      | 16-bit unsigned integer         |
//!
//! Content longer than [`MAX_CONTENT_LEN`] is truncated by the caller through
//! [`truncate_content`]; every other violation is a [`ChatError::MalformedField`].

use crate::error::{ChatError, Result};

/// Maximum number of characters of message content put on the wire.
pub const MAX_CONTENT_LEN: usize = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Username,
    ChannelId,
    Secret,
    DisplayName,
    MessageContent,
    SequenceId,
}

impl FieldKind {
    /// Maximum length in characters, `None` for kinds without a length rule.
    pub fn max_len(self) -> Option<usize> {
        match self {
            Self::Username | Self::ChannelId | Self::DisplayName => Some(20),
            Self::Secret => Some(128),
            Self::MessageContent => Some(MAX_CONTENT_LEN),
            Self::SequenceId => None,
        }
    }

    fn allows(self, c: char) -> bool {
        match self {
            Self::Username | Self::ChannelId | Self::Secret => {
                c.is_ascii_alphanumeric() || c == '_' || c == '-'
            }
            Self::DisplayName => ('\x21'..='\x7e').contains(&c),
            Self::MessageContent => c == '\n' || ('\x20'..='\x7e').contains(&c),
            Self::SequenceId => c.is_ascii_digit(),
        }
    }

    fn allows_empty(self) -> bool {
        matches!(self, Self::MessageContent)
    }

    fn name(self) -> &'static str {
        match self {
            Self::Username => "Username",
            Self::ChannelId => "ChannelID",
            Self::Secret => "Secret",
            Self::DisplayName => "DisplayName",
            Self::MessageContent => "MessageContent",
            Self::SequenceId => "MessageID",
        }
    }
}

/// Check `value` against the rules for `kind`.
pub fn validate(kind: FieldKind, value: &str) -> Result<()> {
    if kind == FieldKind::SequenceId {
        return value
            .parse::<u16>()
            .map(|_| ())
            .map_err(|_| invalid(kind, value));
    }
    if value.is_empty() && !kind.allows_empty() {
        return Err(ChatError::MalformedField(format!("{} must not be empty", kind.name())));
    }
    if let Some(max) = kind.max_len() {
        if value.chars().count() > max {
            return Err(ChatError::MalformedField(format!(
                "{} is longer than {max} characters",
                kind.name()
            )));
        }
    }
    if !value.chars().all(|c| kind.allows(c)) {
        return Err(invalid(kind, value));
    }
    Ok(())
}

/// Cut content down to [`MAX_CONTENT_LEN`] characters.
///
/// Returns the (possibly shortened) content and whether anything was cut.
pub fn truncate_content(content: &str) -> (&str, bool) {
    match content.char_indices().nth(MAX_CONTENT_LEN) {
        Some((end, _)) => (&content[..end], true),
        None => (content, false),
    }
}

/// Truncate then validate outgoing content, logging when it was shortened.
pub fn prepare_content(content: &str) -> Result<&str> {
    let (content, truncated) = truncate_content(content);
    if truncated {
        log::warn!("message content exceeds {MAX_CONTENT_LEN} characters, truncated");
    }
    validate(FieldKind::MessageContent, content)?;
    Ok(content)
}

fn invalid(kind: FieldKind, value: &str) -> ChatError {
    ChatError::MalformedField(format!("invalid {}: {value:?}", kind.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_at_max_length_are_accepted() {
        assert!(validate(FieldKind::Username, &"u".repeat(20)).is_ok());
        assert!(validate(FieldKind::ChannelId, &"c".repeat(20)).is_ok());
        assert!(validate(FieldKind::DisplayName, &"D".repeat(20)).is_ok());
        assert!(validate(FieldKind::Secret, &"s".repeat(128)).is_ok());
        assert!(validate(FieldKind::MessageContent, &"m".repeat(MAX_CONTENT_LEN)).is_ok());
    }

    #[test]
    fn values_one_over_max_length_are_rejected() {
        for (kind, len) in [
            (FieldKind::Username, 21),
            (FieldKind::ChannelId, 21),
            (FieldKind::DisplayName, 21),
            (FieldKind::Secret, 129),
        ] {
            let err = validate(kind, &"a".repeat(len)).unwrap_err();
            assert!(matches!(err, ChatError::MalformedField(_)), "{kind:?}");
        }
    }

    #[test]
    fn content_over_max_is_truncated_not_rejected() {
        let long = "x".repeat(MAX_CONTENT_LEN + 1);
        let prepared = prepare_content(&long).unwrap();
        assert_eq!(prepared.len(), MAX_CONTENT_LEN);
    }

    #[test]
    fn truncate_reports_whether_it_cut() {
        assert_eq!(truncate_content("short"), ("short", false));
        let long = "y".repeat(MAX_CONTENT_LEN + 21);
        let (cut, truncated) = truncate_content(&long);
        assert!(truncated);
        assert_eq!(cut.len(), MAX_CONTENT_LEN);
    }

    #[test]
    fn identifier_charset() {
        assert!(validate(FieldKind::Username, "user_name-01").is_ok());
        assert!(validate(FieldKind::Username, "user name").is_err());
        assert!(validate(FieldKind::ChannelId, "chan.nel").is_err());
        assert!(validate(FieldKind::Secret, "p@ss").is_err());
    }

    #[test]
    fn display_name_rejects_space_and_control() {
        assert!(validate(FieldKind::DisplayName, "Alice!~").is_ok());
        assert!(validate(FieldKind::DisplayName, "Al ice").is_err());
        assert!(validate(FieldKind::DisplayName, "Al\tice").is_err());
    }

    #[test]
    fn content_allows_space_and_newline_only() {
        assert!(validate(FieldKind::MessageContent, "hello world\nbye").is_ok());
        assert!(validate(FieldKind::MessageContent, "").is_ok());
        assert!(validate(FieldKind::MessageContent, "tab\there").is_err());
        assert!(validate(FieldKind::MessageContent, "caf\u{e9}").is_err());
    }

    #[test]
    fn empty_identifiers_are_rejected() {
        assert!(validate(FieldKind::Username, "").is_err());
        assert!(validate(FieldKind::DisplayName, "").is_err());
    }

    #[test]
    fn sequence_id_must_fit_u16() {
        assert!(validate(FieldKind::SequenceId, "0").is_ok());
        assert!(validate(FieldKind::SequenceId, "65535").is_ok());
        assert!(validate(FieldKind::SequenceId, "65536").is_err());
        assert!(validate(FieldKind::SequenceId, "-1").is_err());
    }
}
