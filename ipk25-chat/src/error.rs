//! Error taxonomy shared by every layer of the client.
//!
//! Each variant is one terminal-outcome kind.  The binary maps them onto
//! distinct process exit codes via [`ChatError::exit_code`]; the library never
//! exits the process itself.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Bad configuration, surfaced before the session starts.
    #[error("{0}")]
    Argument(String),

    /// A field value violates its length or character-class rule.
    #[error("{0}")]
    MalformedField(String),

    /// A frame does not follow the wire grammar.
    #[error("{0}")]
    MalformedFrame(String),

    /// The action is not legal in the current protocol state.
    #[error("{0}")]
    IllegalState(String),

    /// The retransmission budget ran out without a CONFIRM.
    #[error("{0}")]
    DeliveryFailure(String),

    /// A request got no REPLY in time.  The notice is already on screen.
    #[error("{0}")]
    NoReply(String),

    /// The session ended after its reason was already shown to the operator.
    #[error("{0}")]
    SessionEnded(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Argument(_) => 1,
            Self::MalformedField(_) | Self::MalformedFrame(_) => 2,
            Self::IllegalState(_) => 3,
            Self::DeliveryFailure(_) => 4,
            Self::NoReply(_) => 5,
            Self::SessionEnded(_) => 6,
            Self::Io(_) => 7,
        }
    }

    /// `true` when the message was printed before the error was raised and
    /// must not be printed again.
    pub fn already_reported(&self) -> bool {
        matches!(self, Self::NoReply(_) | Self::SessionEnded(_))
    }
}
