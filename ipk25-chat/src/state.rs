//! Protocol finite-state machine.
//!
//! ```text
//!  START ──AUTH──▶ AUTH ──REPLY──▶ OPEN ──JOIN──▶ JOIN
//!                  │  ▲ AUTH/!REPLY  ▲              │
//!                  └──┘              └─REPLY/!REPLY─┘
//!
//!  any ──BYE/ERR (sent or received)──▶ END
//! ```
//!
//! [`Fsm`] is the only writer of [`SessionState`].  Both directions are
//! checked here: [`Fsm::on_send`] before the client transmits and
//! [`Fsm::on_receive`] after a frame from the server is decoded.  Each call is
//! a short synchronous transition.

use std::fmt;

use crate::error::{ChatError, Result};
use crate::message::MessageType;

/// All possible protocol states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing sent yet.
    #[default]
    Start,
    /// AUTH sent, waiting for a positive REPLY.
    Authenticating,
    /// Authenticated; messages may flow.
    Open,
    /// JOIN sent, waiting for its REPLY.
    Joining,
    /// Session over.  Absorbing.
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Why the peer's message was refused.  Used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// MSG arrived while authentication was still pending.
    MessageBeforeAuth,
    /// A REPLY arrived while no request was outstanding.
    UnexpectedReply,
    /// The server sent a message type only clients send.
    UnexpectedMessage(MessageType),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageBeforeAuth => write!(f, "MSG message received before authentication."),
            Self::UnexpectedReply => write!(f, "REPLY message received while no request was pending."),
            Self::UnexpectedMessage(kind) => write!(f, "Unexpected {kind} message received from server."),
        }
    }
}

/// Result of a receive-side transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Legal; the session continues.
    Accepted,
    /// Legal, and the peer ended the session (BYE or ERR).
    AcceptedTerminal,
    /// Illegal; the state is now `Terminated`.
    Rejected(RejectReason),
}

#[derive(Debug, Default)]
pub struct Fsm {
    state: SessionState,
}

impl Fsm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check and apply a transition for a message about to be sent.
    ///
    /// On [`ChatError::IllegalState`] the state is left unchanged.
    pub fn on_send(&mut self, kind: MessageType) -> Result<()> {
        use SessionState::*;

        match kind {
            MessageType::Auth => match self.state {
                Start | Authenticating => self.state = Authenticating,
                _ => return Err(illegal("You are already authenticated.")),
            },
            MessageType::Join => match self.state {
                Open => self.state = Joining,
                _ => return Err(illegal("You are not authenticated.")),
            },
            MessageType::Msg => match self.state {
                Open => {}
                Joining => return Err(illegal("Wait for the JOIN reply before sending.")),
                _ => return Err(illegal("You are not authenticated.")),
            },
            MessageType::Bye | MessageType::Err => self.state = Terminated,
            MessageType::Confirm => {}
            MessageType::Reply | MessageType::NotReply | MessageType::Ping => {
                return Err(illegal(format!("A client never sends {kind}.")));
            }
        }
        Ok(())
    }

    /// Apply a transition for a message received from the server.
    pub fn on_receive(&mut self, kind: MessageType) -> ReceiveOutcome {
        use SessionState::*;

        match kind {
            MessageType::Reply => match self.state {
                Authenticating | Joining => self.state = Open,
                Open => return self.reject(RejectReason::UnexpectedReply),
                Start | Terminated => {}
            },
            MessageType::NotReply => match self.state {
                Joining => self.state = Open,
                Open => return self.reject(RejectReason::UnexpectedReply),
                Start | Authenticating | Terminated => {}
            },
            MessageType::Msg => {
                if self.state == Authenticating {
                    return self.reject(RejectReason::MessageBeforeAuth);
                }
            }
            MessageType::Bye | MessageType::Err => {
                self.state = Terminated;
                return ReceiveOutcome::AcceptedTerminal;
            }
            MessageType::Ping | MessageType::Confirm => {}
            MessageType::Auth | MessageType::Join => {
                return self.reject(RejectReason::UnexpectedMessage(kind));
            }
        }
        ReceiveOutcome::Accepted
    }

    fn reject(&mut self, reason: RejectReason) -> ReceiveOutcome {
        self.state = SessionState::Terminated;
        ReceiveOutcome::Rejected(reason)
    }
}

fn illegal(msg: impl Into<String>) -> ChatError {
    ChatError::IllegalState(msg.into())
}
