//! Session lifecycle.
//!
//! A [`Session`] holds everything the concurrent activities share and runs
//! them until the first one finishes:
//!
//! ```text
//!  stdin ─▶ send loop ───────┐
//!                            ├──▶ Outbound ─▶ socket
//!  error escalation ─────────┤
//!  interrupt (BYE) ──────────┘
//!  socket ─▶ receive loop ─▶ console / signals / confirmations
//! ```
//!
//! The four futures are polled by one `select!`, so the activity that
//! finishes first decides the outcome and the others are dropped.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::config::{ClientConfig, Transport};
use crate::console::Console;
use crate::error::{ChatError, Result};
use crate::input::{self, Command};
use crate::message::{Message, MessageType};
use crate::receiver::{self, Inbound};
use crate::sender::{Link, Outbound};
use crate::signal::Signal;
use crate::socket::{self, DatagramSocket};
use crate::state::{Fsm, ReceiveOutcome, SessionState};

/// Display name used before `/auth` or `/rename`.
pub const DEFAULT_DISPLAY_NAME: &str = "unknown";

/// Shown and sent when AUTH or JOIN go unanswered.
pub const NO_REPLY: &str = "No REPLY received from server";

/// Connect to the configured server and run one session to completion.
///
/// `input` yields operator lines; its closing is treated as BYE.  When
/// `interrupt` completes, one BYE is sent and the session ends cleanly.
pub async fn run<F>(
    config: &ClientConfig,
    console: Console,
    input: mpsc::Receiver<String>,
    interrupt: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let (link, inbound) = match config.transport {
        Transport::Tcp => {
            let (reader, writer) = socket::connect_stream(config.server).await?;
            (Link::Stream(Arc::new(writer)), Inbound::Stream(reader))
        }
        Transport::Udp => {
            let socket = Arc::new(DatagramSocket::open(config.server).await?);
            log::debug!(
                "[udp] {} attempts per message, gives up after {:?}",
                config.timers.attempts(),
                config.timers.delivery_budget()
            );
            (Link::Datagram(Arc::clone(&socket)), Inbound::Datagram(socket))
        }
    };
    log::info!("session started ({}, server {})", config.transport, config.server);

    let session = Session::new(Outbound::new(link, config.timers), console);

    let outcome = tokio::select! {
        result = session.send_loop(input) => result,
        result = receiver::run(&session, inbound) => result,
        result = session.escalate() => result,
        result = session.shut_down(interrupt) => result,
    };
    log::info!("session ended in state {}", session.state());
    outcome
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Session {
    fsm: Mutex<Fsm>,
    display_name: Mutex<String>,
    outbound: Outbound,
    console: Console,
    /// Set by the receive loop when a REPLY arrives.
    reply_ready: Signal,
    /// Set by the receive loop when the session must be ended with an ERR.
    error_pending: Signal,
    error_message: Mutex<String>,
}

impl Session {
    pub fn new(outbound: Outbound, console: Console) -> Self {
        Self {
            fsm: Mutex::new(Fsm::new()),
            display_name: Mutex::new(DEFAULT_DISPLAY_NAME.to_string()),
            outbound,
            console,
            reply_ready: Signal::new(),
            error_pending: Signal::new(),
            error_message: Mutex::new(String::new()),
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.fsm).state()
    }

    pub fn display_name(&self) -> String {
        lock(&self.display_name).clone()
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn reply_ready(&self) -> &Signal {
        &self.reply_ready
    }

    pub fn on_receive(&self, kind: MessageType) -> ReceiveOutcome {
        let mut fsm = lock(&self.fsm);
        let before = fsm.state();
        let outcome = fsm.on_receive(kind);
        log::trace!("receive {kind}: {before} → {}", fsm.state());
        outcome
    }

    fn on_send(&self, kind: MessageType) -> Result<()> {
        let mut fsm = lock(&self.fsm);
        let before = fsm.state();
        fsm.on_send(kind)?;
        log::trace!("send {kind}: {before} → {}", fsm.state());
        Ok(())
    }

    /// Report a protocol error and hand it to the escalation task.
    pub fn raise(&self, text: String) {
        self.console.error(&text);
        log::warn!("protocol error: {text}");
        *lock(&self.error_message) = text;
        self.error_pending.set();
    }

    // -----------------------------------------------------------------------
    // Send loop
    // -----------------------------------------------------------------------

    /// Turn operator lines into messages until BYE is delivered.
    pub async fn send_loop(&self, mut lines: mpsc::Receiver<String>) -> Result<()> {
        loop {
            let line = lines.recv().await;
            let command = match input::parse(line.as_deref()) {
                Ok(command) => command,
                Err(e) => {
                    self.console.error(e);
                    continue;
                }
            };

            let (message, new_name) = match command {
                Command::Help => {
                    self.console.line(input::HELP);
                    continue;
                }
                Command::Rename { display_name } => {
                    *lock(&self.display_name) = display_name;
                    continue;
                }
                Command::Auth {
                    username,
                    secret,
                    display_name,
                } => (
                    Message::Auth {
                        username,
                        display_name: display_name.clone(),
                        secret,
                    },
                    Some(display_name),
                ),
                Command::Join { channel_id } => (
                    Message::Join {
                        channel_id,
                        display_name: self.display_name(),
                    },
                    None,
                ),
                Command::Message { content, truncated } => {
                    if truncated {
                        self.console.warning(input::truncation_notice());
                    }
                    (
                        Message::Msg {
                            display_name: self.display_name(),
                            content,
                        },
                        None,
                    )
                }
                Command::Bye => (
                    Message::Bye {
                        display_name: self.display_name(),
                    },
                    None,
                ),
            };

            match self.on_send(message.message_type()) {
                Ok(()) => {}
                Err(e @ ChatError::IllegalState(_)) => {
                    self.console.error(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
            if let Some(name) = new_name {
                *lock(&self.display_name) = name;
            }

            if message.expects_reply() {
                self.reply_ready.reset();
            }
            self.outbound.deliver(&message).await?;

            if matches!(message, Message::Bye { .. }) {
                return Ok(());
            }
            if message.expects_reply() {
                let reply_timeout = self.outbound.timers().reply_timeout;
                if timeout(reply_timeout, self.reply_ready.wait()).await.is_err() {
                    return Err(self.give_up_on_reply().await);
                }
            }
        }
    }

    async fn give_up_on_reply(&self) -> ChatError {
        self.console.error(NO_REPLY);
        let err = Message::Err {
            display_name: self.display_name(),
            content: NO_REPLY.to_string(),
        };
        if let Err(e) = self.on_send(MessageType::Err) {
            log::warn!("{e}");
        }
        // UDP retries inside deliver; TCP writes once.
        if let Err(e) = self.outbound.deliver(&err).await {
            log::warn!("ERR after missing REPLY not delivered: {e}");
        }
        ChatError::NoReply(NO_REPLY.to_string())
    }

    // -----------------------------------------------------------------------
    // Error escalation
    // -----------------------------------------------------------------------

    /// Wait for a raised error, tell the server, then end the session.
    pub async fn escalate(&self) -> Result<()> {
        self.error_pending.wait().await;
        self.error_pending.reset();

        let text = lock(&self.error_message).clone();
        let err = Message::Err {
            display_name: self.display_name(),
            content: wire_safe(&text),
        };
        self.on_send(MessageType::Err)?;

        match self.outbound.link() {
            Link::Datagram(_) => self.outbound.deliver(&err).await?,
            Link::Stream(_) => {
                let reply_timeout = self.outbound.timers().reply_timeout;
                timeout(reply_timeout, self.outbound.deliver(&err))
                    .await
                    .map_err(|_| ChatError::DeliveryFailure("Sending ERR timed out.".into()))??
            }
        }
        Err(ChatError::SessionEnded(text))
    }

    // -----------------------------------------------------------------------
    // Interrupt
    // -----------------------------------------------------------------------

    /// After `interrupt` fires, send a single BYE and end cleanly.
    pub async fn shut_down<F>(&self, interrupt: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        interrupt.await;
        log::info!("interrupted, sending BYE");

        let bye = Message::Bye {
            display_name: self.display_name(),
        };
        if let Err(e) = self.on_send(MessageType::Bye) {
            log::warn!("{e}");
        }
        if let Err(e) = self.outbound.deliver(&bye).await {
            log::warn!("BYE on interrupt not delivered: {e}");
        }
        Ok(())
    }
}

/// Error text reduced to characters allowed in message content.
fn wire_safe(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_safe_replaces_non_printable() {
        assert_eq!(wire_safe("bad \"b\u{fffd}b\"\n"), "bad \"b?b\"?");
    }

    #[test]
    fn default_display_name_is_valid_on_the_wire() {
        crate::field::validate(crate::field::FieldKind::DisplayName, DEFAULT_DISPLAY_NAME)
            .unwrap();
    }
}
