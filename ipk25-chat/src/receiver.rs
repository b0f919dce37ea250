//! Receive loop: everything that happens to a frame after it leaves the
//! socket.
//!
//! For each inbound frame:
//! 1. UDP only: CONFIRM its id, before decoding and even for duplicates.
//! 2. Decode; a malformed frame is raised as a session error.
//! 3. UDP only: record CONFIRMs for the sender, skip side effects of ids
//!    already seen.
//! 4. Run the receive-side transition and act on the outcome.
//!
//! The loop returns `Ok(())` when the server ends the session (BYE, ERR or
//! a closed TCP connection).

use std::sync::Arc;

use tokio::time::{timeout_at, Instant};

use crate::connection::Session;
use crate::dedup::SeenIds;
use crate::error::{ChatError, Result};
use crate::line;
use crate::message::{Message, MessageType};
use crate::packet::{self, Packet};
use crate::socket::{DatagramSocket, StreamReader};
use crate::state::ReceiveOutcome;

/// Read side of the transport.
#[derive(Debug)]
pub enum Inbound {
    Stream(StreamReader),
    Datagram(Arc<DatagramSocket>),
}

/// Whether the receive loop keeps going after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
    /// An error was raised; back off before reading on.
    Raised,
}

pub async fn run(session: &Session, inbound: Inbound) -> Result<()> {
    match inbound {
        Inbound::Stream(reader) => receive_stream(session, reader).await,
        Inbound::Datagram(socket) => receive_datagrams(session, &socket).await,
    }
}

async fn receive_stream(session: &Session, mut reader: StreamReader) -> Result<()> {
    loop {
        let frame = match reader.next_line().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("[tcp] server closed the connection");
                return Ok(());
            }
            Err(e @ ChatError::MalformedFrame(_)) => {
                session.raise(e.to_string());
                tokio::time::sleep(session.outbound().timers().error_pause).await;
                continue;
            }
            Err(e) => return Err(e),
        };

        let flow = match line::decode(&frame) {
            Ok(message) => {
                log::debug!("[tcp] ← {}", message.message_type());
                handle(session, message)
            }
            Err(e) => {
                session.raise(e.to_string());
                Flow::Raised
            }
        };

        match flow {
            Flow::Continue => {}
            Flow::Stop => return Ok(()),
            Flow::Raised => tokio::time::sleep(session.outbound().timers().error_pause).await,
        }
    }
}

async fn receive_datagrams(session: &Session, socket: &DatagramSocket) -> Result<()> {
    let mut seen = SeenIds::new();

    loop {
        let Some(datagram) = next_datagram(session, socket).await? else {
            continue;
        };

        let packet = match Packet::decode(&datagram) {
            Ok(packet) => packet,
            Err(e) => {
                session.raise(e.to_string());
                quiet_period(session, socket).await?;
                continue;
            }
        };

        if let Message::Confirm { ref_id } = packet.message {
            session.outbound().confirmations().acknowledge(ref_id);
            continue;
        }

        log::debug!("[udp] ← {} id={}", packet.message.message_type(), packet.id);
        if !seen.first_sight(packet.id) {
            log::debug!("[udp] duplicate id={} suppressed", packet.id);
            continue;
        }

        match handle(session, packet.message) {
            Flow::Continue => {}
            Flow::Stop => return Ok(()),
            Flow::Raised => quiet_period(session, socket).await?,
        }
    }
}

/// Receive one datagram from the server and CONFIRM it unless it is itself
/// a CONFIRM.  `None` for datagrams from other hosts.
async fn next_datagram(session: &Session, socket: &DatagramSocket) -> Result<Option<Vec<u8>>> {
    let (datagram, source) = socket.recv().await?;
    if source.ip() != socket.peer().ip() {
        log::warn!("[udp] dropping datagram from unknown host {source}");
        return Ok(None);
    }
    socket.follow(source);

    if let Some((tag, id)) = packet::peek_header(&datagram) {
        if tag != MessageType::Confirm.to_u8() {
            session.outbound().send_confirm(id).await?;
        }
    }
    Ok(Some(datagram))
}

/// Back off after raising an error, giving the escalation task time to get
/// its ERR confirmed.
///
/// CONFIRMs are still recorded; every other datagram is acknowledged and
/// dropped.
async fn quiet_period(session: &Session, socket: &DatagramSocket) -> Result<()> {
    let deadline = Instant::now() + session.outbound().timers().error_pause;
    while let Ok(received) = timeout_at(deadline, next_datagram(session, socket)).await {
        let Some(datagram) = received? else {
            continue;
        };
        if let Ok(Packet {
            message: Message::Confirm { ref_id },
            ..
        }) = Packet::decode(&datagram)
        {
            session.outbound().confirmations().acknowledge(ref_id);
        } else if let Some((tag, id)) = packet::peek_header(&datagram) {
            log::debug!("[udp] dropped type={tag:#04x} id={id} during error pause");
        }
    }
    Ok(())
}

fn handle(session: &Session, message: Message) -> Flow {
    let kind = message.message_type();

    match session.on_receive(kind) {
        ReceiveOutcome::Accepted => {
            show(session, &message);
            if matches!(kind, MessageType::Reply | MessageType::NotReply) {
                session.reply_ready().set();
            }
            Flow::Continue
        }
        ReceiveOutcome::AcceptedTerminal => {
            show(session, &message);
            log::info!("server ended the session with {kind}");
            Flow::Stop
        }
        ReceiveOutcome::Rejected(reason) => {
            session.raise(reason.to_string());
            Flow::Raised
        }
    }
}

fn show(session: &Session, message: &Message) {
    if let Some(text) = message.display_line() {
        session.console().line(text);
    }
}
