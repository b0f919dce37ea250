//! Outbound delivery for one session.
//!
//! [`Outbound`] is the only place that turns a [`Message`] into bytes on the
//! wire.  On TCP a delivery is a single frame write.  On UDP it is
//! stop-and-wait per message:
//!
//! ```text
//!  allocate id ─▶ send ─▶ wait CONFIRM(id) ──ok──▶ done
//!                  ▲            │ confirm_timeout
//!                  └── retry ◀──┘  (max_retries times, same id)
//!                                  then DeliveryFailure
//! ```
//!
//! CONFIRMs are recorded by the receive loop into [`Outbound::confirmations`].

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use tokio::time::timeout;

use crate::error::{ChatError, Result};
use crate::line;
use crate::message::Message;
use crate::packet::Packet;
use crate::signal::Confirmations;
use crate::socket::{DatagramSocket, StreamWriter};
use crate::timer::TimerConfig;

/// Write side of the transport.
#[derive(Debug, Clone)]
pub enum Link {
    Stream(Arc<StreamWriter>),
    Datagram(Arc<DatagramSocket>),
}

#[derive(Debug)]
pub struct Outbound {
    link: Link,
    /// Id of the next datagram; starts at 0 and wraps.
    next_id: AtomicU16,
    confirmations: Confirmations,
    timers: TimerConfig,
}

impl Outbound {
    pub fn new(link: Link, timers: TimerConfig) -> Self {
        Self {
            link,
            next_id: AtomicU16::new(0),
            confirmations: Confirmations::new(),
            timers,
        }
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn confirmations(&self) -> &Confirmations {
        &self.confirmations
    }

    pub fn timers(&self) -> &TimerConfig {
        &self.timers
    }

    /// Deliver `message` once (TCP) or until confirmed (UDP).
    ///
    /// UDP gives up with [`ChatError::DeliveryFailure`] after
    /// [`TimerConfig::attempts`] transmissions.
    pub async fn deliver(&self, message: &Message) -> Result<()> {
        match &self.link {
            Link::Stream(writer) => {
                let frame = line::encode(message)?;
                writer.write_frame(&frame).await?;
                log::debug!("[tcp] → {}", message.message_type());
                Ok(())
            }
            Link::Datagram(socket) => self.deliver_datagram(socket, message).await,
        }
    }

    async fn deliver_datagram(&self, socket: &DatagramSocket, message: &Message) -> Result<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let kind = message.message_type();
        let datagram = Packet::new(id, message.clone()).encode()?;
        self.confirmations.clear(id);

        let attempts = self.timers.attempts();
        for attempt in 1..=attempts {
            socket.send(&datagram).await?;
            log::debug!("[udp] → {kind} id={id} attempt={attempt}/{attempts}");

            match timeout(self.timers.confirm_timeout, self.confirmations.wait_for(id)).await {
                Ok(()) => {
                    log::debug!("[udp] ← CONFIRM id={id}");
                    return Ok(());
                }
                Err(_elapsed) if attempt < attempts => {
                    log::warn!("[udp] no CONFIRM for {kind} id={id}, retransmitting");
                }
                Err(_elapsed) => {}
            }
        }

        Err(ChatError::DeliveryFailure(format!(
            "{kind} was not confirmed after {attempts} attempts."
        )))
    }

    /// Acknowledge datagram `id`.  UDP only; a no-op on TCP.
    pub async fn send_confirm(&self, id: u16) -> Result<()> {
        if let Link::Datagram(socket) = &self.link {
            socket.send(&Packet::confirm(id).encode()?).await?;
            log::debug!("[udp] → CONFIRM ref={id}");
        }
        Ok(())
    }
}
