//! Session configuration consumed read-only by the core.

use std::fmt;
use std::net::SocketAddr;

use clap::ValueEnum;

use crate::error::{ChatError, Result};
use crate::timer::TimerConfig;

/// Default IPK25-CHAT server port.
pub const DEFAULT_PORT: u16 = 4567;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Text frames over a TCP stream.
    Tcp,
    /// Binary frames over UDP with CONFIRM and retransmission.
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: Transport,
    pub server: SocketAddr,
    pub timers: TimerConfig,
}

impl ClientConfig {
    pub fn new(transport: Transport, server: SocketAddr) -> Self {
        Self {
            transport,
            server,
            timers: TimerConfig::default(),
        }
    }

    pub fn with_timers(mut self, timers: TimerConfig) -> Self {
        self.timers = timers;
        self
    }
}

/// Resolve `host` (IP literal or hostname) to a socket address.
///
/// IPv4 results are preferred.
pub async fn resolve_server(host: &str, port: u16) -> Result<SocketAddr> {
    if host.is_empty() {
        return Err(ChatError::Argument("Server address must not be empty.".into()));
    }
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ChatError::Argument(format!("Cannot resolve server {host:?}: {e}")))?
        .collect();

    candidates
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| ChatError::Argument(format!("No address found for server {host:?}.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_ip_literal() {
        let addr = resolve_server("127.0.0.1", DEFAULT_PORT).await.unwrap();
        assert_eq!(addr, "127.0.0.1:4567".parse().unwrap());
    }

    #[tokio::test]
    async fn resolves_localhost_preferring_ipv4() {
        let addr = resolve_server("localhost", 9000).await.unwrap();
        assert_eq!(addr.port(), 9000);
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn empty_host_is_argument_error() {
        assert!(matches!(
            resolve_server("", 1).await,
            Err(ChatError::Argument(_))
        ));
    }

    #[test]
    fn default_timers_are_applied() {
        let cfg = ClientConfig::new(Transport::Udp, "127.0.0.1:4567".parse().unwrap());
        assert_eq!(cfg.timers, TimerConfig::default());
        assert_eq!(cfg.transport.to_string(), "udp");
    }
}
