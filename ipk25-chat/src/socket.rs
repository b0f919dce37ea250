//! Transport handles.
//!
//! Byte I/O only: framing lives in [`crate::line`] and [`crate::packet`],
//! reliability in [`crate::sender`].  Every send call writes one complete
//! frame, so the three session activities can share a handle without
//! interleaving partial frames.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Mutex;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};

use crate::error::Result;
use crate::line::LineBuffer;

/// Largest datagram the client accepts.
const MAX_DATAGRAM: usize = 65_535;
/// Size of one TCP read.
const READ_CHUNK: usize = 4096;

/// UDP socket talking to a single server whose port may change.
#[derive(Debug)]
pub struct DatagramSocket {
    pub local_addr: SocketAddr,
    inner: UdpSocket,
    peer: Mutex<SocketAddr>,
}

impl DatagramSocket {
    /// Bind an ephemeral port of the server's address family.
    pub async fn open(server: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let inner = UdpSocket::bind(local).await?;
        let local_addr = inner.local_addr()?;
        log::debug!("[udp] bound {local_addr}, server {server}");
        Ok(Self {
            local_addr,
            inner,
            peer: Mutex::new(server),
        })
    }

    /// Current destination of outgoing datagrams.
    pub fn peer(&self) -> SocketAddr {
        *self.peer.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Point outgoing datagrams at `source` if the server moved to it.
    pub fn follow(&self, source: SocketAddr) {
        let mut peer = self.peer.lock().unwrap_or_else(|p| p.into_inner());
        if *peer != source {
            log::info!("[udp] server now answers from {source} (was {})", *peer);
            *peer = source;
        }
    }

    /// Send one datagram to the current peer.
    pub async fn send(&self, datagram: &[u8]) -> Result<()> {
        let peer = self.peer();
        self.inner.send_to(datagram, peer).await?;
        Ok(())
    }

    /// Receive the next datagram and the address it came from.
    pub async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (n, source) = self.inner.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok((buf, source))
    }
}

/// Connect to the server and split the stream into its two halves.
pub async fn connect_stream(server: SocketAddr) -> Result<(StreamReader, StreamWriter)> {
    let stream = TcpStream::connect(server).await?;
    log::debug!("[tcp] connected {} → {server}", stream.local_addr()?);
    let (read, write) = stream.into_split();
    Ok((
        StreamReader {
            half: read,
            buffer: LineBuffer::new(),
        },
        StreamWriter {
            half: tokio::sync::Mutex::new(write),
        },
    ))
}

/// Write half of the TCP connection.  One `write_frame` call is one frame.
#[derive(Debug)]
pub struct StreamWriter {
    half: tokio::sync::Mutex<OwnedWriteHalf>,
}

impl StreamWriter {
    pub async fn write_frame(&self, frame: &[u8]) -> Result<()> {
        let mut half = self.half.lock().await;
        half.write_all(frame).await?;
        half.flush().await?;
        Ok(())
    }
}

/// Read half of the TCP connection with its framing buffer.
#[derive(Debug)]
pub struct StreamReader {
    half: OwnedReadHalf,
    buffer: LineBuffer,
}

impl StreamReader {
    /// Next complete line, or `None` once the server closed the connection.
    ///
    /// A line that outgrows the largest legal frame is a `MalformedFrame`.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.buffer.next_line()? {
                return Ok(Some(line));
            }
            let n = self.half.read(&mut chunk).await?;
            if n == 0 {
                if self.buffer.pending_len() > 0 {
                    log::warn!(
                        "[tcp] connection closed with {} unterminated bytes",
                        self.buffer.pending_len()
                    );
                }
                return Ok(None);
            }
            self.buffer.extend(&chunk[..n]);
        }
    }
}
