//! Transport seams and their tokio implementations.
//!
//! The protocol core only ever talks to two traits: a fire-and-forget
//! datagram sender for probes and gossip, and a dial-and-round-trip exchange
//! for anti-entropy. The tokio implementations here are what `Cluster::bind`
//! wires in; tests substitute in-memory ones.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use crate::address::NodeAddress;
use crate::error::GossipError;

/// Boxed future type for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Largest frame accepted on the reliable exchange; anything bigger is a
/// protocol violation, not a bigger buffer.
const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Fire-and-forget datagram delivery for probes, acks, and gossip fan-out.
pub trait DatagramTransport: Send + Sync {
    /// Sends one datagram to `dest`. Failures affect only this send.
    fn send_to<'a>(
        &'a self,
        payload: &'a [u8],
        dest: &'a NodeAddress,
    ) -> BoxFuture<'a, Result<(), GossipError>>;
}

/// Synchronous request/response round-trip for anti-entropy exchanges.
pub trait ExchangeTransport: Send + Sync {
    /// Dials `dest`, sends `request`, and returns the peer's response.
    fn exchange<'a>(
        &'a self,
        dest: &'a NodeAddress,
        request: &'a [u8],
    ) -> BoxFuture<'a, Result<Vec<u8>, GossipError>>;
}

/// UDP-backed datagram transport.
#[derive(Debug)]
pub struct UdpDatagramTransport {
    socket: Arc<UdpSocket>,
}

impl UdpDatagramTransport {
    /// Binds a UDP socket on `addr`.
    pub async fn bind(addr: SocketAddr) -> Result<Self, GossipError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr, GossipError> {
        Ok(self.socket.local_addr()?)
    }

    /// Handle to the socket for the inbound receive loop.
    pub(crate) fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

impl DatagramTransport for UdpDatagramTransport {
    fn send_to<'a>(
        &'a self,
        payload: &'a [u8],
        dest: &'a NodeAddress,
    ) -> BoxFuture<'a, Result<(), GossipError>> {
        Box::pin(async move {
            self.socket.send_to(payload, dest.socket_addr()).await?;
            Ok(())
        })
    }
}

/// TCP-backed exchange transport with a whole-round-trip deadline.
#[derive(Debug, Clone)]
pub struct TcpExchangeTransport {
    timeout: Duration,
}

impl TcpExchangeTransport {
    /// Creates a transport whose dial + write + read must finish within
    /// `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ExchangeTransport for TcpExchangeTransport {
    fn exchange<'a>(
        &'a self,
        dest: &'a NodeAddress,
        request: &'a [u8],
    ) -> BoxFuture<'a, Result<Vec<u8>, GossipError>> {
        Box::pin(async move {
            let round_trip = async {
                let mut stream = TcpStream::connect(dest.socket_addr()).await?;
                write_frame(&mut stream, request).await?;
                read_frame(&mut stream).await
            };
            tokio::time::timeout(self.timeout, round_trip)
                .await
                .map_err(|_| {
                    GossipError::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("exchange with {dest} timed out"),
                    ))
                })?
        })
    }
}

/// Writes one length-prefixed frame.
pub(crate) async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), GossipError>
where
    W: AsyncWriteExt + Unpin,
{
    let len = u32::try_from(payload.len())
        .map_err(|_| GossipError::Protocol("frame too large to encode".to_string()))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame.
pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, GossipError>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(GossipError::Protocol(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_BYTES}-byte limit"
        )));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}
