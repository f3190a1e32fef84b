//! Outbound connection establishment
//!
//! The [`Connector`] trait is the session's seam for dialing the
//! destination, so unit tests can hand back in-memory streams and count
//! connect attempts. [`TcpConnector`] is the real implementation.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Dials destination addresses on behalf of sessions.
#[async_trait]
pub trait Connector {
    /// The destination-facing stream type.
    type Stream: AsyncRead + AsyncWrite + Unpin;

    /// Open a connection to `addr`.
    ///
    /// Returns the stream and the locally bound address, which the
    /// session reports to the client in the success reply.
    async fn connect(&self, addr: SocketAddr) -> io::Result<(Self::Stream, SocketAddr)>;
}

/// TCP connector with a connect timeout.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    /// Create a connector that gives up on a destination after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        TcpConnector { timeout }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, addr: SocketAddr) -> io::Result<(TcpStream, SocketAddr)> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

        stream.set_nodelay(true)?;
        let bound = stream.local_addr()?;
        Ok((stream, bound))
    }
}
