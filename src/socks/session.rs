//! Per-connection SOCKS5 session
//!
//! One [`Session`] exists per accepted client connection and owns both
//! socket halves for its whole life: the client stream from accept, and
//! the destination stream once the outbound connect succeeds. The
//! [`Phase`] field is the single source of truth for what happens to the
//! next piece of I/O; every handshake step consumes the current phase and
//! produces the next one. A protocol failure closes this session only,
//! never its neighbours.

use crate::connector::Connector;
use crate::error::{ProxyError, SocksError};
use crate::resolver::Resolver;
use crate::socks::codec::{self, ConnectReply, GreetingResponse};
use crate::socks::consts::SOCKS5_AUTH_METHOD_NONE;
use crate::socks::relay::relay;
use crate::socks::types::{Address, AuthMethod, ReplyCode, SocksCommand};
use bytes::BytesMut;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Initial capacity of the handshake read buffer; the largest handshake
/// message (a domain request) is 262 bytes.
const HANDSHAKE_BUFFER: usize = 512;

/// Protocol phase of a session.
///
/// "Close after the reply is flushed" is part of the flush variant rather
/// than a session-wide flag, so a relaying session that is also marked
/// for close cannot be expressed.
#[derive(Debug)]
pub enum Phase {
    /// Waiting for the client greeting.
    AwaitingGreeting,
    /// Greeting answered; waiting for the connection request.
    AwaitingConnectionRequest,
    /// Request named a domain; waiting on the resolver.
    ResolvingAddress {
        /// Domain from the request.
        domain: String,
        /// Destination port from the request.
        port: u16,
    },
    /// Dialing the destination.
    ConnectingToDestination {
        /// Resolved or literal destination address.
        addr: SocketAddr,
    },
    /// Writing the connection reply to the client.
    AwaitingConnResponseFlush {
        /// The reply to deliver.
        reply: ConnectReply,
        /// Close the session once the reply is fully written.
        close_after: bool,
    },
    /// Steady-state bidirectional relay.
    Relaying,
    /// Both sides closed; the session is finished.
    Closed,
}

/// State for one proxied client connection.
pub struct Session<C, T, R>
where
    T: Connector,
{
    client: C,
    peer: SocketAddr,
    dest: Option<T::Stream>,
    phase: Phase,
    inbound: BytesMut,
    relay_capacity: usize,
    connector: T,
    resolver: R,
}

impl<C, T, R> Session<C, T, R>
where
    C: AsyncRead + AsyncWrite + Unpin,
    T: Connector,
    R: Resolver,
{
    /// Create a session for a freshly accepted client connection.
    pub fn new(client: C, peer: SocketAddr, connector: T, resolver: R, relay_capacity: usize) -> Self {
        Session {
            client,
            peer,
            dest: None,
            phase: Phase::AwaitingGreeting,
            inbound: BytesMut::with_capacity(HANDSHAKE_BUFFER),
            relay_capacity,
            connector,
            resolver,
        }
    }

    /// Drive the session from greeting to close.
    ///
    /// Returns `Ok(())` on a clean close from any phase; an error means
    /// the session was torn down early (malformed input, I/O failure).
    /// Both sockets are closed when this returns either way.
    pub async fn run(mut self) -> Result<(), ProxyError> {
        loop {
            let phase = std::mem::replace(&mut self.phase, Phase::Closed);
            debug!("session with {} in phase {:?}", self.peer, phase);

            self.phase = match phase {
                Phase::AwaitingGreeting => self.await_greeting().await?,
                Phase::AwaitingConnectionRequest => self.await_request().await?,
                Phase::ResolvingAddress { domain, port } => {
                    self.resolve_address(domain, port).await?
                }
                Phase::ConnectingToDestination { addr } => self.connect_destination(addr).await?,
                Phase::AwaitingConnResponseFlush { reply, close_after } => {
                    self.flush_reply(reply, close_after).await?
                }
                Phase::Relaying => self.run_relay().await?,
                Phase::Closed => return Ok(()),
            };
        }
    }

    /// Read more client bytes into the handshake buffer.
    async fn read_more(&mut self) -> Result<(), ProxyError> {
        let n = self.client.read_buf(&mut self.inbound).await?;
        if n == 0 {
            return Err(SocksError::UnexpectedEof.into());
        }
        Ok(())
    }

    async fn await_greeting(&mut self) -> Result<Phase, ProxyError> {
        let greeting = loop {
            if let Some(greeting) = codec::decode_greeting(&mut self.inbound)? {
                break greeting;
            }
            self.read_more().await?;
        };

        let method = if greeting.offers(SOCKS5_AUTH_METHOD_NONE) {
            AuthMethod::NoAuth
        } else {
            debug!("client {} offered no acceptable auth method", self.peer);
            AuthMethod::NoAcceptable
        };

        let mut out = BytesMut::new();
        codec::encode_greeting_response(&GreetingResponse { method }, &mut out);
        self.client.write_all(&out).await?;
        self.client.flush().await?;

        match method {
            AuthMethod::NoAuth => Ok(Phase::AwaitingConnectionRequest),
            AuthMethod::NoAcceptable => {
                // The rejection must reach the client before the close.
                let _ = self.client.shutdown().await;
                Ok(Phase::Closed)
            }
        }
    }

    async fn await_request(&mut self) -> Result<Phase, ProxyError> {
        let request = loop {
            if let Some(request) = codec::decode_request(&mut self.inbound)? {
                break request;
            }
            self.read_more().await?;
        };

        info!(
            "{} requested {} to {}:{}",
            self.peer, request.command, request.addr, request.port
        );

        match request.command {
            SocksCommand::Connect => Ok(match request.addr {
                Address::Ipv4(ip) => Phase::ConnectingToDestination {
                    addr: SocketAddr::new(ip.into(), request.port),
                },
                Address::Ipv6(ip) => Phase::ConnectingToDestination {
                    addr: SocketAddr::new(ip.into(), request.port),
                },
                Address::Domain(domain) => Phase::ResolvingAddress {
                    domain,
                    port: request.port,
                },
            }),
            SocksCommand::Bind | SocksCommand::UdpAssociate => {
                debug!("rejecting unsupported command {}", request.command);
                Ok(Phase::AwaitingConnResponseFlush {
                    reply: ConnectReply::failure(ReplyCode::CommandNotSupported),
                    close_after: true,
                })
            }
        }
    }

    async fn resolve_address(&mut self, domain: String, port: u16) -> Result<Phase, ProxyError> {
        match self.resolver.resolve(&domain, port).await {
            Ok(Some(addr)) => Ok(Phase::ConnectingToDestination { addr }),
            Ok(None) => {
                debug!("unable to resolve {} for {}", domain, self.peer);
                Ok(Phase::AwaitingConnResponseFlush {
                    reply: ConnectReply::failure(ReplyCode::HostUnreachable),
                    close_after: true,
                })
            }
            Err(err) => {
                debug!("resolver failed for {}: {}", domain, err);
                Ok(Phase::AwaitingConnResponseFlush {
                    reply: ConnectReply::failure(ReplyCode::HostUnreachable),
                    close_after: true,
                })
            }
        }
    }

    async fn connect_destination(&mut self, addr: SocketAddr) -> Result<Phase, ProxyError> {
        match self.connector.connect(addr).await {
            Ok((stream, bound)) => {
                debug!("connected to {} on behalf of {}", addr, self.peer);
                self.dest = Some(stream);
                Ok(Phase::AwaitingConnResponseFlush {
                    reply: ConnectReply::granted(bound),
                    close_after: false,
                })
            }
            Err(err) => {
                debug!("unable to connect to {}: {}", addr, err);
                Ok(Phase::AwaitingConnResponseFlush {
                    reply: ConnectReply::failure(ReplyCode::HostUnreachable),
                    close_after: true,
                })
            }
        }
    }

    async fn flush_reply(&mut self, reply: ConnectReply, close_after: bool) -> Result<Phase, ProxyError> {
        let mut out = BytesMut::new();
        codec::encode_reply(&reply, &mut out);
        self.client.write_all(&out).await?;
        self.client.flush().await?;

        if close_after {
            let _ = self.client.shutdown().await;
            self.dest = None;
            Ok(Phase::Closed)
        } else {
            Ok(Phase::Relaying)
        }
    }

    async fn run_relay(&mut self) -> Result<Phase, ProxyError> {
        // Client bytes that arrived behind the connect request belong to
        // the destination and must go out first.
        let leftover = self.inbound.split();

        let Session { client, dest, relay_capacity, .. } = self;
        let dest_stream = dest.as_mut().ok_or_else(|| {
            ProxyError::Connection("no destination stream in relay phase".to_string())
        })?;

        let (to_dest, to_client) = relay(client, dest_stream, *relay_capacity, &leftover).await?;

        info!(
            "session with {} closed: {} bytes out, {} bytes in",
            self.peer, to_dest, to_client
        );
        self.dest = None;
        Ok(Phase::Closed)
    }
}
