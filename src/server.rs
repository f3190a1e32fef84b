//! Listener setup and accept loop
//!
//! The proxy runs on a single thread: a current-thread runtime is the
//! event source, and every session is a local task on it. Sessions never
//! touch each other's state, so one slow or broken peer only ever stalls
//! its own task.

use crate::config::ProxyConfig;
use crate::connector::TcpConnector;
use crate::error::ProxyError;
use crate::resolver::SystemResolver;
use crate::socks::Session;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// The listening proxy.
pub struct SocksProxy {
    config: ProxyConfig,
    listener: TcpListener,
}

impl SocksProxy {
    /// Bind the listening socket described by `config`.
    ///
    /// The socket is created through `socket2` so the backlog and address
    /// reuse can be set before `listen`. Must be called from within a
    /// tokio runtime.
    pub fn bind(config: ProxyConfig) -> Result<Self, ProxyError> {
        config.validate()?;

        let addr = SocketAddr::new(config.bind_addr, config.port);
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(config.backlog as i32)?;
        socket.set_nonblocking(true)?;

        let listener = TcpListener::from_std(socket.into())?;
        Ok(SocksProxy { config, listener })
    }

    /// The address the listener is actually bound to.
    ///
    /// Differs from the configured address when the configured port is 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, spawning a local task per session.
    ///
    /// Must run inside a [`tokio::task::LocalSet`].
    pub async fn serve(self) -> Result<(), ProxyError> {
        info!("listening on {}", self.local_addr()?);

        let connect_timeout = Duration::from_secs(self.config.connect_timeout);
        let relay_capacity = self.config.relay_buffer_size;

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("accepted connection from {}", peer);
                    if let Err(err) = stream.set_nodelay(true) {
                        debug!("failed to set nodelay for {}: {}", peer, err);
                    }

                    let session = Session::new(
                        stream,
                        peer,
                        TcpConnector::new(connect_timeout),
                        SystemResolver,
                        relay_capacity,
                    );
                    tokio::task::spawn_local(async move {
                        match session.run().await {
                            Ok(()) => debug!("session with {} finished", peer),
                            Err(err) => debug!("session with {} ended: {}", peer, err),
                        }
                    });
                }
                Err(err) => {
                    // Transient accept failures (EMFILE and friends) must
                    // not take the listener down.
                    warn!("failed to accept connection: {}", err);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = ProxyConfig {
            bind_addr: "127.0.0.1".parse().unwrap(),
            port: 0,
            ..ProxyConfig::default()
        };

        let proxy = SocksProxy::bind(config).unwrap();
        let addr = proxy.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let config = ProxyConfig {
            relay_buffer_size: 0,
            ..ProxyConfig::default()
        };
        assert!(matches!(
            SocksProxy::bind(config),
            Err(ProxyError::Config(_))
        ));
    }
}
