//! # socksd - Single-Threaded SOCKS5 CONNECT Proxy
//!
//! socksd is a SOCKS5 proxy server that supports the `CONNECT` command
//! with no authentication. It listens on a TCP port, performs the SOCKS5
//! handshake with each client, opens a connection to the requested
//! destination, and relays bytes in both directions until either side
//! closes.
//!
//! ## Features
//!
//! - **Single-Threaded**: All sessions run as local tasks on one
//!   current-thread runtime; no locks, no cross-thread handoff
//! - **Full Address Support**: IPv4, IPv6, and domain destinations, with
//!   asynchronous name resolution
//! - **Explicit Backpressure**: A fixed-size buffer per relay direction;
//!   a slow receiver suspends only the paired sender
//! - **Graceful Half-Close**: A peer's EOF is forwarded as a write
//!   shutdown after in-flight bytes drain, never as a full close
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksd::{ProxyConfig, SocksProxy};
//!
//! fn main() -> anyhow::Result<()> {
//!     let runtime = tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()?;
//!     let local = tokio::task::LocalSet::new();
//!
//!     local.block_on(&runtime, async {
//!         let proxy = SocksProxy::bind(ProxyConfig::default())?;
//!         proxy.serve().await
//!     })?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client -> socksd -> Destination
//! ```
//!
//! Each accepted connection becomes a [`socks::Session`] that walks the
//! protocol phases (greeting, request, resolve, connect, reply) and then
//! hands both sockets to the relay. Wire parsing lives in
//! [`socks::codec`] and touches no sockets at all.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod connector;
pub mod error;
pub mod resolver;
pub mod server;
pub mod socks;

// Re-export commonly used items
pub use config::{load_config, ProxyConfig};
pub use connector::{Connector, TcpConnector};
pub use error::{ProxyError, SocksError};
pub use resolver::{Resolver, SystemResolver};
pub use server::SocksProxy;

/// Version of the socksd library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
