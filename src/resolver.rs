//! Domain name resolution gateway
//!
//! Sessions never resolve names themselves; they go through the
//! [`Resolver`] trait so the lookup happens off the reactor thread and
//! the result comes back as an ordinary future completion. Tests swap in
//! fixed-answer resolvers.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;

/// Turns a domain name into a socket address.
#[async_trait]
pub trait Resolver {
    /// Resolve `domain` for a connection to `port`.
    ///
    /// `Ok(None)` means the name does not exist; `Err` is a resolver
    /// failure. Sessions treat both as an unreachable host.
    async fn resolve(&self, domain: &str, port: u16) -> io::Result<Option<SocketAddr>>;
}

/// Resolver backed by the operating system's name service.
///
/// `tokio::net::lookup_host` runs the blocking lookup on the runtime's
/// blocking pool, so the reactor thread never waits on DNS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, domain: &str, port: u16) -> io::Result<Option<SocketAddr>> {
        match tokio::net::lookup_host((domain, port)).await {
            Ok(mut addrs) => Ok(addrs.next()),
            // Name services report NXDOMAIN as an error; fold it into the
            // "not found" answer and keep real failures distinguishable
            // only in the logs.
            Err(err) => {
                tracing::debug!("lookup for {} failed: {}", domain, err);
                Ok(None)
            }
        }
    }
}
