//! Configuration types and parsing for the proxy.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;

use crate::error::ProxyError;

/// Default listen port
fn default_port() -> u16 {
    1080
}

/// Default bind address
fn default_bind_addr() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

/// Default listen backlog
fn default_backlog() -> u32 {
    10
}

/// Default per-direction relay buffer size in bytes
fn default_relay_buffer_size() -> usize {
    1024
}

/// Default outbound connect timeout in seconds
fn default_connect_timeout() -> u64 {
    10
}

/// Proxy configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind the listener to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: IpAddr,

    /// Listen backlog passed to the kernel
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Relay buffer size per direction, in bytes
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,

    /// Outbound connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_addr: default_bind_addr(),
            backlog: default_backlog(),
            relay_buffer_size: default_relay_buffer_size(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl ProxyConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.backlog == 0 {
            return Err(ProxyError::Config("backlog must be non-zero".to_string()));
        }
        // listen(2) takes the backlog as an i32.
        if self.backlog > i32::MAX as u32 {
            return Err(ProxyError::Config(format!(
                "backlog must be at most {}",
                i32::MAX
            )));
        }
        if self.relay_buffer_size == 0 {
            return Err(ProxyError::Config(
                "relay_buffer_size must be non-zero".to_string(),
            ));
        }
        if self.connect_timeout == 0 {
            return Err(ProxyError::Config(
                "connect_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ProxyConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<ProxyConfig> {
    toml::from_str(content).with_context(|| "Failed to parse configuration")
}
