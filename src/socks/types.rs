//! SOCKS5 protocol types
//!
//! Typed views of the enumerated wire fields: commands, authentication
//! methods, reply codes and addresses. The address type byte on the wire
//! is derived from the [`Address`] variant, so a mismatched ATYP/value
//! pair cannot be constructed.

use crate::socks::consts::*;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// SOCKS5 command from a connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// Establish a TCP stream connection (the only supported command)
    Connect,
    /// Establish a TCP port binding (recognized, rejected)
    Bind,
    /// Associate a UDP port (recognized, rejected)
    UdpAssociate,
}

impl SocksCommand {
    /// Map a wire command byte to a command, `None` for unknown bytes.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            SOCKS5_CMD_TCP_BIND => Some(SocksCommand::Bind),
            SOCKS5_CMD_UDP_ASSOCIATE => Some(SocksCommand::UdpAssociate),
            _ => None,
        }
    }

    /// The wire byte for this command.
    pub fn as_byte(&self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS5_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS5_CMD_TCP_BIND,
            SocksCommand::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// Authentication method chosen in a greeting response.
///
/// The proxy only ever selects one of these two; other method ids offered
/// by clients are carried in the greeting but never chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required (0x00)
    NoAuth,
    /// No acceptable method (0xFF); the connection closes after the reply
    NoAcceptable,
}

impl AuthMethod {
    /// The wire byte for this method.
    pub fn as_byte(&self) -> u8 {
        match self {
            AuthMethod::NoAuth => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::NoAcceptable => SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE,
        }
    }
}

/// Reply codes for SOCKS5 connection responses (RFC 1928 section 6).
///
/// The full table is representable; the proxy itself only emits
/// [`Succeeded`](ReplyCode::Succeeded),
/// [`HostUnreachable`](ReplyCode::HostUnreachable) and
/// [`CommandNotSupported`](ReplyCode::CommandNotSupported).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    /// Request granted
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<ReplyCode> for u8 {
    fn from(code: ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for ReplyCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ReplyCode::Succeeded),
            0x01 => Ok(ReplyCode::GeneralFailure),
            0x02 => Ok(ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(ReplyCode::NetworkUnreachable),
            0x04 => Ok(ReplyCode::HostUnreachable),
            0x05 => Ok(ReplyCode::ConnectionRefused),
            0x06 => Ok(ReplyCode::TtlExpired),
            0x07 => Ok(ReplyCode::CommandNotSupported),
            0x08 => Ok(ReplyCode::AddressTypeNotSupported),
            other => Err(other),
        }
    }
}

/// A destination or bound address as it appears on the wire.
///
/// The variant determines the ATYP byte, so encoding an IPv4 reply with a
/// domain value is unrepresentable rather than a runtime error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// IPv4 literal (ATYP 0x01)
    Ipv4(Ipv4Addr),
    /// Length-prefixed domain name (ATYP 0x03)
    Domain(String),
    /// IPv6 literal (ATYP 0x04)
    Ipv6(Ipv6Addr),
}

impl Address {
    /// The ATYP byte for this address variant.
    pub fn atyp(&self) -> u8 {
        match self {
            Address::Ipv4(_) => SOCKS5_ADDR_TYPE_IPV4,
            Address::Domain(_) => SOCKS5_ADDR_TYPE_DOMAIN,
            Address::Ipv6(_) => SOCKS5_ADDR_TYPE_IPV6,
        }
    }

    /// Whether this address needs a resolver before it can be dialed.
    pub fn is_domain(&self) -> bool {
        matches!(self, Address::Domain(_))
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Address::Ipv4(v4),
            IpAddr::V6(v6) => Address::Ipv6(v6),
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        addr.ip().into()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ipv4(ip) => write!(f, "{}", ip),
            Address::Domain(domain) => write!(f, "{}", domain),
            Address::Ipv6(ip) => write!(f, "{}", ip),
        }
    }
}
