//! Error types for socksd
//!
//! [`SocksError`] covers session-local protocol failures: malformed client
//! input closes one session, never the server. [`ProxyError`] is the
//! process-level type; listener and runtime failures surface through it
//! and terminate the process.

use std::io;
use thiserror::Error;

/// Main error type for socksd operations
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// SOCKS5 protocol error, fatal to a single session
    #[error("SOCKS5 error: {0}")]
    Socks(#[from] SocksError),

    /// Session-level connection error
    #[error("Connection error: {0}")]
    Connection(String),
}

/// SOCKS5 protocol errors raised while decoding client input.
///
/// Every variant is malformed input in the sense of the codec contract:
/// the client connection is closed without a reply.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SocksError {
    /// Unsupported SOCKS version byte
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Reserved byte was not 0x00
    #[error("Invalid reserved byte: {0:#04x}")]
    InvalidReserved(u8),

    /// Command byte outside the SOCKS5 command table
    #[error("Unknown command: {0:#04x}")]
    UnknownCommand(u8),

    /// Address type byte outside the SOCKS5 ATYP table
    #[error("Unknown address type: {0:#04x}")]
    UnknownAddressType(u8),

    /// Zero-length domain name in a connection request
    #[error("Invalid domain name length: {0}")]
    InvalidDomainLength(u8),

    /// Domain name bytes were not valid UTF-8
    #[error("Domain name is not valid UTF-8")]
    InvalidDomainEncoding,

    /// Reply code byte outside the SOCKS5 REP table
    #[error("Unknown reply code: {0:#04x}")]
    UnknownReplyCode(u8),

    /// Peer closed the connection in the middle of a handshake message
    #[error("Connection closed during handshake")]
    UnexpectedEof,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socks_error_display() {
        let err = SocksError::UnsupportedVersion(4);
        assert_eq!(format!("{}", err), "Unsupported SOCKS version: 4");

        let err = SocksError::UnknownCommand(0x99);
        assert_eq!(format!("{}", err), "Unknown command: 0x99");

        let err = SocksError::UnknownAddressType(0x02);
        assert_eq!(format!("{}", err), "Unknown address type: 0x02");

        let err = SocksError::InvalidDomainLength(0);
        assert_eq!(format!("{}", err), "Invalid domain name length: 0");

        let err = SocksError::UnexpectedEof;
        assert_eq!(format!("{}", err), "Connection closed during handshake");
    }

    #[test]
    fn test_proxy_error_display() {
        let err = ProxyError::Config("port must not be zero".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: port must not be zero"
        );

        let err = ProxyError::Connection("no destination".to_string());
        assert_eq!(format!("{}", err), "Connection error: no destination");
    }

    #[test]
    fn test_proxy_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::Other, "io error");
        let err: ProxyError = io_err.into();
        assert!(matches!(err, ProxyError::Io(_)));
    }

    #[test]
    fn test_proxy_error_from_socks() {
        let socks_err = SocksError::UnexpectedEof;
        let err: ProxyError = socks_err.into();
        assert!(matches!(err, ProxyError::Socks(_)));
    }
}
