//! SOCKS5 protocol implementation (RFC 1928)
//!
//! This module contains everything protocol-specific: wire constants,
//! message types, the incremental codec, the per-connection session
//! state machine, and the bidirectional relay that carries application
//! bytes after the handshake. Only the `CONNECT` command is supported.

pub mod codec;
pub mod consts;
pub mod relay;
pub mod session;
pub mod types;

pub use codec::{ConnectReply, ConnectRequest, Greeting, GreetingResponse};
pub use relay::relay;
pub use session::{Phase, Session};
pub use types::{Address, AuthMethod, ReplyCode, SocksCommand};
