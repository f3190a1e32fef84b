//! SOCKS5 wire codec
//!
//! Pure encode/decode for the four handshake messages. Decoding works on
//! an accumulating [`BytesMut`]: a function either consumes exactly one
//! full message and returns it, returns `Ok(None)` leaving the buffer
//! untouched when more bytes are needed, or fails with a [`SocksError`]
//! on malformed input (the caller then closes the client connection).
//! Encoding is total over the typed messages; the ATYP byte always comes
//! from the [`Address`] variant. All numeric fields are big-endian.

use crate::error::SocksError;
use crate::socks::consts::*;
use crate::socks::types::{Address, AuthMethod, ReplyCode, SocksCommand};
use bytes::{Buf, BufMut, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

/// Client greeting.
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 0 to 255 |
/// +----+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Offered authentication method ids, in wire order.
    ///
    /// Unknown ids are carried as-is; they are simply never chosen.
    pub methods: Vec<u8>,
}

impl Greeting {
    /// Whether the client offered the given method id.
    pub fn offers(&self, method: u8) -> bool {
        self.methods.contains(&method)
    }
}

/// Server greeting response: the chosen authentication method.
///
/// ```text
/// +----+--------+
/// |VER | METHOD |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreetingResponse {
    /// The method the server selected.
    pub method: AuthMethod,
}

/// Client connection request.
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Requested command (only CONNECT is served).
    pub command: SocksCommand,
    /// Destination address.
    pub addr: Address,
    /// Destination port.
    pub port: u16,
}

/// Server connection response.
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReply {
    /// Reply code.
    pub code: ReplyCode,
    /// Bound address reported to the client.
    pub addr: Address,
    /// Bound port reported to the client.
    pub port: u16,
}

impl ConnectReply {
    /// A reply reporting the locally bound address of the outbound socket.
    pub fn granted(bound: SocketAddr) -> Self {
        ConnectReply {
            code: ReplyCode::Succeeded,
            addr: bound.into(),
            port: bound.port(),
        }
    }

    /// An error reply; the bound address is the conventional 0.0.0.0:0.
    pub fn failure(code: ReplyCode) -> Self {
        ConnectReply {
            code,
            addr: Address::Ipv4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

/// Decode a client greeting from the front of `buf`.
///
/// Consumes the message bytes on success; leaves `buf` untouched when the
/// greeting is not yet complete.
pub fn decode_greeting(buf: &mut BytesMut) -> Result<Option<Greeting>, SocksError> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let version = buf[0];
    if version != SOCKS5_VERSION {
        return Err(SocksError::UnsupportedVersion(version));
    }

    let nmethods = buf[1] as usize;
    if buf.len() < 2 + nmethods {
        return Ok(None);
    }

    let methods = buf[2..2 + nmethods].to_vec();
    buf.advance(2 + nmethods);

    Ok(Some(Greeting { methods }))
}

/// Encode a greeting response into `dst`.
pub fn encode_greeting_response(response: &GreetingResponse, dst: &mut BytesMut) {
    dst.reserve(2);
    dst.put_u8(SOCKS5_VERSION);
    dst.put_u8(response.method.as_byte());
}

/// Decode a connection request from the front of `buf`.
pub fn decode_request(buf: &mut BytesMut) -> Result<Option<ConnectRequest>, SocksError> {
    // VER CMD RSV ATYP
    if buf.len() < 4 {
        return Ok(None);
    }

    let version = buf[0];
    if version != SOCKS5_VERSION {
        return Err(SocksError::UnsupportedVersion(version));
    }

    let command = SocksCommand::from_byte(buf[1]).ok_or(SocksError::UnknownCommand(buf[1]))?;

    if buf[2] != SOCKS5_RESERVED {
        return Err(SocksError::InvalidReserved(buf[2]));
    }

    let (addr, port, consumed) = match decode_address(&buf[3..])? {
        Some(parts) => parts,
        None => return Ok(None),
    };

    buf.advance(3 + consumed);

    Ok(Some(ConnectRequest {
        command,
        addr,
        port,
    }))
}

/// Encode a connection response into `dst`.
pub fn encode_reply(reply: &ConnectReply, dst: &mut BytesMut) {
    dst.reserve(4 + 1 + MAX_DOMAIN_LEN + 2);
    dst.put_u8(SOCKS5_VERSION);
    dst.put_u8(reply.code.into());
    dst.put_u8(SOCKS5_RESERVED);
    encode_address(&reply.addr, reply.port, dst);
}

/// Decode a connection response from the front of `buf`.
///
/// This is the client half of the codec; the proxy itself never reads
/// replies, but tests and SOCKS clients do.
pub fn decode_reply(buf: &mut BytesMut) -> Result<Option<ConnectReply>, SocksError> {
    // VER REP RSV ATYP
    if buf.len() < 4 {
        return Ok(None);
    }

    let version = buf[0];
    if version != SOCKS5_VERSION {
        return Err(SocksError::UnsupportedVersion(version));
    }

    let code = ReplyCode::try_from(buf[1]).map_err(SocksError::UnknownReplyCode)?;

    if buf[2] != SOCKS5_RESERVED {
        return Err(SocksError::InvalidReserved(buf[2]));
    }

    let (addr, port, consumed) = match decode_address(&buf[3..])? {
        Some(parts) => parts,
        None => return Ok(None),
    };

    buf.advance(3 + consumed);

    Ok(Some(ConnectReply { code, addr, port }))
}

/// Decode `ATYP ADDR PORT` from a slice starting at the ATYP byte.
///
/// Returns the address, the port, and the number of bytes consumed
/// including the ATYP byte, or `None` when the slice is too short.
fn decode_address(input: &[u8]) -> Result<Option<(Address, u16, usize)>, SocksError> {
    if input.is_empty() {
        return Ok(None);
    }

    match input[0] {
        SOCKS5_ADDR_TYPE_IPV4 => {
            // ATYP + 4 address bytes + 2 port bytes
            if input.len() < 1 + 4 + 2 {
                return Ok(None);
            }
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&input[1..5]);
            let port = u16::from_be_bytes([input[5], input[6]]);
            Ok(Some((Address::Ipv4(Ipv4Addr::from(octets)), port, 7)))
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            if input.len() < 2 {
                return Ok(None);
            }
            let len = input[1];
            if len == 0 {
                return Err(SocksError::InvalidDomainLength(len));
            }
            let len = len as usize;
            // ATYP + length byte + domain + port
            if input.len() < 2 + len + 2 {
                return Ok(None);
            }
            let domain = std::str::from_utf8(&input[2..2 + len])
                .map_err(|_| SocksError::InvalidDomainEncoding)?
                .to_string();
            let port = u16::from_be_bytes([input[2 + len], input[3 + len]]);
            Ok(Some((Address::Domain(domain), port, 2 + len + 2)))
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            if input.len() < 1 + 16 + 2 {
                return Ok(None);
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&input[1..17]);
            let port = u16::from_be_bytes([input[17], input[18]]);
            Ok(Some((Address::Ipv6(Ipv6Addr::from(octets)), port, 19)))
        }

        other => Err(SocksError::UnknownAddressType(other)),
    }
}

/// Encode `ATYP ADDR PORT` for the given address variant.
fn encode_address(addr: &Address, port: u16, dst: &mut BytesMut) {
    match addr {
        Address::Ipv4(ip) => {
            dst.put_u8(SOCKS5_ADDR_TYPE_IPV4);
            dst.put_slice(&ip.octets());
        }
        Address::Domain(domain) => {
            debug_assert!(domain.len() <= MAX_DOMAIN_LEN);
            dst.put_u8(SOCKS5_ADDR_TYPE_DOMAIN);
            dst.put_u8(domain.len() as u8);
            dst.put_slice(domain.as_bytes());
        }
        Address::Ipv6(ip) => {
            dst.put_u8(SOCKS5_ADDR_TYPE_IPV6);
            dst.put_slice(&ip.octets());
        }
    }
    dst.put_u16(port);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(bytes: &[u8]) -> BytesMut {
        BytesMut::from(bytes)
    }

    #[test]
    fn test_decode_greeting_no_auth() {
        let mut input = buf(&[0x05, 0x01, 0x00]);
        let greeting = decode_greeting(&mut input).unwrap().unwrap();
        assert_eq!(greeting.methods, vec![0x00]);
        assert!(greeting.offers(SOCKS5_AUTH_METHOD_NONE));
        assert!(input.is_empty());
    }

    #[test]
    fn test_decode_greeting_zero_methods() {
        let mut input = buf(&[0x05, 0x00]);
        let greeting = decode_greeting(&mut input).unwrap().unwrap();
        assert!(greeting.methods.is_empty());
        assert!(!greeting.offers(SOCKS5_AUTH_METHOD_NONE));
    }

    #[test]
    fn test_decode_greeting_many_methods() {
        let mut input = BytesMut::new();
        input.put_u8(0x05);
        input.put_u8(255);
        for i in 0..255u8 {
            input.put_u8(i);
        }
        let greeting = decode_greeting(&mut input).unwrap().unwrap();
        assert_eq!(greeting.methods.len(), 255);
        assert!(greeting.offers(0x00));
        assert!(input.is_empty());
    }

    #[test]
    fn test_decode_greeting_incomplete_leaves_buffer() {
        // Declares 3 methods but only 1 arrived so far.
        let mut input = buf(&[0x05, 0x03, 0x00]);
        let snapshot = input.clone();
        assert_eq!(decode_greeting(&mut input).unwrap(), None);
        assert_eq!(input, snapshot);

        // Not even the header yet.
        let mut input = buf(&[0x05]);
        assert_eq!(decode_greeting(&mut input).unwrap(), None);
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn test_decode_greeting_bad_version() {
        let mut input = buf(&[0x04, 0x01, 0x00]);
        assert_eq!(
            decode_greeting(&mut input).unwrap_err(),
            SocksError::UnsupportedVersion(0x04)
        );
    }

    #[test]
    fn test_encode_greeting_response() {
        let mut out = BytesMut::new();
        encode_greeting_response(
            &GreetingResponse {
                method: AuthMethod::NoAuth,
            },
            &mut out,
        );
        assert_eq!(&out[..], &[0x05, 0x00]);

        let mut out = BytesMut::new();
        encode_greeting_response(
            &GreetingResponse {
                method: AuthMethod::NoAcceptable,
            },
            &mut out,
        );
        assert_eq!(&out[..], &[0x05, 0xFF]);
    }

    fn ipv4_request(ip: [u8; 4], port: u16) -> BytesMut {
        let mut input = BytesMut::new();
        input.put_slice(&[0x05, 0x01, 0x00, 0x01]);
        input.put_slice(&ip);
        input.put_u16(port);
        input
    }

    #[test]
    fn test_decode_request_ipv4() {
        let mut input = ipv4_request([192, 168, 1, 1], 8080);
        let request = decode_request(&mut input).unwrap().unwrap();
        assert_eq!(request.command, SocksCommand::Connect);
        assert_eq!(request.addr, Address::Ipv4("192.168.1.1".parse().unwrap()));
        assert_eq!(request.port, 8080);
        assert!(input.is_empty());
    }

    #[test]
    fn test_decode_request_domain() {
        let mut input = BytesMut::new();
        input.put_slice(&[0x05, 0x01, 0x00, 0x03, 11]);
        input.put_slice(b"example.com");
        input.put_u16(443);

        let request = decode_request(&mut input).unwrap().unwrap();
        assert_eq!(request.addr, Address::Domain("example.com".to_string()));
        assert_eq!(request.port, 443);
        assert!(input.is_empty());
    }

    #[test]
    fn test_decode_request_ipv6() {
        let mut input = BytesMut::new();
        input.put_slice(&[0x05, 0x01, 0x00, 0x04]);
        input.put_slice(&[0u8; 15]);
        input.put_u8(1);
        input.put_u16(80);

        let request = decode_request(&mut input).unwrap().unwrap();
        assert_eq!(request.addr, Address::Ipv6("::1".parse().unwrap()));
        assert_eq!(request.port, 80);
    }

    #[test]
    fn test_decode_request_keeps_trailing_bytes() {
        // Early payload after the request must stay in the buffer.
        let mut input = ipv4_request([127, 0, 0, 1], 80);
        input.put_slice(b"early payload");

        decode_request(&mut input).unwrap().unwrap();
        assert_eq!(&input[..], b"early payload");
    }

    #[test]
    fn test_decode_request_incomplete_leaves_buffer() {
        let full = {
            let mut b = BytesMut::new();
            b.put_slice(&[0x05, 0x01, 0x00, 0x03, 11]);
            b.put_slice(b"example.com");
            b.put_u16(443);
            b
        };

        // Every proper prefix is incomplete and must not be consumed.
        for cut in 0..full.len() {
            let mut input = BytesMut::from(&full[..cut]);
            let snapshot = input.clone();
            assert_eq!(decode_request(&mut input).unwrap(), None, "cut at {}", cut);
            assert_eq!(input, snapshot, "cut at {}", cut);
        }
    }

    #[test]
    fn test_decode_request_bad_version() {
        let mut input = buf(&[0x04, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0, 80]);
        assert_eq!(
            decode_request(&mut input).unwrap_err(),
            SocksError::UnsupportedVersion(0x04)
        );
    }

    #[test]
    fn test_decode_request_unknown_command() {
        let mut input = buf(&[0x05, 0x99, 0x00, 0x01, 127, 0, 0, 1, 0, 80]);
        assert_eq!(
            decode_request(&mut input).unwrap_err(),
            SocksError::UnknownCommand(0x99)
        );
    }

    #[test]
    fn test_decode_request_bind_is_well_formed() {
        // BIND is a known command: the codec accepts it, the session
        // rejects it with a reply.
        let mut input = buf(&[0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0, 80]);
        let request = decode_request(&mut input).unwrap().unwrap();
        assert_eq!(request.command, SocksCommand::Bind);
    }

    #[test]
    fn test_decode_request_bad_reserved() {
        let mut input = buf(&[0x05, 0x01, 0x01, 0x01, 127, 0, 0, 1, 0, 80]);
        assert_eq!(
            decode_request(&mut input).unwrap_err(),
            SocksError::InvalidReserved(0x01)
        );
    }

    #[test]
    fn test_decode_request_unknown_address_type() {
        let mut input = buf(&[0x05, 0x01, 0x00, 0x02, 127, 0, 0, 1, 0, 80]);
        assert_eq!(
            decode_request(&mut input).unwrap_err(),
            SocksError::UnknownAddressType(0x02)
        );
    }

    #[test]
    fn test_decode_request_zero_domain_length() {
        let mut input = buf(&[0x05, 0x01, 0x00, 0x03, 0x00, 0x01, 0xBB]);
        assert_eq!(
            decode_request(&mut input).unwrap_err(),
            SocksError::InvalidDomainLength(0)
        );
    }

    #[test]
    fn test_decode_request_invalid_domain_utf8() {
        let mut input = BytesMut::new();
        input.put_slice(&[0x05, 0x01, 0x00, 0x03, 2, 0xFF, 0xFE]);
        input.put_u16(80);
        assert_eq!(
            decode_request(&mut input).unwrap_err(),
            SocksError::InvalidDomainEncoding
        );
    }

    #[test]
    fn test_reply_round_trip_all_address_types() {
        let replies = [
            ConnectReply {
                code: ReplyCode::Succeeded,
                addr: Address::Ipv4("10.1.2.3".parse().unwrap()),
                port: 8080,
            },
            ConnectReply {
                code: ReplyCode::HostUnreachable,
                addr: Address::Domain("example.com".to_string()),
                port: 443,
            },
            ConnectReply {
                code: ReplyCode::CommandNotSupported,
                addr: Address::Ipv6("2001:db8::1".parse().unwrap()),
                port: 65535,
            },
        ];

        for reply in replies {
            let mut wire = BytesMut::new();
            encode_reply(&reply, &mut wire);
            let decoded = decode_reply(&mut wire).unwrap().unwrap();
            assert_eq!(decoded, reply);
            assert!(wire.is_empty());
        }
    }

    #[test]
    fn test_encode_reply_granted_wire_format() {
        let bound: SocketAddr = "192.168.1.1:8080".parse().unwrap();
        let mut wire = BytesMut::new();
        encode_reply(&ConnectReply::granted(bound), &mut wire);

        assert_eq!(wire[0], SOCKS5_VERSION);
        assert_eq!(wire[1], 0x00);
        assert_eq!(wire[2], SOCKS5_RESERVED);
        assert_eq!(wire[3], SOCKS5_ADDR_TYPE_IPV4);
        assert_eq!(&wire[4..8], &[192, 168, 1, 1]);
        assert_eq!(&wire[8..10], &8080u16.to_be_bytes());
    }

    #[test]
    fn test_encode_reply_failure_wire_format() {
        let mut wire = BytesMut::new();
        encode_reply(&ConnectReply::failure(ReplyCode::HostUnreachable), &mut wire);

        assert_eq!(wire[1], 0x04);
        assert_eq!(wire[3], SOCKS5_ADDR_TYPE_IPV4);
        assert_eq!(&wire[4..8], &[0, 0, 0, 0]);
        assert_eq!(&wire[8..10], &[0, 0]);
    }

    #[test]
    fn test_decode_reply_unknown_code() {
        let mut input = buf(&[0x05, 0x09, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            decode_reply(&mut input).unwrap_err(),
            SocksError::UnknownReplyCode(0x09)
        );
    }
}
