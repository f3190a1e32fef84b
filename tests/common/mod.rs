//! Shared helpers for integration tests
//!
//! Tests talk to a real proxy over real loopback sockets. The proxy must
//! run inside a `LocalSet`, so each test wraps its body in
//! `LocalSet::run_until` and calls these helpers from there.

use socksd::config::ProxyConfig;
use socksd::server::SocksProxy;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Start a proxy on an ephemeral loopback port inside the current
/// `LocalSet` and return its address.
pub async fn start_proxy() -> SocketAddr {
    let config = ProxyConfig {
        bind_addr: "127.0.0.1".parse().unwrap(),
        port: 0,
        ..ProxyConfig::default()
    };

    let proxy = SocksProxy::bind(config).unwrap();
    let addr = proxy.local_addr().unwrap();
    tokio::task::spawn_local(async move {
        let _ = proxy.serve().await;
    });
    addr
}

/// Start a TCP echo server on an ephemeral loopback port.
pub async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::task::spawn_local(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::task::spawn_local(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

/// Connect to the proxy and complete the no-auth greeting.
pub async fn connect_no_auth(proxy: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();

    let mut response = [0u8; 2];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(response, [0x05, 0x00], "proxy must choose no-auth");
    stream
}

/// Send an IPv4 CONNECT request and return the reply code.
pub async fn send_connect_ipv4(stream: &mut TcpStream, dest: SocketAddr) -> u8 {
    let ip = match dest {
        SocketAddr::V4(v4) => v4.ip().octets(),
        SocketAddr::V6(_) => panic!("expected an IPv4 destination"),
    };

    let mut request = vec![0x05, 0x01, 0x00, 0x01];
    request.extend_from_slice(&ip);
    request.extend_from_slice(&dest.port().to_be_bytes());
    stream.write_all(&request).await.unwrap();

    read_reply_code(stream).await
}

/// Send a domain CONNECT request and return the reply code.
pub async fn send_connect_domain(stream: &mut TcpStream, domain: &str, port: u16) -> u8 {
    let mut request = vec![0x05, 0x01, 0x00, 0x03, domain.len() as u8];
    request.extend_from_slice(domain.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await.unwrap();

    read_reply_code(stream).await
}

/// Read a full connection reply (always ATYP IPv4 from this proxy) and
/// return its reply code.
pub async fn read_reply_code(stream: &mut TcpStream) -> u8 {
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[0], 0x05, "reply version");
    assert_eq!(reply[2], 0x00, "reply reserved byte");
    assert_eq!(reply[3], 0x01, "reply address type");
    reply[1]
}

/// A loopback address that nothing is listening on.
///
/// Binds an ephemeral port and drops the listener; the port stays free
/// long enough for a connect attempt to be refused.
pub async fn unused_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
