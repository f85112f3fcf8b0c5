use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::NetStream;

/// TCP listener transport.
///
/// Provides bind/accept over IPv4 or IPv6 plus the matching [`connect`](Self::connect).
pub struct TcpTransport {
    listener: TcpListener,
    addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on the given address (e.g. `127.0.0.1:0`).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(addr = %local, "listening on tcp");

        Ok(Self {
            listener,
            addr: local,
        })
    }

    /// Bind on every interface at `port`.
    pub fn bind_port(port: u16) -> Result<Self> {
        Self::bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port).to_string())
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<(NetStream, SocketAddr)> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(peer = %addr, "accepted connection");
        Ok((NetStream::from_tcp(stream), addr))
    }

    /// Connect to a listening TCP endpoint (blocking).
    ///
    /// Every resolved address is tried in order; the last failure is returned.
    pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<NetStream> {
        if port == 0 {
            return Err(TransportError::InvalidPort(0));
        }

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Resolve {
                host: host.to_string(),
                source: e,
            })?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            let attempt = match timeout {
                Some(limit) => TcpStream::connect_timeout(&addr, limit),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    debug!(%addr, "connected over tcp");
                    return Ok(NetStream::from_tcp(stream));
                }
                Err(source) => last_err = Some(TransportError::Connect { addr, source }),
            }
        }

        Err(last_err.unwrap_or_else(|| TransportError::Resolve {
            host: host.to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no addresses for host",
            ),
        }))
    }

    /// Wake a thread blocked in [`accept`](Self::accept).
    ///
    /// Opens and immediately drops a loopback connection to this listener. The
    /// accept loop is expected to check its cancellation flag after every
    /// accepted socket.
    pub fn unblock_accept(&self) {
        let target = match self.addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.addr.port())
            }
            IpAddr::V6(ip) if ip.is_unspecified() => {
                SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), self.addr.port())
            }
            _ => self.addr,
        };
        if let Err(err) = TcpStream::connect_timeout(&target, Duration::from_millis(500)) {
            debug!(addr = %target, error = %err, "accept wake-up connect failed");
        }
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

/// Check that `port` is a usable TCP port (1-65535).
pub fn validate_port(port: i64) -> Result<u16> {
    match u16::try_from(port) {
        Ok(valid) if valid != 0 => Ok(valid),
        _ => Err(TransportError::InvalidPort(port)),
    }
}
