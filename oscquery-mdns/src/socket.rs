//! Multicast UDP socket for the discovery engine.
//!
//! ```rust,ignore
//! use oscquery_mdns::MulticastSocket;
//!
//! let std_socket = MulticastSocket::new().into_std()?;
//! let socket = tokio::net::UdpSocket::from_std(std_socket)?;
//! ```

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use crate::proto::{MDNS_MULTICAST_IPV4, MDNS_PORT};
use socket2::{Domain, Protocol, Socket, Type};

/// RFC 6762 section 11: responses go out with IP TTL 255.
const MDNS_MULTICAST_TTL: u32 = 255;

/// Builder for a UDP socket joined to the mDNS group 224.0.0.251:5353.
///
/// Several OSCQuery services on one host share port 5353, so the socket is
/// created with address (and port, on unix) reuse. Loopback is on by default
/// so those services see each other. The socket is non-blocking, ready for
/// `tokio::net::UdpSocket::from_std`.
#[derive(Debug, Clone)]
pub struct MulticastSocket {
    bind_ip: Option<Ipv4Addr>,
    bind_port: u16,
    interface: Option<Ipv4Addr>,
    loopback: bool,
}

impl Default for MulticastSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl MulticastSocket {
    pub fn new() -> Self {
        Self {
            bind_ip: None,
            bind_port: MDNS_PORT,
            interface: None,
            loopback: true,
        }
    }

    /// Address to bind instead of the platform default.
    pub fn with_bind_ip(mut self, ip: Ipv4Addr) -> Self {
        self.bind_ip = Some(ip);
        self
    }

    /// Port to bind, 5353 unless changed. Tests use a private port.
    pub fn with_bind_port(mut self, port: u16) -> Self {
        self.bind_port = port;
        self
    }

    /// Join and send on one interface only.
    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = Some(interface);
        self
    }

    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    /// Linux can bind the group address itself, which keeps unrelated
    /// unicast traffic to port 5353 out. Other platforms refuse that.
    fn bind_addr(&self) -> SocketAddr {
        let ip = match self.bind_ip {
            Some(ip) => ip,
            None if cfg!(target_os = "linux") => MDNS_MULTICAST_IPV4,
            None => Ipv4Addr::UNSPECIFIED,
        };
        SocketAddr::new(IpAddr::V4(ip), self.bind_port)
    }

    /// Create, bind and join the socket.
    pub fn into_std(self) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;

        socket.set_multicast_loop_v4(self.loopback)?;
        socket.set_multicast_ttl_v4(MDNS_MULTICAST_TTL)?;

        let addr = self.bind_addr();
        socket.bind(&addr.into())?;

        let interface = self.interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        socket.join_multicast_v4(&MDNS_MULTICAST_IPV4, &interface)?;
        if self.interface.is_some() {
            socket.set_multicast_if_v4(&interface)?;
        }

        log::debug!("mDNS socket bound to {addr} on interface {interface}");
        Ok(socket.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let builder = MulticastSocket::default();
        assert_eq!(builder.bind_port, 5353);
        assert!(builder.interface.is_none());
        assert!(builder.loopback);
        let expected = if cfg!(target_os = "linux") {
            MDNS_MULTICAST_IPV4
        } else {
            Ipv4Addr::UNSPECIFIED
        };
        assert_eq!(builder.bind_addr(), SocketAddr::new(IpAddr::V4(expected), 5353));
    }

    #[test]
    fn test_builder_overrides() {
        let interface = Ipv4Addr::new(192, 168, 1, 100);
        let builder = MulticastSocket::new()
            .with_bind_ip(Ipv4Addr::UNSPECIFIED)
            .with_bind_port(15353)
            .with_interface(interface)
            .with_loopback(false);
        assert_eq!(builder.bind_addr(), "0.0.0.0:15353".parse().unwrap());
        assert_eq!(builder.interface, Some(interface));
        assert!(!builder.loopback);
    }
}
