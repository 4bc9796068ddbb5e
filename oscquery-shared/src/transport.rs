use bytes::BytesMut;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

/// Transport a datagram or stream segment travelled over.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportProtocol {
    #[default]
    UDP,
    TCP,
}

/// Where a packet came from or goes to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportContext {
    pub local_addr: SocketAddr,
    pub peer_addr: SocketAddr,
    pub transport_protocol: TransportProtocol,
}

impl Default for TransportContext {
    fn default() -> Self {
        let unspecified = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
        Self {
            local_addr: unspecified,
            peer_addr: unspecified,
            transport_protocol: TransportProtocol::UDP,
        }
    }
}

impl TransportContext {
    pub fn udp(local_addr: SocketAddr, peer_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            peer_addr,
            transport_protocol: TransportProtocol::UDP,
        }
    }
}

/// A payload tagged with its transport context and the time it was
/// received or queued.
#[derive(Debug, Clone)]
pub struct TransportMessage<T> {
    pub now: Instant,
    pub transport: TransportContext,
    pub message: T,
}

/// Raw datagram exchanged with a sans-I/O protocol.
pub type TaggedBytesMut = TransportMessage<BytesMut>;

impl TaggedBytesMut {
    /// A UDP datagram carrying a copy of `payload`.
    pub fn datagram(
        now: Instant,
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        payload: &[u8],
    ) -> Self {
        TransportMessage {
            now,
            transport: TransportContext::udp(local_addr, peer_addr),
            message: BytesMut::from(payload),
        }
    }
}
