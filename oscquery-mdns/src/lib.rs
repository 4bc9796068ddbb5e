//! # oscquery-mdns
//!
//! A sans-I/O implementation of OSCQuery service discovery over multicast DNS.
//!
//! OSCQuery peers announce two kinds of DNS-SD services on the local network:
//!
//! - `_osc._udp.local`: where the peer receives OSC messages
//! - `_oscjson._tcp.local`: where the peer serves its OSCQuery HTTP API
//!
//! [`Mdns`] advertises this process's services, answers PTR queries for them,
//! browses for peers and reports every newly found (or withdrawn) peer as an
//! [`MdnsEvent`] carrying a [`ServiceProfile`].
//!
//! ## Sans-I/O Design
//!
//! The engine implements [`sansio::Protocol`]. It never touches a socket or a
//! clock on its own; the caller moves datagrams and time in and out:
//!
//! ```text
//! loop {
//!     while let Some(packet) = mdns.poll_write() {
//!         socket.send_to(&packet.message, packet.transport.peer_addr);
//!     }
//!
//!     select! {
//!         packet = socket.recv_from() => mdns.handle_read(packet),
//!         _ = sleep_until(mdns.poll_timeout()) => mdns.handle_timeout(Instant::now()),
//!     }
//!
//!     while let Some(event) = mdns.poll_event() {
//!         match event {
//!             MdnsEvent::OscQueryServiceAdded(profile) => { /* fetch its tree */ }
//!             _ => {}
//!         }
//!     }
//! }
//! ```
//!
//! [`MulticastSocket`] builds a UDP socket suitable for that loop.
//!
//! ## Quick Start
//!
//! ```rust
//! use oscquery_mdns::{Mdns, MdnsConfig, ServiceProfile, ServiceType, MDNS_DEST_ADDR};
//! use sansio::Protocol;
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! let mut mdns = Mdns::new(MdnsConfig::default().with_query_on_start(false));
//! mdns.advertise(ServiceProfile::new(
//!     "synth",
//!     IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
//!     8080,
//!     ServiceType::OscQuery,
//! ))
//! .unwrap();
//!
//! let announcement = mdns.poll_write().expect("announcement is queued");
//! assert_eq!(announcement.transport.peer_addr, MDNS_DEST_ADDR);
//! ```
//!
//! ## Protocol Details
//!
//! - **Multicast Address**: 224.0.0.251:5353 (IPv4)
//! - **Records**: PTR, SRV, TXT and A/AAAA per advertised service
//! - **TTL**: 120 seconds, 0 for goodbye packets
//! - **Compression**: DNS name compression is supported for efficiency

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub(crate) mod config;
pub(crate) mod message;
pub(crate) mod profile;
pub(crate) mod proto;
pub(crate) mod socket;

pub use config::MdnsConfig;
pub use profile::{OSC_UDP_SERVICE, OSCJSON_TCP_SERVICE, ServiceProfile, ServiceType};
pub use proto::{MDNS_DEST_ADDR, MDNS_MULTICAST_IPV4, MDNS_PORT, Mdns, MdnsEvent};
pub use socket::MulticastSocket;
