//! Integration tests for oscquery-mdns
//!
//! Two discovery engines talk to each other through the sans-I/O interface,
//! without actual network I/O.

use oscquery_mdns::{
    MDNS_DEST_ADDR, Mdns, MdnsConfig, MdnsEvent, ServiceProfile, ServiceType,
};
use sansio::Protocol;
use shared::TaggedBytesMut;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

const ADDR_A: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)), 5353);
const ADDR_B: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)), 5353);

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Helper to create a TaggedBytesMut from a packet
fn create_message(now: Instant, local: SocketAddr, peer: SocketAddr, data: &[u8]) -> TaggedBytesMut {
    TaggedBytesMut::datagram(now, local, peer, data)
}

/// Delivers every multicast packet queued by `from` to `to` and, since
/// multicast loops back, to `from` itself. Returns the number of packets.
fn deliver_packets(
    from: &mut Mdns,
    to: &mut Mdns,
    from_addr: SocketAddr,
    to_addr: SocketAddr,
    now: Instant,
) -> usize {
    let mut packets = Vec::new();
    while let Some(packet) = from.poll_write() {
        if packet.transport.peer_addr == MDNS_DEST_ADDR {
            packets.push(packet);
        }
    }
    for packet in &packets {
        let _ = to.handle_read(create_message(now, to_addr, from_addr, &packet.message));
        let _ = from.handle_read(create_message(now, from_addr, from_addr, &packet.message));
    }
    packets.len()
}

/// Shuttles packets both ways until neither engine has anything to send.
fn exchange_until_quiet(a: &mut Mdns, b: &mut Mdns, now: Instant) {
    for _ in 0..8 {
        let sent = deliver_packets(a, b, ADDR_A, ADDR_B, now)
            + deliver_packets(b, a, ADDR_B, ADDR_A, now);
        if sent == 0 {
            return;
        }
    }
    panic!("engines kept talking");
}

fn events(conn: &mut Mdns) -> Vec<MdnsEvent> {
    let mut events = Vec::new();
    while let Some(event) = conn.poll_event() {
        events.push(event);
    }
    events
}

fn quiet_engine() -> Mdns {
    Mdns::new(MdnsConfig::default().with_query_on_start(false))
}

fn oscquery_profile(name: &str, addr: SocketAddr, port: u16) -> ServiceProfile {
    ServiceProfile::new(name, addr.ip(), port, ServiceType::OscQuery)
}

#[test]
fn test_refresh_discovers_advertised_peer() {
    init_log();
    let mut a = quiet_engine();
    let mut b = quiet_engine();
    let now = Instant::now();

    let profile_a = oscquery_profile("service-a", ADDR_A, 8081);
    let profile_b = oscquery_profile("service-b", ADDR_B, 8082);
    a.advertise(profile_a.clone()).unwrap();
    b.advertise(profile_b.clone()).unwrap();

    // Initial announcements, each engine also hears its own.
    exchange_until_quiet(&mut a, &mut b, now);
    assert_eq!(events(&mut a), vec![MdnsEvent::OscQueryServiceAdded(profile_b.clone())]);
    assert_eq!(events(&mut b), vec![MdnsEvent::OscQueryServiceAdded(profile_a.clone())]);

    // A refresh draws answers from both, neither re-fires.
    a.refresh_services();
    exchange_until_quiet(&mut a, &mut b, now);
    assert!(events(&mut a).is_empty());
    assert!(events(&mut b).is_empty());

    assert_eq!(a.oscquery_services(), vec![profile_b]);
    assert_eq!(b.oscquery_services(), vec![profile_a]);
}

#[test]
fn test_late_browser_finds_existing_service() {
    init_log();
    let mut server = quiet_engine();
    let profile = ServiceProfile::new("synth", ADDR_A.ip(), 9000, ServiceType::Osc);
    server.advertise(profile.clone()).unwrap();

    // Nobody listened to the initial announcement.
    while server.poll_write().is_some() {}

    let mut browser = Mdns::new(MdnsConfig::default());
    exchange_until_quiet(&mut browser, &mut server, Instant::now());

    assert_eq!(
        events(&mut browser),
        vec![MdnsEvent::OscServiceAdded(profile.clone())]
    );
    assert_eq!(browser.osc_services(), vec![profile]);
    assert!(browser.oscquery_services().is_empty());
    assert!(events(&mut server).is_empty());
}

#[test]
fn test_advertising_both_service_types() {
    init_log();
    let mut server = quiet_engine();
    let mut browser = quiet_engine();

    let osc = ServiceProfile::new("synth", ADDR_A.ip(), 9000, ServiceType::Osc);
    let oscquery = ServiceProfile::new("synth", ADDR_A.ip(), 8080, ServiceType::OscQuery);
    server.advertise(osc.clone()).unwrap();
    server.advertise(oscquery.clone()).unwrap();
    while server.poll_write().is_some() {}

    browser.refresh_services();
    exchange_until_quiet(&mut browser, &mut server, Instant::now());

    let found = events(&mut browser);
    assert_eq!(found.len(), 2);
    assert!(found.contains(&MdnsEvent::OscServiceAdded(osc)));
    assert!(found.contains(&MdnsEvent::OscQueryServiceAdded(oscquery)));
}

#[test]
fn test_unadvertise_removes_peer() {
    init_log();
    let mut a = quiet_engine();
    let mut b = quiet_engine();
    let now = Instant::now();

    let profile = oscquery_profile("leaving", ADDR_A, 8080);
    a.advertise(profile.clone()).unwrap();
    exchange_until_quiet(&mut a, &mut b, now);
    assert_eq!(b.oscquery_services().len(), 1);
    events(&mut b);

    assert!(a.unadvertise(&profile));
    exchange_until_quiet(&mut a, &mut b, now);

    assert_eq!(
        events(&mut b),
        vec![MdnsEvent::OscQueryServiceRemoved(profile)]
    );
    assert!(b.oscquery_services().is_empty());
    assert!(events(&mut a).is_empty());

    // The withdrawn service no longer answers queries.
    b.refresh_services();
    exchange_until_quiet(&mut a, &mut b, now);
    assert!(events(&mut b).is_empty());
}

#[test]
fn test_periodic_refresh_rediscovers_after_restart() {
    init_log();
    let mut browser = Mdns::new(
        MdnsConfig::default()
            .with_query_on_start(false)
            .with_refresh_interval(Duration::from_secs(1)),
    );
    let mut server = quiet_engine();
    let profile = oscquery_profile("phoenix", ADDR_B, 8080);
    let now = Instant::now();

    server.advertise(profile.clone()).unwrap();
    exchange_until_quiet(&mut server, &mut browser, now);
    assert_eq!(events(&mut browser).len(), 1);

    assert!(server.unadvertise(&profile));
    exchange_until_quiet(&mut server, &mut browser, now);
    assert_eq!(
        events(&mut browser),
        vec![MdnsEvent::OscQueryServiceRemoved(profile.clone())]
    );

    // Comes back silently, the next periodic refresh picks it up.
    server.advertise(profile.clone()).unwrap();
    while server.poll_write().is_some() {}

    let deadline = browser.poll_timeout().expect("refresh scheduled");
    browser.handle_timeout(deadline).unwrap();
    exchange_until_quiet(&mut browser, &mut server, deadline);
    assert_eq!(
        events(&mut browser),
        vec![MdnsEvent::OscQueryServiceAdded(profile)]
    );
}
