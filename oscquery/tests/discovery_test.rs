use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::time::{Duration, Instant};

use oscquery::{MdnsEvent, OscQueryService, OscQueryServiceBuilder, ServiceProfile, ServiceType};
use tokio::sync::broadcast;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const WAIT: Duration = Duration::from_secs(5);

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

/// A service on the real multicast socket, no discovery override.
fn start(name: &str) -> OscQueryService {
    let _ = env_logger::builder().is_test(true).try_init();
    OscQueryServiceBuilder::new()
        .with_service_name(name)
        .with_tcp_port(free_port())
        .with_udp_port(free_port())
        .with_host_ip(LOCALHOST)
        .start_http_server()
        .advertise_oscquery_service()
        .build()
}

fn profile_of(event: &MdnsEvent) -> &ServiceProfile {
    match event {
        MdnsEvent::OscServiceAdded(p)
        | MdnsEvent::OscServiceRemoved(p)
        | MdnsEvent::OscQueryServiceAdded(p)
        | MdnsEvent::OscQueryServiceRemoved(p) => p,
    }
}

/// Events about `name`, skipping whatever else shares the network, until
/// `deadline`.
async fn events_for(
    rx: &mut broadcast::Receiver<MdnsEvent>,
    name: &str,
    deadline: Instant,
) -> Vec<MdnsEvent> {
    let mut seen = vec![];
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(left, rx.recv()).await {
            Ok(Ok(event)) => {
                if profile_of(&event).name == name {
                    seen.push(event);
                }
            }
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            _ => return seen,
        }
    }
}

async fn first_event_for(
    rx: &mut broadcast::Receiver<MdnsEvent>,
    name: &str,
) -> Option<MdnsEvent> {
    let deadline = Instant::now() + WAIT;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        let event = tokio::time::timeout(left, rx.recv()).await.ok()?.ok()?;
        if profile_of(&event).name == name {
            return Some(event);
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_multicast_discovery_between_two_services() {
    let id = std::process::id();
    let seeker = start(&format!("seeker-{id}"));
    let mut events = seeker.subscribe();

    let peer_name = format!("peer-{id}");
    let peer = start(&peer_name);
    let peer_port = peer.http_local_addr().expect("peer serving").port();

    seeker.refresh_services();

    let expected = ServiceProfile::new(&peer_name, LOCALHOST, peer_port, ServiceType::OscQuery);
    assert_eq!(
        first_event_for(&mut events, &peer_name).await,
        Some(MdnsEvent::OscQueryServiceAdded(expected.clone()))
    );

    // The start-up announcement, the answer to the browse query and the
    // answer to the refresh all describe the same peer.
    seeker.refresh_services();
    let repeats = events_for(&mut events, &peer_name, Instant::now() + Duration::from_secs(1)).await;
    assert!(repeats.is_empty(), "{repeats:?}");
    assert!(seeker.oscquery_services().contains(&expected));

    peer.dispose();
    assert_eq!(
        first_event_for(&mut events, &peer_name).await,
        Some(MdnsEvent::OscQueryServiceRemoved(expected.clone()))
    );
    assert!(!seeker.oscquery_services().contains(&expected));

    seeker.dispose();
}
