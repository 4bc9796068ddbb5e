use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mdns::{Mdns, MdnsConfig};
use oscquery::{
    AccessValues, Discovery, DiscoveryEvents, MdnsEvent, OscQueryService, OscQueryServiceBuilder,
    OscValue, ServiceProfile, ServiceType,
};
use sansio::Protocol;
use shared::TaggedBytesMut;
use tokio::sync::{broadcast, mpsc};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

struct Member {
    engine: Mdns,
    addr: SocketAddr,
    events_tx: mpsc::UnboundedSender<MdnsEvent>,
}

/// A lossless in-memory multicast segment shared by several engines.
#[derive(Default)]
struct Bus {
    members: Mutex<Vec<Member>>,
}

impl Bus {
    fn join(self: &Arc<Self>) -> Arc<BusDiscovery> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut members = self.members.lock().unwrap();
        let index = members.len();
        members.push(Member {
            engine: Mdns::new(MdnsConfig::new().with_local_ip(LOCALHOST)),
            addr: SocketAddr::new(LOCALHOST, 5353 + index as u16),
            events_tx,
        });
        Arc::new(BusDiscovery {
            bus: Arc::clone(self),
            index,
            events: Mutex::new(Some(events_rx)),
        })
    }

    /// Delivers every queued packet to every member, the sender included,
    /// until the segment is quiet.
    fn pump(&self) {
        let mut members = self.members.lock().unwrap();
        loop {
            let mut packets = vec![];
            for member in members.iter_mut() {
                while let Some(packet) = member.engine.poll_write() {
                    packets.push((member.addr, packet));
                }
            }
            if packets.is_empty() {
                break;
            }
            for (from, packet) in packets {
                for member in members.iter_mut() {
                    let msg = TaggedBytesMut::datagram(
                        Instant::now(),
                        member.addr,
                        from,
                        &packet.message,
                    );
                    let _ = member.engine.handle_read(msg);
                }
            }
        }
        for member in members.iter_mut() {
            while let Some(event) = member.engine.poll_event() {
                let _ = member.events_tx.send(event);
            }
        }
    }

    fn with<R>(&self, index: usize, f: impl FnOnce(&mut Mdns) -> R) -> R {
        let result = {
            let mut members = self.members.lock().unwrap();
            f(&mut members[index].engine)
        };
        self.pump();
        result
    }
}

struct BusDiscovery {
    bus: Arc<Bus>,
    index: usize,
    events: Mutex<Option<DiscoveryEvents>>,
}

impl Discovery for BusDiscovery {
    fn advertise(&self, profile: ServiceProfile) -> oscquery::Result<()> {
        self.bus.with(self.index, |engine| engine.advertise(profile))
    }

    fn unadvertise(&self, profile: &ServiceProfile) -> bool {
        self.bus.with(self.index, |engine| engine.unadvertise(profile))
    }

    fn refresh_services(&self) {
        self.bus.with(self.index, |engine| engine.refresh_services())
    }

    fn osc_services(&self) -> Vec<ServiceProfile> {
        self.bus.with(self.index, |engine| engine.osc_services())
    }

    fn oscquery_services(&self) -> Vec<ServiceProfile> {
        self.bus.with(self.index, |engine| engine.oscquery_services())
    }

    fn take_events(&self) -> Option<DiscoveryEvents> {
        self.events.lock().unwrap().take()
    }

    fn close(&self) {
        self.bus.with(self.index, |engine| engine.unadvertise_all())
    }
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

fn start_on_bus(bus: &Arc<Bus>, name: &str) -> OscQueryService {
    let _ = env_logger::builder().is_test(true).try_init();
    OscQueryServiceBuilder::new()
        .with_service_name(name)
        .with_tcp_port(free_port())
        .with_udp_port(free_port())
        .with_host_ip(LOCALHOST)
        .with_discovery(bus.join())
        .start_http_server()
        .advertise_oscquery_service()
        .build()
}

async fn next_event(rx: &mut broadcast::Receiver<MdnsEvent>) -> Option<MdnsEvent> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .ok()?
        .ok()
}

async fn no_more_events(rx: &mut broadcast::Receiver<MdnsEvent>) -> bool {
    tokio::time::timeout(Duration::from_millis(200), rx.recv())
        .await
        .is_err()
}

#[tokio::test]
async fn test_two_instances_discover_each_other_once() {
    let bus = Arc::new(Bus::default());

    let alpha = start_on_bus(&bus, "Alpha");
    let added = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&added);
    alpha.on_oscquery_service_added(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let mut alpha_events = alpha.subscribe();

    let beta = start_on_bus(&bus, "Beta");
    let beta_port = beta.http_local_addr().expect("beta serving").port();

    alpha.refresh_services();
    alpha.refresh_services();

    let event = next_event(&mut alpha_events).await;
    let expected = ServiceProfile::new("Beta", LOCALHOST, beta_port, ServiceType::OscQuery);
    assert_eq!(event, Some(MdnsEvent::OscQueryServiceAdded(expected.clone())));
    assert!(no_more_events(&mut alpha_events).await);
    assert_eq!(added.load(Ordering::SeqCst), 1);

    assert_eq!(alpha.oscquery_services(), vec![expected]);
    assert!(alpha.osc_services().is_empty());

    let beta_sees: Vec<String> = beta
        .oscquery_services()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(beta_sees, vec!["Alpha".to_owned()]);
}

#[tokio::test]
async fn test_own_announcement_is_not_an_event() {
    let bus = Arc::new(Bus::default());
    let solo = start_on_bus(&bus, "Solo");
    let mut events = solo.subscribe();

    solo.refresh_services();
    assert!(no_more_events(&mut events).await);
    assert!(solo.oscquery_services().is_empty());
    assert_eq!(solo.advertised_services().len(), 1);
}

#[tokio::test]
async fn test_dispose_announces_goodbye() {
    let bus = Arc::new(Bus::default());
    let watcher = start_on_bus(&bus, "Watcher");
    let removed = Arc::new(Mutex::new(vec![]));
    let sink = Arc::clone(&removed);
    watcher.on_oscquery_service_removed(move |profile| {
        sink.lock().unwrap().push(profile.name.clone());
    });
    let mut events = watcher.subscribe();

    let leaver = start_on_bus(&bus, "Leaver");
    assert!(matches!(
        next_event(&mut events).await,
        Some(MdnsEvent::OscQueryServiceAdded(p)) if p.name == "Leaver"
    ));

    leaver.dispose();
    assert!(matches!(
        next_event(&mut events).await,
        Some(MdnsEvent::OscQueryServiceRemoved(p)) if p.name == "Leaver"
    ));
    assert_eq!(*removed.lock().unwrap(), vec!["Leaver".to_owned()]);
    assert!(watcher.oscquery_services().is_empty());

    // Disposing twice is harmless and advertising afterwards is refused.
    leaver.dispose();
    assert!(leaver.advertise_oscquery_service().is_err());
}

#[tokio::test]
async fn test_osc_service_advertisement() {
    let bus = Arc::new(Bus::default());
    let listener = start_on_bus(&bus, "Listener");
    let mut events = listener.subscribe();

    let sender = OscQueryServiceBuilder::new()
        .with_service_name("Sender")
        .with_udp_port(9123)
        .with_osc_ip(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2)))
        .with_discovery(bus.join())
        .advertise_osc_service()
        .build();
    assert_eq!(sender.http_local_addr(), None);

    let expected = ServiceProfile::new(
        "Sender",
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2)),
        9123,
        ServiceType::Osc,
    );
    assert_eq!(
        next_event(&mut events).await,
        Some(MdnsEvent::OscServiceAdded(expected.clone()))
    );
    assert_eq!(listener.osc_services(), vec![expected]);
}

#[test]
fn test_endpoint_api_without_runtime() -> oscquery::Result<()> {
    let service = OscQueryServiceBuilder::new().start_http_server().build();
    assert_eq!(service.http_local_addr(), None);

    assert!(!service.add_endpoint("no/slash", "i", AccessValues::ReadOnly, None, None));
    assert!(!service.add_endpoint("/bad/type", "q", AccessValues::ReadOnly, None, None));

    assert!(service.add_endpoint("/dup", "i", AccessValues::ReadOnly, Some("1"), Some("first")));
    assert!(!service.add_endpoint("/dup", "s", AccessValues::WriteOnly, Some("x"), None));
    let dup = service.get_node("/dup").expect("dup node");
    assert_eq!(dup.osc_type.as_deref(), Some("i"));
    assert_eq!(dup.description.as_deref(), Some("first"));
    assert_eq!(dup.value, Some(vec![OscValue::Int(1)]));

    // A boolean written into an int endpoint is kept as a boolean.
    service.set_value("/dup", "true")?;
    assert_eq!(
        service.get_node("/dup").and_then(|n| n.value),
        Some(vec![OscValue::Bool(true)])
    );

    service.set_value("/late", "hello")?;
    let late = service.get_node("/late").expect("late node");
    assert_eq!(late.osc_type, None);
    assert_eq!(late.value, Some(vec![OscValue::String("hello".to_owned())]));

    assert!(service.add_endpoint_typed::<f32>("/typed/gain", AccessValues::ReadWrite, Some(0.5), None));
    assert_eq!(
        service.get_node("/typed/gain").and_then(|n| n.osc_type),
        Some("f".to_owned())
    );
    service.set_values("/typed/gain", vec![OscValue::Float(0.25)])?;

    assert!(service.remove_endpoint("/typed"));
    assert!(!service.remove_endpoint("/typed/gain"));
    assert!(service.root_node().child("typed").is_none());

    service.dispose();
    service.dispose();
    Ok(())
}

#[test]
fn test_empty_attributes_are_omitted() {
    let service = OscQueryServiceBuilder::new().build();

    assert!(service.add_endpoint("/untyped", "", AccessValues::ReadWrite, Some("3"), Some("")));
    let node = service.get_node("/untyped").expect("untyped node");
    assert_eq!(node.osc_type, None);
    assert_eq!(node.description, None);
    assert_eq!(node.value, Some(vec![OscValue::Int(3)]));
    let json = node.to_string();
    assert!(!json.contains("TYPE"), "{json}");
    assert!(!json.contains("DESCRIPTION"), "{json}");

    assert!(service.add_endpoint("/gain", "f", AccessValues::ReadWrite, Some("0.1"), None));
    let json = service.get_node("/gain").expect("gain node").to_string();
    assert!(json.contains(r#""VALUE":[0.1]"#), "{json}");

    service.dispose();
}
