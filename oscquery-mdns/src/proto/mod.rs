//! Sans-I/O OSCQuery discovery engine.
//!
//! [`Mdns`] advertises this process's OSC and OSCQuery services, answers
//! PTR queries for them, browses for peers and turns peer announcements
//! into [`MdnsEvent`]s. It performs no I/O itself. The caller:
//!
//! 1. feeds every datagram received on 224.0.0.251:5353 to `handle_read()`
//! 2. sends every packet returned by `poll_write()` to its `peer_addr`
//! 3. calls `handle_timeout()` once `poll_timeout()` has passed
//! 4. drains `poll_event()` after each of the above
//!
//! # Announcement layout
//!
//! A service `synth` of type `_oscjson._tcp` on 10.0.0.7:8080 is announced as
//!
//! ```text
//! answers:      _oscjson._tcp.local.        PTR  synth._oscjson._tcp.local.
//! additionals:  synth._oscjson._tcp.local.  SRV  0 0 8080 synth._oscjson._tcp.local.
//!               synth._oscjson._tcp.local.  TXT  "txtvers=1"
//!               synth._oscjson._tcp.local.  A    10.0.0.7
//! ```
//!
//! A TTL of zero on the PTR record withdraws the service.

use std::collections::{HashSet, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

use shared::TaggedBytesMut;

use crate::config::{MAX_MESSAGE_RECORDS, MdnsConfig, RESPONSE_TTL, TXT_VERSION};
use crate::message::name::Name;
use crate::message::question::Question;
use crate::message::resource::a::AResource;
use crate::message::resource::aaaa::AaaaResource;
use crate::message::resource::ptr::PtrResource;
use crate::message::resource::srv::SrvResource;
use crate::message::resource::txt::TxtResource;
use crate::message::resource::{Resource, ResourceBody};
use crate::message::{DNSCLASS_INET, DnsClass, DnsType, Message};
use crate::profile::{LOCAL_DOMAIN, ServiceProfile, ServiceType};
use shared::error::{Error, Result};

/// mDNS IPv4 multicast group.
pub const MDNS_MULTICAST_IPV4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// mDNS port.
pub const MDNS_PORT: u16 = 5353;

/// Destination of every packet the engine emits.
pub const MDNS_DEST_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(MDNS_MULTICAST_IPV4), MDNS_PORT);

/// Service types the engine browses for.
const TRACKED_SERVICE_TYPES: [ServiceType; 2] = [ServiceType::Osc, ServiceType::OscQuery];

/// Changes to the set of discovered peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MdnsEvent {
    /// A previously unknown OSC service was found.
    OscServiceAdded(ServiceProfile),
    /// A previously unknown OSCQuery service was found.
    OscQueryServiceAdded(ServiceProfile),
    /// A known OSC service said goodbye.
    OscServiceRemoved(ServiceProfile),
    /// A known OSCQuery service said goodbye.
    OscQueryServiceRemoved(ServiceProfile),
}

/// Sans-I/O OSCQuery discovery engine.
///
/// See the [module documentation](self) for the I/O contract.
pub struct Mdns {
    config: MdnsConfig,

    /// Services announced by this process.
    advertised: Vec<ServiceProfile>,

    osc_services: HashSet<ServiceProfile>,
    oscquery_services: HashSet<ServiceProfile>,

    write_outs: VecDeque<TaggedBytesMut>,
    event_outs: VecDeque<MdnsEvent>,

    next_timeout: Option<Instant>,

    closed: bool,
}

impl Mdns {
    /// Create a new engine.
    ///
    /// With `query_on_start` set (the default) a browse query is queued
    /// immediately.
    pub fn new(config: MdnsConfig) -> Self {
        let now = Instant::now();
        let next_timeout = config.refresh_interval.map(|interval| now + interval);
        let query_on_start = config.query_on_start;

        let mut mdns = Self {
            config,
            advertised: Vec::new(),
            osc_services: HashSet::new(),
            oscquery_services: HashSet::new(),
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
            next_timeout,
            closed: false,
        };
        if query_on_start {
            mdns.send_queries(now);
        }
        mdns
    }

    /// Announce `profile` and answer queries for it from now on.
    ///
    /// An unspecified address is replaced by the configured local IP.
    /// Advertising a service with the same name and type again replaces the
    /// previous announcement.
    pub fn advertise(&mut self, profile: ServiceProfile) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }

        let mut profile = profile;
        if profile.address.is_unspecified()
            && let Some(local_ip) = self.config.local_ip
        {
            profile.address = local_ip;
        }

        let now = Instant::now();
        self.send_service(&profile, RESPONSE_TTL, now)?;

        log::info!(
            "Advertising service {} of type {} on {}",
            profile.name,
            profile.service_type,
            profile.port
        );
        self.advertised
            .retain(|p| !p.is_same_service(&profile.name, profile.service_type));
        self.advertised.push(profile);
        Ok(())
    }

    /// Withdraw a service announced with [`advertise`](Self::advertise),
    /// sending a goodbye packet. Returns false when it was not advertised.
    pub fn unadvertise(&mut self, profile: &ServiceProfile) -> bool {
        let Some(index) = self
            .advertised
            .iter()
            .position(|p| p.is_same_service(&profile.name, profile.service_type))
        else {
            return false;
        };

        let advertised = self.advertised.remove(index);
        log::info!(
            "Unadvertising service {} of type {} on {}",
            advertised.name,
            advertised.service_type,
            advertised.port
        );
        if !self.closed
            && let Err(err) = self.send_service(&advertised, 0, Instant::now())
        {
            log::warn!("Failed to send goodbye for {advertised}: {err}");
        }
        true
    }

    /// Withdraw every advertised service.
    pub fn unadvertise_all(&mut self) {
        let advertised = self.advertised.clone();
        for profile in &advertised {
            self.unadvertise(profile);
        }
    }

    /// Broadcast a browse query for OSC and OSCQuery services.
    pub fn refresh_services(&mut self) {
        if self.closed {
            return;
        }
        self.send_queries(Instant::now());
    }

    /// Services currently announced by this engine.
    pub fn advertised_services(&self) -> Vec<ServiceProfile> {
        self.advertised.clone()
    }

    /// Snapshot of the discovered OSC services, sorted by name.
    pub fn osc_services(&self) -> Vec<ServiceProfile> {
        sorted(&self.osc_services)
    }

    /// Snapshot of the discovered OSCQuery services, sorted by name.
    pub fn oscquery_services(&self) -> Vec<ServiceProfile> {
        sorted(&self.oscquery_services)
    }

    fn discovered_mut(&mut self, service_type: ServiceType) -> &mut HashSet<ServiceProfile> {
        match service_type {
            ServiceType::Osc => &mut self.osc_services,
            _ => &mut self.oscquery_services,
        }
    }

    fn outgoing(&self, now: Instant, raw: &[u8]) -> TaggedBytesMut {
        let local_ip = self
            .config
            .local_ip
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        TaggedBytesMut::datagram(now, SocketAddr::new(local_ip, MDNS_PORT), MDNS_DEST_ADDR, raw)
    }

    fn send_queries(&mut self, now: Instant) {
        let questions: Result<Vec<Question>> = TRACKED_SERVICE_TYPES
            .iter()
            .filter_map(|t| t.local_service_name())
            .map(|service| Ok(Question::new(Name::new(&format!("{service}."))?, DnsType::Ptr)))
            .collect();
        let raw = questions.and_then(|questions| Message::query(questions).pack());
        match raw {
            Ok(raw) => {
                log::trace!("Queuing mDNS browse query");
                let packet = self.outgoing(now, &raw);
                self.write_outs.push_back(packet);
            }
            Err(err) => log::error!("Failed to construct mDNS query: {err}"),
        }
    }

    /// Queue the PTR/SRV/TXT/address records of `profile` with the given TTL.
    fn send_service(&mut self, profile: &ServiceProfile, ttl: u32, now: Instant) -> Result<()> {
        let service = profile
            .service_type
            .service_name()
            .ok_or_else(|| Error::ErrUnknownServiceType(profile.to_string()))?;

        let mut labels = vec![profile.name.as_str()];
        labels.extend(service.split('.'));
        labels.push(LOCAL_DOMAIN);
        let instance = Name::from_labels(&labels)?;
        let service_name = Name::new(&format!("{service}.{LOCAL_DOMAIN}."))?;

        let address: Box<dyn ResourceBody> = match profile.address {
            IpAddr::V4(ip) => Box::new(AResource { a: ip.octets() }),
            IpAddr::V6(ip) => Box::new(AaaaResource { aaaa: ip.octets() }),
        };
        let srv = SrvResource {
            port: profile.port,
            target: instance.clone(),
            ..Default::default()
        };
        let txt = TxtResource {
            txt: vec![TXT_VERSION.to_owned()],
        };
        let owned = |body: Box<dyn ResourceBody>| {
            Resource::new(instance.clone(), DnsClass::unique(), ttl, body)
        };

        let mut msg = Message::response(
            vec![Resource::new(
                service_name,
                DNSCLASS_INET,
                ttl,
                Box::new(PtrResource {
                    ptr: instance.clone(),
                }),
            )],
            vec![owned(Box::new(srv)), owned(Box::new(txt)), owned(address)],
        );
        let raw = msg.pack()?;

        log::trace!("Queuing mDNS answer for {instance} (ttl {ttl})");
        let packet = self.outgoing(now, &raw);
        self.write_outs.push_back(packet);
        Ok(())
    }

    fn process_message(&mut self, msg: &TaggedBytesMut) {
        let peer = msg.transport.peer_addr;
        let parsed = match Message::parse(&msg.message) {
            Ok(parsed) => parsed,
            Err(err) => {
                // Plenty of multicast traffic on a LAN is not for us.
                log::info!("Could not parse mDNS packet from {peer}: {err}");
                return;
            }
        };
        log::trace!("mDNS message from {peer}: {parsed}");

        if parsed.header.response {
            self.process_response(&parsed);
        } else {
            self.process_questions(&parsed.questions, msg.now);
        }
    }

    fn process_questions(&mut self, questions: &[Question], now: Instant) {
        let mut wanted: Vec<ServiceType> = Vec::new();
        for q in questions.iter().take(MAX_MESSAGE_RECORDS) {
            if q.typ != DnsType::Ptr && q.typ != DnsType::All {
                continue;
            }
            if q.wants_unicast() {
                log::trace!("Unicast reply requested for {}, answering on multicast", q.name);
            }
            if let Some(service_type) = tracked_service_type(&q.name)
                && !wanted.contains(&service_type)
            {
                wanted.push(service_type);
            }
        }

        let to_answer: Vec<ServiceProfile> = self
            .advertised
            .iter()
            .filter(|p| wanted.contains(&p.service_type))
            .cloned()
            .collect();
        for profile in to_answer {
            log::trace!("Answering query for {profile}");
            if let Err(err) = self.send_service(&profile, RESPONSE_TTL, now) {
                log::error!("Failed to answer query for {profile}: {err}");
            }
        }
    }

    fn process_response(&mut self, msg: &Message) {
        // SRV and address records usually travel as additionals, some
        // responders put them among the answers. Multi-homed peers send many
        // AAAA and NSEC records, so every record is searched.
        let records: Vec<&Resource> = msg.records().collect();
        for answer in msg.answers.iter().take(MAX_MESSAGE_RECORDS) {
            let Some(service_type) = tracked_service_type(&answer.header.name) else {
                continue;
            };
            if let Err(err) = self.process_service_answer(answer, service_type, &records) {
                log::info!("Skipping {service_type} announcement: {err}");
            }
        }
    }

    fn process_service_answer(
        &mut self,
        answer: &Resource,
        service_type: ServiceType,
        records: &[&Resource],
    ) -> Result<()> {
        let instance = answer
            .body_as::<PtrResource>()
            .map(|ptr| ptr.ptr.canonical());

        if answer.is_goodbye() {
            if let Some(instance) = &instance
                && let Some(name) = instance.split('.').next()
            {
                self.remove_service(name, service_type);
            }
            return Ok(());
        }

        let srv_records: Vec<(&Resource, &SrvResource)> = records
            .iter()
            .filter_map(|r| r.body_as::<SrvResource>().map(|srv| (*r, srv)))
            .collect();
        let (srv_owner, srv) = srv_records
            .iter()
            .find(|(r, _)| instance.as_deref() == Some(r.header.name.canonical().as_str()))
            .or_else(|| srv_records.first())
            .ok_or(Error::ErrSrvRecordNotFound)?;

        // The instance name is the first label of the SRV owner, the rest is
        // the service type and domain.
        let name = srv_owner
            .header
            .name
            .labels()
            .first()
            .map(|label| label.to_string())
            .ok_or(Error::ErrSrvRecordNotFound)?;

        let address = find_address(records, &srv.target.canonical())
            .ok_or_else(|| Error::ErrNoAddressRecord(name.clone()))?;

        let profile = ServiceProfile {
            name,
            address,
            port: srv.port,
            service_type,
        };

        if self.advertised.contains(&profile) {
            log::trace!("Ignoring own announcement of {profile}");
            return Ok(());
        }

        let known = self.discovered_mut(service_type);
        if known
            .iter()
            .any(|p| p.is_same_service(&profile.name, service_type))
        {
            return Ok(());
        }
        known.insert(profile.clone());

        log::info!(
            "Found {service_type} service match {} on port {}",
            profile.name,
            profile.port
        );
        self.event_outs.push_back(match service_type {
            ServiceType::Osc => MdnsEvent::OscServiceAdded(profile),
            _ => MdnsEvent::OscQueryServiceAdded(profile),
        });
        Ok(())
    }

    fn remove_service(&mut self, name: &str, service_type: ServiceType) {
        let known = self.discovered_mut(service_type);
        let Some(profile) = known
            .iter()
            .find(|p| p.is_same_service(name, service_type))
            .cloned()
        else {
            return;
        };
        known.remove(&profile);

        log::info!("{service_type} service {} said goodbye", profile.name);
        self.event_outs.push_back(match service_type {
            ServiceType::Osc => MdnsEvent::OscServiceRemoved(profile),
            _ => MdnsEvent::OscQueryServiceRemoved(profile),
        });
    }
}

/// Which tracked service type, if any, `name` is the PTR owner of.
fn tracked_service_type(name: &Name) -> Option<ServiceType> {
    let canonical = name.canonical();
    TRACKED_SERVICE_TYPES
        .into_iter()
        .find(|t| t.local_service_name().as_deref() == Some(canonical.as_str()))
}

/// Address of the SRV target: an A record on the target, any A record, then
/// the same for AAAA.
fn find_address(records: &[&Resource], target: &str) -> Option<IpAddr> {
    fn pick<'a, T: 'static>(records: &[&'a Resource], target: &str) -> Option<&'a T> {
        let mut first = None;
        for r in records {
            if let Some(body) = r.body_as::<T>() {
                if r.header.name.canonical() == target {
                    return Some(body);
                }
                first.get_or_insert(body);
            }
        }
        first
    }

    pick::<AResource>(records, target)
        .map(|a| IpAddr::V4(a.address()))
        .or_else(|| pick::<AaaaResource>(records, target).map(|aaaa| IpAddr::V6(aaaa.address())))
}

fn sorted(services: &HashSet<ServiceProfile>) -> Vec<ServiceProfile> {
    let mut services: Vec<ServiceProfile> = services.iter().cloned().collect();
    services.sort_by(|a, b| a.name.cmp(&b.name));
    services
}

impl sansio::Protocol<TaggedBytesMut, (), ()> for Mdns {
    type Rout = ();
    type Wout = TaggedBytesMut;
    type Eout = MdnsEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.process_message(&msg);
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    fn handle_write(&mut self, _msg: ()) -> Result<()> {
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.write_outs.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Self::Time) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }

        if let Some(next_timeout) = self.next_timeout
            && next_timeout <= now
        {
            self.send_queries(now);
            self.next_timeout = self.config.refresh_interval.map(|interval| now + interval);
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        self.next_timeout
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.advertised.clear();
        self.osc_services.clear();
        self.oscquery_services.clear();
        self.write_outs.clear();
        self.event_outs.clear();
        self.next_timeout = None;
        Ok(())
    }
}
