//! Service profiles advertised by this process or discovered on the network.

use std::fmt;
use std::net::IpAddr;

/// DNS-SD service type of plain OSC servers.
pub const OSC_UDP_SERVICE: &str = "_osc._udp";

/// DNS-SD service type of OSCQuery HTTP servers.
pub const OSCJSON_TCP_SERVICE: &str = "_oscjson._tcp";

/// Domain every advertised service lives under.
pub(crate) const LOCAL_DOMAIN: &str = "local";

/// Kind of service a [`ServiceProfile`] describes.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ServiceType {
    #[default]
    Unknown,
    OscQuery,
    Osc,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ServiceType::Unknown => "Unknown",
            ServiceType::OscQuery => "OSCQuery",
            ServiceType::Osc => "OSC",
        };
        write!(f, "{s}")
    }
}

impl ServiceType {
    /// Maps a DNS-SD service name such as `_osc._udp` or
    /// `_oscjson._tcp.local.` to its service type.
    ///
    /// The comparison ignores ASCII case, a trailing dot and the `.local`
    /// domain.
    pub fn from_service_name(name: &str) -> ServiceType {
        let name = name.trim_end_matches('.').to_ascii_lowercase();
        let name = name
            .strip_suffix(LOCAL_DOMAIN)
            .map(|n| n.trim_end_matches('.'))
            .unwrap_or(&name);
        if name == OSC_UDP_SERVICE {
            ServiceType::Osc
        } else if name == OSCJSON_TCP_SERVICE {
            ServiceType::OscQuery
        } else {
            ServiceType::Unknown
        }
    }

    /// The DNS-SD service name without the domain, e.g. `_osc._udp`.
    pub fn service_name(&self) -> Option<&'static str> {
        match *self {
            ServiceType::Osc => Some(OSC_UDP_SERVICE),
            ServiceType::OscQuery => Some(OSCJSON_TCP_SERVICE),
            ServiceType::Unknown => None,
        }
    }

    /// `<service>.local`, the name peers send PTR queries for.
    pub(crate) fn local_service_name(&self) -> Option<String> {
        self.service_name()
            .map(|service| format!("{service}.{LOCAL_DOMAIN}"))
    }
}

/// One advertised or discovered network service.
///
/// Two profiles are equal only when name, address, port and service type
/// all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceProfile {
    pub name: String,
    pub address: IpAddr,
    pub port: u16,
    pub service_type: ServiceType,
}

impl ServiceProfile {
    pub fn new(name: &str, address: IpAddr, port: u16, service_type: ServiceType) -> Self {
        Self {
            name: name.to_owned(),
            address,
            port,
            service_type,
        }
    }

    /// Service type as it appears in DNS-SD records, `UNKNOWN` when the
    /// profile has no known type.
    pub fn service_type_string(&self) -> &'static str {
        self.service_type.service_name().unwrap_or("UNKNOWN")
    }

    pub(crate) fn is_same_service(&self, name: &str, service_type: ServiceType) -> bool {
        self.service_type == service_type && self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for ServiceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {}:{}",
            self.name, self.service_type, self.address, self.port
        )
    }
}
