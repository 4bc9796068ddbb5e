//! Configuration for the OSCQuery discovery engine.
//!
//! # Examples
//!
//! ## Browse only
//!
//! ```rust
//! use oscquery_mdns::MdnsConfig;
//! use std::time::Duration;
//!
//! let config = MdnsConfig::default()
//!     .with_refresh_interval(Duration::from_secs(5));
//! ```
//!
//! ## Advertise and browse
//!
//! ```rust
//! use oscquery_mdns::MdnsConfig;
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! let config = MdnsConfig::default()
//!     .with_local_ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)))
//!     .with_query_on_start(false);
//! ```

use std::net::IpAddr;
use std::time::Duration;

/// Maximum number of questions, or of answers, handled per message.
///
/// Bounds the work done for a single, possibly hostile, packet. Records
/// searched for SRV and address data are not capped.
pub(crate) const MAX_MESSAGE_RECORDS: usize = 16;

/// Default TTL (Time To Live) for advertised records (120 seconds)
pub(crate) const RESPONSE_TTL: u32 = 120;

/// Text carried in the TXT record of every advertised service.
pub(crate) const TXT_VERSION: &str = "txtvers=1";

/// Configuration for a discovery engine.
///
/// ```rust
/// use oscquery_mdns::MdnsConfig;
/// use std::time::Duration;
///
/// let config = MdnsConfig::new()
///     .with_refresh_interval(Duration::from_secs(10));
/// ```
#[derive(Clone, Debug)]
pub struct MdnsConfig {
    /// How often the engine re-queries the network for OSC and OSCQuery
    /// services on its own.
    ///
    /// When `None`, queries are only sent on start (see `query_on_start`)
    /// and whenever [`Mdns::refresh_services`](crate::Mdns::refresh_services)
    /// is called.
    ///
    /// Default: None
    pub refresh_interval: Option<Duration>,

    /// Address put in A/AAAA records of advertised services whose profile
    /// carries an unspecified address (`0.0.0.0`).
    ///
    /// Also used as the local address of the transport context of outgoing
    /// answers.
    ///
    /// Default: None
    pub local_ip: Option<IpAddr>,

    /// Whether [`Mdns::new`](crate::Mdns::new) queues a browse query right
    /// away, the equivalent of a freshly joined network interface.
    ///
    /// Default: true
    pub query_on_start: bool,
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            refresh_interval: None,
            local_ip: None,
            query_on_start: true,
        }
    }
}

impl MdnsConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-query the network every `interval`. A zero interval disables
    /// periodic refresh.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = if interval.is_zero() {
            None
        } else {
            Some(interval)
        };
        self
    }

    /// Set the address to advertise when a profile has none.
    pub fn with_local_ip(mut self, local_ip: IpAddr) -> Self {
        self.local_ip = Some(local_ip);
        self
    }

    /// Enable or disable the initial browse query.
    pub fn with_query_on_start(mut self, query_on_start: bool) -> Self {
        self.query_on_start = query_on_start;
        self
    }
}
