//! # oscquery
//!
//! OSCQuery lets programs publish their OSC parameter namespace and find
//! each other on the local network. A service hosts a tree of parameters,
//! serves it as JSON over HTTP and announces itself over multicast DNS as
//! `_oscjson._tcp` (the HTTP server) and `_osc._udp` (the OSC transport).
//!
//! ## Example
//!
//! ```rust,no_run
//! use oscquery::{AccessValues, OscQueryServiceBuilder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = OscQueryServiceBuilder::new()
//!         .with_service_name("Synth")
//!         .with_defaults()
//!         .build();
//!
//!     service.add_endpoint("/synth/gain", "f", AccessValues::ReadWrite, Some("0.5"), None);
//!     service.on_oscquery_service_added(|profile| println!("found {profile}"));
//!     service.refresh_services();
//! }
//! ```
//!
//! ## Layout
//!
//! - [`tree`]: the path-indexed parameter tree and its JSON shape
//! - [`http`]: the HTTP server and its middleware pipeline
//! - [`discovery`]: the discovery trait and its mDNS driver
//! - [`client`]: fetching host info and trees from peers
//! - [`service`]: the orchestrator tying the parts together

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod attributes;
pub mod client;
pub mod discovery;
pub mod host_info;
pub mod http;
pub mod node;
pub mod service;
pub mod tree;
pub mod value;

pub use attributes::{AccessValues, OscTyped, osc_type_for};
pub use discovery::{Discovery, DiscoveryEvents, MdnsDiscovery};
pub use host_info::HostInfo;
pub use mdns::{MdnsConfig, MdnsEvent, ServiceProfile, ServiceType};
pub use node::OscQueryNode;
pub use service::{OscQueryService, OscQueryServiceBuilder};
pub use shared::error::{Error, Result};
pub use tree::{OscQueryTree, normalize_path};
pub use value::{OscValue, ValueProvider, parse_values};
