use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::{ACCESS, CLIPMODE, RANGE, TYPE, VALUE};

pub const OSC_TRANSPORT_UDP: &str = "UDP";

/// The `HOST_INFO` document describing how to reach this process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    #[serde(rename = "NAME")]
    pub name: String,

    /// Optional attributes this implementation understands.
    #[serde(rename = "EXTENSIONS", default)]
    pub extensions: BTreeMap<String, bool>,

    #[serde(rename = "OSC_IP")]
    pub osc_ip: String,

    #[serde(rename = "OSC_PORT")]
    pub osc_port: u16,

    #[serde(rename = "OSC_TRANSPORT", default = "default_transport")]
    pub osc_transport: String,

    #[serde(rename = "WS_IP", default, skip_serializing_if = "Option::is_none")]
    pub ws_ip: Option<String>,

    #[serde(rename = "WS_PORT", default, skip_serializing_if = "Option::is_none")]
    pub ws_port: Option<u16>,
}

fn default_transport() -> String {
    OSC_TRANSPORT_UDP.to_owned()
}

pub(crate) fn default_extensions() -> BTreeMap<String, bool> {
    [
        (ACCESS, true),
        (CLIPMODE, false),
        (RANGE, true),
        (TYPE, true),
        (VALUE, true),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v))
    .collect()
}

impl HostInfo {
    pub fn new(name: &str, osc_ip: &str, osc_port: u16) -> Self {
        HostInfo {
            name: name.to_owned(),
            extensions: default_extensions(),
            osc_ip: osc_ip.to_owned(),
            osc_port,
            osc_transport: default_transport(),
            ws_ip: None,
            ws_port: None,
        }
    }

    pub fn with_ws(mut self, ws_ip: &str, ws_port: u16) -> Self {
        self.ws_ip = Some(ws_ip.to_owned());
        self.ws_port = Some(ws_port);
        self
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{json}"),
            Err(_) => Err(fmt::Error),
        }
    }
}
