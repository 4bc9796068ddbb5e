use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::AccessValues;
use crate::value::OscValue;

/// One node of an OSCQuery namespace in its wire shape.
///
/// Optional attributes left empty are omitted from the JSON.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscQueryNode {
    #[serde(rename = "DESCRIPTION", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "FULL_PATH")]
    pub full_path: String,

    #[serde(rename = "ACCESS", default)]
    pub access: AccessValues,

    #[serde(rename = "CONTENTS", default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<BTreeMap<String, OscQueryNode>>,

    #[serde(rename = "TYPE", default, skip_serializing_if = "Option::is_none")]
    pub osc_type: Option<String>,

    #[serde(rename = "VALUE", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<OscValue>>,
}

impl OscQueryNode {
    pub fn new(full_path: &str) -> Self {
        Self {
            full_path: full_path.to_owned(),
            ..Default::default()
        }
    }

    /// Last path segment, empty for the root.
    pub fn name(&self) -> &str {
        node_name(&self.full_path)
    }

    /// Path of the containing node, `/` for children of the root.
    pub fn parent_path(&self) -> &str {
        parent_path(&self.full_path)
    }

    pub fn child(&self, name: &str) -> Option<&OscQueryNode> {
        self.contents.as_ref()?.get(name)
    }
}

impl fmt::Display for OscQueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{json}"),
            Err(_) => Err(fmt::Error),
        }
    }
}

pub(crate) fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

pub(crate) fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}
