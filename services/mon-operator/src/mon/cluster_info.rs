//! Known monitor identities and their endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MonError, MonResult};

use super::mapping::ENDPOINT_DATA_KEY;

/// A known monitor and its `ip:port` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonInfo {
    pub name: String,
    pub endpoint: String,
}

impl MonInfo {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Identity and endpoint state handed to the coordination service's client
/// tooling.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Cluster name.
    pub name: String,
    /// Monitors keyed by short id.
    #[serde(default)]
    pub monitors: BTreeMap<String, MonInfo>,
}

impl ClusterInfo {
    /// Empty cluster info for a named cluster.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            monitors: BTreeMap::new(),
        }
    }

    /// Returns true once at least one monitor is known.
    pub fn is_initialized(&self) -> bool {
        !self.name.is_empty() && !self.monitors.is_empty()
    }

    /// Record or replace a monitor's endpoint.
    pub fn set_monitor(&mut self, name: &str, endpoint: String) {
        self.monitors
            .insert(name.to_string(), MonInfo::new(name, endpoint));
    }

    /// Endpoint list as `name=ip:port[,name=ip:port...]`, sorted by name.
    pub fn flatten_endpoints(&self) -> String {
        flatten_endpoints(&self.monitors)
    }

    /// Parse a flattened endpoint list. An empty string holds no monitors.
    pub fn parse_endpoints(raw: &str) -> MonResult<BTreeMap<String, MonInfo>> {
        let mut monitors = BTreeMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, endpoint) = entry
                .split_once('=')
                .filter(|(n, e)| !n.is_empty() && !e.is_empty())
                .ok_or_else(|| MonError::CorruptState {
                    key: ENDPOINT_DATA_KEY.to_string(),
                    message: format!("malformed endpoint entry '{}'", entry),
                })?;
            monitors.insert(name.to_string(), MonInfo::new(name, endpoint));
        }
        Ok(monitors)
    }
}

/// Flatten monitors as `name=ip:port[,name=ip:port...]`.
pub fn flatten_endpoints(monitors: &BTreeMap<String, MonInfo>) -> String {
    monitors
        .values()
        .map(|m| format!("{}={}", m.name, m.endpoint))
        .collect::<Vec<_>>()
        .join(",")
}
