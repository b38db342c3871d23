//! Node and port assignments for every known monitor, and the durable
//! record they are persisted in.
//!
//! The whole state lives in one record so a single save lands the
//! endpoint list, the mapping and the id counter together:
//!
//! | Key        | Value                                         |
//! |------------|-----------------------------------------------|
//! | `data`     | `a=10.0.0.1:6789,b=10.0.0.2:6789`             |
//! | `mapping`  | `{"node":{"a":{"Name":..}},"port":{..}}`      |
//! | `maxMonId` | highest id index ever issued, `-1` for none   |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MonError, MonResult};
use crate::store::{Record, StoreError};

use super::cluster_info::{flatten_endpoints, ClusterInfo, MonInfo};

/// Name of the persisted record.
pub const ENDPOINT_CONFIG_NAME: &str = "rook-ceph-mon-endpoints";

/// Key of the flattened endpoint list.
pub const ENDPOINT_DATA_KEY: &str = "data";

/// Key of the JSON-encoded mapping.
pub const MAPPING_KEY: &str = "mapping";

/// Key of the id counter.
pub const MAX_MON_ID_KEY: &str = "maxMonId";

/// Cached facts about the node a monitor was placed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Hostname")]
    pub hostname: String,
    #[serde(rename = "Address")]
    pub address: String,
}

/// Placement decisions and port leases.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Mapping {
    /// Daemon name to the node it was scheduled on.
    #[serde(default)]
    pub node: BTreeMap<String, NodeInfo>,
    /// Node name to the highest port leased there.
    #[serde(default)]
    pub port: BTreeMap<String, u16>,
}

impl Mapping {
    /// Returns the node a daemon is assigned to.
    pub fn node_of(&self, daemon: &str) -> Option<&NodeInfo> {
        self.node.get(daemon)
    }

    /// Number of daemons assigned to a node.
    pub fn mon_count_on(&self, node: &str) -> usize {
        self.node.values().filter(|info| info.name == node).count()
    }

    /// Record a placement decision.
    pub fn assign(&mut self, daemon: &str, info: NodeInfo) {
        self.node.insert(daemon.to_string(), info);
    }

    /// Forget a daemon's placement. Drops the node's port lease once no
    /// daemon remains there.
    pub fn release(&mut self, daemon: &str) -> Option<NodeInfo> {
        let info = self.node.remove(daemon)?;
        if self.mon_count_on(&info.name) == 0 {
            self.port.remove(&info.name);
        }
        Some(info)
    }

    /// Lease the next free port on a node. The first lease takes `default`,
    /// later ones take one above the highest recorded lease.
    pub fn lease_port(&mut self, node: &str, default: u16) -> MonResult<u16> {
        let port = match self.port.get(node) {
            Some(&leased) => leased.checked_add(1).ok_or_else(|| {
                MonError::Internal(format!("no free port left on node {}", node))
            })?,
            None => default,
        };
        self.port.insert(node.to_string(), port);
        Ok(port)
    }
}

/// Everything the orchestrator persists for one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistedState {
    pub monitors: BTreeMap<String, MonInfo>,
    pub mapping: Mapping,
    /// Highest id index ever issued. Never decreases.
    pub max_mon_id: Option<usize>,
}

impl PersistedState {
    /// Snapshot the current orchestrator state.
    pub fn capture(cluster_info: &ClusterInfo, mapping: &Mapping, max_mon_id: Option<usize>) -> Self {
        Self {
            monitors: cluster_info.monitors.clone(),
            mapping: mapping.clone(),
            max_mon_id,
        }
    }

    /// Encode as a store record.
    pub fn encode(&self) -> MonResult<Record> {
        let mapping = serde_json::to_string(&self.mapping).map_err(StoreError::from)?;
        let max_mon_id = self
            .max_mon_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-1".to_string());

        let mut record = Record::new();
        record.insert(
            ENDPOINT_DATA_KEY.to_string(),
            flatten_endpoints(&self.monitors),
        );
        record.insert(MAPPING_KEY.to_string(), mapping);
        record.insert(MAX_MON_ID_KEY.to_string(), max_mon_id);
        Ok(record)
    }

    /// Decode a store record. Missing keys decode as empty state;
    /// present but undecodable keys are corrupt.
    pub fn decode(record: &Record) -> MonResult<Self> {
        let monitors = match record.get(ENDPOINT_DATA_KEY) {
            Some(raw) => ClusterInfo::parse_endpoints(raw)?,
            None => BTreeMap::new(),
        };

        let mapping = match record.get(MAPPING_KEY) {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(raw).map_err(|e| MonError::CorruptState {
                    key: MAPPING_KEY.to_string(),
                    message: e.to_string(),
                })?
            }
            _ => Mapping::default(),
        };

        let max_mon_id = match record.get(MAX_MON_ID_KEY).map(|raw| raw.trim()) {
            None | Some("") | Some("-1") => None,
            Some(raw) => Some(raw.parse().map_err(|_| MonError::CorruptState {
                key: MAX_MON_ID_KEY.to_string(),
                message: format!("'{}' is not a daemon index", raw),
            })?),
        };

        Ok(Self {
            monitors,
            mapping,
            max_mon_id,
        })
    }
}
