//! Desired monitor cluster configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MonError, MonResult};
use crate::inventory::{Taint, TaintEffect};

/// Upper bound on monitor count.
pub const MAX_MON_COUNT: usize = 9;

/// Default data directory on hosts.
pub const DEFAULT_DATA_DIR_HOST_PATH: &str = "/var/lib/rook";

/// Toleration operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TolerationOperator {
    #[default]
    Equal,
    Exists,
}

/// A toleration for a node taint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Toleration {
    /// Empty key with `Exists` tolerates every taint.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub operator: TolerationOperator,
    #[serde(default)]
    pub value: Option<String>,
    /// `None` tolerates every effect.
    #[serde(default)]
    pub effect: Option<TaintEffect>,
}

impl Toleration {
    /// Returns true if this toleration matches the taint.
    pub fn tolerates(&self, taint: &Taint) -> bool {
        if let Some(effect) = self.effect {
            if effect != taint.effect {
                return false;
            }
        }
        match (&self.key, self.operator) {
            (None, TolerationOperator::Exists) => true,
            (None, TolerationOperator::Equal) => false,
            (Some(key), _) if *key != taint.key => false,
            (Some(_), TolerationOperator::Exists) => true,
            (Some(_), TolerationOperator::Equal) => {
                self.value.as_deref().unwrap_or("") == taint.value.as_deref().unwrap_or("")
            }
        }
    }
}

/// Placement constraints for monitors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonPlacement {
    /// Labels a node must carry.
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub tolerations: Vec<Toleration>,
}

impl MonPlacement {
    /// Returns true if the taint blocks scheduling and no toleration matches.
    pub fn blocked_by(&self, taint: &Taint) -> bool {
        match taint.effect {
            TaintEffect::PreferNoSchedule => false,
            TaintEffect::NoSchedule | TaintEffect::NoExecute => {
                !self.tolerations.iter().any(|t| t.tolerates(taint))
            }
        }
    }
}

/// Monitor count and co-location policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonSpec {
    pub count: usize,
    #[serde(default)]
    pub allow_multiple_per_node: bool,
}

impl Default for MonSpec {
    fn default() -> Self {
        Self {
            count: 3,
            allow_multiple_per_node: false,
        }
    }
}

impl MonSpec {
    /// Validate the requested monitor count.
    pub fn validate(&self) -> MonResult<()> {
        if self.count == 0 {
            return Err(MonError::InvalidSpec(
                "at least one monitor is required".to_string(),
            ));
        }
        if self.count > MAX_MON_COUNT {
            return Err(MonError::InvalidSpec(format!(
                "monitor count {} exceeds the maximum of {}",
                self.count, MAX_MON_COUNT
            )));
        }
        if self.count % 2 == 0 {
            warn!(
                count = self.count,
                "Even monitor count tolerates no more failures than count - 1"
            );
        }
        Ok(())
    }
}

/// Network settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Bind monitors to node addresses instead of stable service addresses.
    #[serde(default)]
    pub host_network: bool,
}

/// Desired state handed to a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    #[serde(default)]
    pub mon: MonSpec,
    #[serde(default)]
    pub placement: MonPlacement,
    #[serde(default)]
    pub network: NetworkSpec,
    /// Host directory under which monitor data directories live.
    /// Empty means monitors keep their data in the container only.
    #[serde(default = "default_data_dir_host_path")]
    pub data_dir_host_path: String,
}

fn default_data_dir_host_path() -> String {
    DEFAULT_DATA_DIR_HOST_PATH.to_string()
}

impl Default for ClusterSpec {
    fn default() -> Self {
        Self {
            mon: MonSpec::default(),
            placement: MonPlacement::default(),
            network: NetworkSpec::default(),
            data_dir_host_path: default_data_dir_host_path(),
        }
    }
}

impl ClusterSpec {
    /// Validate the spec before any daemon is touched.
    pub fn validate(&self) -> MonResult<()> {
        self.mon.validate()
    }
}
