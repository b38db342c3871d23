//! Configuration for the monitor operator.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use monplane_reconcile::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, DEFAULT_RECONCILE_INTERVAL,
};

use crate::mon::quorum::QuorumWait;
use crate::mon::spec::{ClusterSpec, MonSpec, NetworkSpec, DEFAULT_DATA_DIR_HOST_PATH};

/// Operator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cluster name, also used as the resource name prefix.
    pub cluster_name: String,

    /// Data directory for local state.
    pub data_dir: PathBuf,

    /// Host directory under which monitor data directories are derived.
    pub data_dir_host_path: String,

    /// Version of the monitor daemons to run.
    pub mon_version: String,

    /// Desired number of monitors.
    pub mon_count: usize,

    /// Allow more than one monitor per node.
    pub allow_multiple_per_node: bool,

    /// Bind monitors to node addresses.
    pub host_network: bool,

    /// JSON file listing the node inventory.
    pub node_inventory: PathBuf,

    /// Interval between reconciliation passes in seconds.
    pub reconcile_interval_secs: u64,

    /// Quorum wait deadline in seconds.
    pub quorum_timeout_secs: u64,

    /// Delay between quorum status calls in seconds.
    pub quorum_interval_secs: u64,

    /// Require every monitor to report in quorum.
    pub require_all_in_quorum: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str) -> bool {
    std::env::var(name)
        .map(|s| parse_bool(&s))
        .unwrap_or(false)
}

fn parse_bool(raw: &str) -> bool {
    let raw = raw.trim();
    raw == "1" || raw.eq_ignore_ascii_case("true")
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let cluster_name =
            std::env::var("MONPLANE_CLUSTER_NAME").unwrap_or_else(|_| "rook-ceph".to_string());
        if cluster_name.trim().is_empty() {
            bail!("MONPLANE_CLUSTER_NAME must not be empty");
        }

        let data_dir = std::env::var("MONPLANE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/var/lib/monplane"));

        let data_dir_host_path = std::env::var("MONPLANE_DATA_DIR_HOST_PATH")
            .unwrap_or_else(|_| DEFAULT_DATA_DIR_HOST_PATH.to_string());

        let mon_version =
            std::env::var("MONPLANE_MON_VERSION").unwrap_or_else(|_| "v18.2.4".to_string());

        let mon_count = std::env::var("MONPLANE_MON_COUNT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);

        let node_inventory = std::env::var("MONPLANE_NODE_INVENTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("nodes.json"));

        let log_level =
            std::env::var("MONPLANE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            cluster_name,
            data_dir,
            data_dir_host_path,
            mon_version,
            mon_count,
            allow_multiple_per_node: env_bool("MONPLANE_ALLOW_MULTIPLE_PER_NODE"),
            host_network: env_bool("MONPLANE_HOST_NETWORK"),
            node_inventory,
            reconcile_interval_secs: env_u64(
                "MONPLANE_RECONCILE_INTERVAL",
                DEFAULT_RECONCILE_INTERVAL.as_secs(),
            ),
            quorum_timeout_secs: env_u64("MONPLANE_QUORUM_TIMEOUT", DEFAULT_POLL_TIMEOUT.as_secs()),
            quorum_interval_secs: env_u64("MONPLANE_QUORUM_INTERVAL", DEFAULT_POLL_INTERVAL.as_secs()),
            require_all_in_quorum: env_bool("MONPLANE_REQUIRE_ALL_IN_QUORUM"),
            log_level,
        })
    }

    /// Path of the SQLite state database.
    pub fn state_db_path(&self) -> PathBuf {
        self.data_dir.join("state.db")
    }

    /// Desired cluster spec.
    pub fn cluster_spec(&self) -> ClusterSpec {
        ClusterSpec {
            mon: MonSpec {
                count: self.mon_count,
                allow_multiple_per_node: self.allow_multiple_per_node,
            },
            network: NetworkSpec {
                host_network: self.host_network,
            },
            data_dir_host_path: self.data_dir_host_path.clone(),
            ..Default::default()
        }
    }

    /// Quorum wait policy.
    pub fn quorum_wait(&self) -> QuorumWait {
        QuorumWait {
            interval: Duration::from_secs(self.quorum_interval_secs),
            timeout: Duration::from_secs(self.quorum_timeout_secs),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            require_all: self.require_all_in_quorum,
        }
    }

    /// Interval between reconciliation passes.
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool(" true "));
        assert!(!parse_bool("yes"));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn test_derived_settings() {
        let config = Config {
            cluster_name: "rook-ceph".to_string(),
            data_dir: PathBuf::from("/tmp/monplane"),
            data_dir_host_path: "/var/lib/rook".to_string(),
            mon_version: "v18.2.4".to_string(),
            mon_count: 5,
            allow_multiple_per_node: true,
            host_network: true,
            node_inventory: PathBuf::from("/tmp/monplane/nodes.json"),
            reconcile_interval_secs: 0,
            quorum_timeout_secs: 60,
            quorum_interval_secs: 2,
            require_all_in_quorum: true,
            log_level: "info".to_string(),
        };

        let spec = config.cluster_spec();
        assert_eq!(spec.mon.count, 5);
        assert!(spec.mon.allow_multiple_per_node);
        assert!(spec.network.host_network);

        let wait = config.quorum_wait();
        assert_eq!(wait.timeout, Duration::from_secs(60));
        assert!(wait.require_all);

        assert_eq!(config.state_db_path(), PathBuf::from("/tmp/monplane/state.db"));
        assert_eq!(config.reconcile_interval(), Duration::from_secs(1));
    }
}
