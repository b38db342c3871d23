//! Cluster orchestrator.
//!
//! One [`Orchestrator`] owns the state of one monitor cluster. Each call to
//! [`Orchestrator::start`] is a reconciliation pass:
//!
//! 1. Load state from the store (the store wins over in-memory state)
//! 2. Check every mapped monitor: re-create missing daemons, follow node
//!    address changes
//! 3. Place every monitor that has no mapping entry yet, then issue new
//!    identifiers until the desired count is reached
//! 4. Wait for quorum over every known monitor
//!
//! State is persisted after each daemon is acknowledged and before the
//! next is scheduled. A crash mid-pass loses at most the one daemon whose
//! creation was in flight.

use std::collections::BTreeMap;
use std::sync::Arc;

use monplane_id::DaemonId;
use monplane_reconcile::{ConvergenceStatus, SpecHash};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{MonError, MonResult};
use crate::exec::CommandExecutor;
use crate::inventory::{LabelSelector, Node, NodeInventory};
use crate::lifecycle::DaemonLifecycle;
use crate::scheduler::{schedule_monitor, scan_node_usage};
use crate::store::ConfigStore;

use super::cluster_info::ClusterInfo;
use super::config::{parse_endpoint, IdentityContext, MonConfig, DEFAULT_MSGR1_PORT};
use super::mapping::{Mapping, NodeInfo, PersistedState, ENDPOINT_CONFIG_NAME};
use super::quorum::{wait_for_quorum, QuorumWait};
use super::spec::ClusterSpec;

/// External services a pass talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ConfigStore>,
    pub inventory: Arc<dyn NodeInventory>,
    pub lifecycle: Arc<dyn DaemonLifecycle>,
    pub executor: Arc<dyn CommandExecutor>,
}

/// Orchestrator configuration that is not part of the desired cluster spec.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Prefix of resource names, e.g. `rook-ceph` for `rook-ceph-mon-a`.
    pub resource_prefix: String,
    /// Selector passed to the node inventory.
    pub inventory_selector: LabelSelector,
    pub quorum: QuorumWait,
    /// Give new monitors deterministic `2.4.6.x` addresses instead of
    /// asking the lifecycle provider. Test and bootstrap use only.
    pub bootstrap_addresses: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            resource_prefix: "rook-ceph".to_string(),
            inventory_selector: LabelSelector::everything(),
            quorum: QuorumWait::default(),
            bootstrap_addresses: false,
        }
    }
}

/// Outcome of quorum verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuorumCheck {
    Confirmed { attempts: u32, members: Vec<String> },
    /// Verification failed on a pass that created nothing. The cluster stays
    /// initialized and the next pass verifies again.
    Unconfirmed { reason: String },
}

/// Result of a successful pass.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub cluster_info: ClusterInfo,
    /// Monitors placed during this pass.
    pub created: Vec<String>,
    /// Already-placed monitors whose daemon was re-applied.
    pub updated: Vec<String>,
    pub quorum: QuorumCheck,
}

impl StartOutcome {
    pub fn status(&self) -> ConvergenceStatus {
        match self.quorum {
            QuorumCheck::Confirmed { .. } => ConvergenceStatus::Converged,
            QuorumCheck::Unconfirmed { .. } => ConvergenceStatus::Converging,
        }
    }
}

/// What a daemon's applied spec hash covers.
#[derive(Serialize)]
struct DaemonSpec<'a> {
    version: &'a str,
    mon: &'a MonConfig,
}

fn daemon_spec_hash(version: &str, mon: &MonConfig) -> MonResult<SpecHash> {
    SpecHash::of(&DaemonSpec { version, mon }).map_err(|e| MonError::Internal(e.to_string()))
}

fn creation_error(daemon: &str, err: anyhow::Error) -> MonError {
    MonError::DaemonCreation {
        daemon: daemon.to_string(),
        message: format!("{:#}", err),
    }
}

struct LoadedState {
    /// Nothing has been persisted yet.
    fresh: bool,
    /// Monitors dropped for an invalid identifier.
    pruned: Vec<String>,
}

/// Owns and reconciles one monitor cluster.
pub struct Orchestrator {
    cluster_name: String,
    collaborators: Collaborators,
    settings: OrchestratorSettings,
    lock: Option<Arc<Mutex<()>>>,
    cluster_info: ClusterInfo,
    mapping: Mapping,
    max_mon_id: Option<usize>,
}

impl Orchestrator {
    pub fn new(
        cluster_name: impl Into<String>,
        collaborators: Collaborators,
        settings: OrchestratorSettings,
    ) -> Self {
        let cluster_name = cluster_name.into();
        Self {
            cluster_info: ClusterInfo::new(cluster_name.clone()),
            cluster_name,
            collaborators,
            settings,
            lock: None,
            mapping: Mapping::default(),
            max_mon_id: None,
        }
    }

    /// Hold `lock` for the duration of every pass. Orchestrators of
    /// clusters sharing one identifier namespace must share the lock.
    pub fn with_orchestration_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn cluster_info(&self) -> &ClusterInfo {
        &self.cluster_info
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn max_mon_id(&self) -> Option<usize> {
        self.max_mon_id
    }

    /// Run one reconciliation pass.
    ///
    /// `cluster_info` seeds the known monitors on first-ever bootstrap; once
    /// state has been persisted the store is authoritative.
    #[instrument(skip(self, cluster_info, spec), fields(cluster = %self.cluster_name))]
    pub async fn start(
        &mut self,
        cluster_info: Option<ClusterInfo>,
        version: &str,
        spec: &ClusterSpec,
    ) -> MonResult<StartOutcome> {
        let lock = self.lock.clone();
        let _guard = match lock.as_ref() {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        spec.validate()?;
        let loaded = self.load_state(cluster_info).await?;
        let ctx = IdentityContext::new(&self.settings.resource_prefix, spec.data_dir_host_path.clone())
            .with_bootstrap_addresses(self.settings.bootstrap_addresses);

        let (mapped, unmapped) = self.existing_monitors(&ctx);
        let existing = mapped.len() + unmapped.len();
        let mut nodes = None;
        let mut created = Vec::new();
        let mut updated = Vec::new();

        for mon in mapped {
            let name = mon.name().to_string();
            if self.ensure_existing(mon, version, &mut nodes).await? {
                updated.push(name);
            }
        }

        for mon in unmapped {
            let name = mon.name().to_string();
            self.place_and_create(mon, version, spec, &mut nodes).await?;
            created.push(name);
        }

        if existing > spec.mon.count {
            warn!(
                existing,
                desired = spec.mon.count,
                "More monitors than desired; remove extras explicitly"
            );
        }

        for _ in existing..spec.mon.count {
            let index = self.max_mon_id.map_or(0, |id| id + 1);
            let mon = MonConfig::for_daemon(DaemonId::from_index(index), &ctx);
            let name = mon.name().to_string();
            self.place_and_create(mon, version, spec, &mut nodes).await?;
            created.push(name);
        }

        if (loaded.fresh || !loaded.pruned.is_empty()) && created.is_empty() {
            self.persist().await?;
        }

        let expected: Vec<String> = self.cluster_info.monitors.keys().cloned().collect();
        let quorum = match wait_for_quorum(
            self.collaborators.executor.as_ref(),
            &self.cluster_name,
            &expected,
            &self.settings.quorum,
        )
        .await
        {
            Ok(report) => QuorumCheck::Confirmed {
                attempts: report.attempts,
                members: report.members,
            },
            Err(e @ MonError::QuorumTimeout { .. }) if created.is_empty() => {
                warn!(error = %e, "Quorum not confirmed; existing monitors left running");
                QuorumCheck::Unconfirmed {
                    reason: e.to_string(),
                }
            }
            Err(e) => return Err(e),
        };

        info!(
            monitors = expected.len(),
            created = created.len(),
            updated = updated.len(),
            "Monitor reconciliation complete"
        );

        Ok(StartOutcome {
            cluster_info: self.cluster_info.clone(),
            created,
            updated,
            quorum,
        })
    }

    /// Decommission a monitor. Its identifier is never reissued.
    ///
    /// Returns false if the monitor is unknown.
    #[instrument(skip(self), fields(cluster = %self.cluster_name))]
    pub async fn remove_mon(&mut self, name: &str) -> MonResult<bool> {
        let lock = self.lock.clone();
        let _guard = match lock.as_ref() {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let loaded = self.load_state(None).await?;
        if !loaded.pruned.is_empty() {
            self.persist().await?;
        }
        // No daemon can exist for an identifier that does not parse.
        if loaded.pruned.iter().any(|pruned| pruned == name) {
            info!(daemon = %name, "Invalid monitor entry removed");
            return Ok(true);
        }
        if !self.cluster_info.monitors.contains_key(name) && self.mapping.node_of(name).is_none() {
            return Ok(false);
        }

        let daemon = DaemonId::parse(name).map_err(|source| MonError::InvalidIdentifier {
            id: name.to_string(),
            source,
        })?;
        let resource = daemon.resource_name(&self.settings.resource_prefix);
        self.collaborators
            .lifecycle
            .delete_daemon(&resource)
            .await
            .map_err(|e| MonError::DaemonRemoval {
                daemon: name.to_string(),
                message: format!("{:#}", e),
            })?;

        self.cluster_info.monitors.remove(name);
        let released = self.mapping.release(name);
        self.persist().await?;

        info!(
            daemon = %name,
            node = released.as_ref().map(|n| n.name.as_str()).unwrap_or(""),
            "Monitor removed"
        );
        Ok(true)
    }

    /// Load persisted state and drop monitors whose identifier does not parse.
    async fn load_state(&mut self, seed: Option<ClusterInfo>) -> MonResult<LoadedState> {
        let record = self.collaborators.store.load(ENDPOINT_CONFIG_NAME).await?;
        let fresh = record.is_none();

        match record {
            Some(record) => {
                let state = PersistedState::decode(&record)?;
                self.cluster_info.monitors = state.monitors;
                self.mapping = state.mapping;
                self.max_mon_id = state.max_mon_id;
            }
            None => {
                if let Some(seed) = seed.filter(ClusterInfo::is_initialized) {
                    info!(monitors = seed.monitors.len(), "Bootstrapping from provided cluster info");
                    self.cluster_info.monitors = seed.monitors;
                }
            }
        }
        self.cluster_info.name = self.cluster_name.clone();

        let pruned = self.prune_invalid();
        let highest = self
            .cluster_info
            .monitors
            .keys()
            .filter_map(|name| DaemonId::parse(name).ok())
            .map(|id| id.index())
            .max();
        self.max_mon_id = self.max_mon_id.max(highest);

        debug!(
            fresh,
            monitors = self.cluster_info.monitors.len(),
            max_mon_id = ?self.max_mon_id,
            "Loaded monitor state"
        );
        Ok(LoadedState { fresh, pruned })
    }

    /// Remove monitors with unparsable identifiers from the known set and
    /// the mapping so they are neither endpoints nor quorum members.
    fn prune_invalid(&mut self) -> Vec<String> {
        let invalid: BTreeMap<String, String> = self
            .cluster_info
            .monitors
            .keys()
            .chain(self.mapping.node.keys())
            .filter_map(|name| {
                DaemonId::parse(name)
                    .err()
                    .map(|e| (name.clone(), e.to_string()))
            })
            .collect();

        for (name, error) in &invalid {
            warn!(daemon = %name, error = %error, "Dropping monitor with invalid identifier");
            self.cluster_info.monitors.remove(name);
            self.mapping.release(name);
        }
        invalid.into_keys().collect()
    }

    async fn persist(&self) -> MonResult<()> {
        let record =
            PersistedState::capture(&self.cluster_info, &self.mapping, self.max_mon_id).encode()?;
        self.collaborators
            .store
            .save(ENDPOINT_CONFIG_NAME, &record)
            .await?;
        debug!(monitors = self.cluster_info.monitors.len(), "Persisted monitor state");
        Ok(())
    }

    /// Split known monitors into mapped and unmapped.
    fn existing_monitors(&self, ctx: &IdentityContext) -> (Vec<MonConfig>, Vec<MonConfig>) {
        let mut mapped = Vec::new();
        let mut unmapped = Vec::new();

        for info in self.cluster_info.monitors.values() {
            let mut mon = match MonConfig::generate(&info.name, ctx) {
                Ok(mon) => mon,
                Err(e) => {
                    warn!(daemon = %info.name, error = %e, "Skipping monitor with invalid identifier");
                    continue;
                }
            };
            match parse_endpoint(&info.endpoint) {
                Some((ip, port)) => {
                    mon.public_ip = ip;
                    mon.port = port;
                }
                None => warn!(daemon = %info.name, endpoint = %info.endpoint, "Unparsable endpoint"),
            }

            if self.mapping.node_of(&info.name).is_some() {
                mapped.push(mon);
            } else {
                unmapped.push(mon);
            }
        }

        (mapped, unmapped)
    }

    async fn load_nodes<'n>(&self, cache: &'n mut Option<Vec<Node>>) -> MonResult<&'n [Node]> {
        if cache.is_none() {
            let nodes = self
                .collaborators
                .inventory
                .list_nodes(&self.settings.inventory_selector)
                .await
                .map_err(|e| MonError::Inventory(format!("{:#}", e)))?;
            debug!(count = nodes.len(), "Listed nodes");
            *cache = Some(nodes);
        }
        Ok(cache.as_deref().unwrap_or_default())
    }

    /// Keep an already-placed monitor running as recorded. Returns true if
    /// its daemon was re-applied.
    async fn ensure_existing(
        &mut self,
        mut mon: MonConfig,
        version: &str,
        nodes: &mut Option<Vec<Node>>,
    ) -> MonResult<bool> {
        let name = mon.name().to_string();
        let mut drifted = false;

        if let Some(cached) = self.mapping.node_of(&name).cloned() {
            // Only node-bound addresses follow the node.
            if !cached.address.is_empty() && mon.public_ip == cached.address {
                let current = self
                    .load_nodes(nodes)
                    .await?
                    .iter()
                    .find(|n| n.name == cached.name)
                    .and_then(Node::address)
                    .map(str::to_string);
                match current {
                    Some(current) if current != cached.address => {
                        info!(
                            daemon = %name,
                            node = %cached.name,
                            old = %cached.address,
                            new = %current,
                            "Node address changed"
                        );
                        mon.public_ip = current.clone();
                        self.mapping.assign(
                            &name,
                            NodeInfo {
                                address: current,
                                ..cached
                            },
                        );
                        self.cluster_info.set_monitor(&name, mon.endpoint());
                        drifted = true;
                    }
                    Some(_) => {}
                    None => debug!(daemon = %name, node = %cached.name, "Mapped node not in inventory"),
                }
            }
        }

        let hash = daemon_spec_hash(version, &mon)?;
        let lifecycle = &self.collaborators.lifecycle;
        let applied = lifecycle
            .applied_spec_hash(&mon.resource_name)
            .await
            .map_err(|e| creation_error(&name, e))?;

        let apply = applied.as_ref() != Some(&hash);
        if apply {
            match applied {
                None => info!(daemon = %name, "Re-creating missing monitor daemon"),
                Some(_) => info!(daemon = %name, "Updating monitor daemon"),
            }
            lifecycle
                .create_or_update_daemon(&mon, &hash)
                .await
                .map_err(|e| creation_error(&name, e))?;
        }

        if drifted {
            self.persist().await?;
        }
        Ok(apply)
    }

    /// Schedule, create and record one monitor that has no mapping entry.
    async fn place_and_create(
        &mut self,
        mut mon: MonConfig,
        version: &str,
        spec: &ClusterSpec,
        nodes: &mut Option<Vec<Node>>,
    ) -> MonResult<()> {
        let name = mon.name().to_string();
        let index = mon.daemon_name.index();

        let nodes = self.load_nodes(nodes).await?;
        let zones = scan_node_usage(nodes, &self.mapping, spec);
        let node_info = schedule_monitor(&mon, &zones)
            .map(|usage| usage.node_info())
            .ok_or_else(|| MonError::NoSchedulableNodes {
                daemon: name.clone(),
            })?;

        let mut staged = self.mapping.clone();
        if spec.network.host_network {
            mon.public_ip = node_info.address.clone();
            mon.port = staged.lease_port(&node_info.name, DEFAULT_MSGR1_PORT)?;
        } else {
            mon.port = DEFAULT_MSGR1_PORT;
            if !self.settings.bootstrap_addresses {
                mon.public_ip = self
                    .collaborators
                    .lifecycle
                    .service_address(&mon)
                    .await
                    .map_err(|e| creation_error(&name, e))?;
            }
        }
        staged.assign(&name, node_info.clone());

        let hash = daemon_spec_hash(version, &mon)?;
        self.collaborators
            .lifecycle
            .create_or_update_daemon(&mon, &hash)
            .await
            .map_err(|e| creation_error(&name, e))?;

        info!(
            daemon = %name,
            node = %node_info.name,
            endpoint = %mon.endpoint(),
            "Monitor placed"
        );

        self.mapping = staged;
        self.cluster_info.set_monitor(&name, mon.endpoint());
        self.max_mon_id = Some(self.max_mon_id.map_or(index, |id| id.max(index)));
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::MockExecutor;
    use crate::inventory::{AddressKind, StaticInventory, ZONE_LABEL};
    use crate::lifecycle::DryRunLifecycle;
    use crate::mon::quorum::MonStatusResponse;
    use crate::store::MemoryStore;
    use std::time::Duration;

    struct Harness {
        store: Arc<MemoryStore>,
        inventory: Arc<StaticInventory>,
        lifecycle: Arc<DryRunLifecycle>,
    }

    fn nodes(count: usize) -> Vec<Node> {
        (0..count)
            .map(|i| {
                Node::new(format!("node{}", i))
                    .with_label(ZONE_LABEL, &format!("zone{}", i % 2))
                    .with_address(AddressKind::InternalIP, &format!("10.0.0.{}", i + 1))
            })
            .collect()
    }

    fn harness(node_count: usize) -> Harness {
        Harness {
            store: Arc::new(MemoryStore::new()),
            inventory: Arc::new(StaticInventory::new(nodes(node_count))),
            lifecycle: Arc::new(DryRunLifecycle::new()),
        }
    }

    fn orchestrator(h: &Harness, executor: MockExecutor) -> Orchestrator {
        orchestrator_with(h, executor, false)
    }

    fn orchestrator_with(h: &Harness, executor: MockExecutor, require_all: bool) -> Orchestrator {
        let settings = OrchestratorSettings {
            quorum: QuorumWait {
                interval: Duration::ZERO,
                timeout: Duration::from_millis(50),
                call_timeout: Duration::from_secs(1),
                require_all,
            },
            ..Default::default()
        };
        Orchestrator::new(
            "rook-ceph",
            Collaborators {
                store: h.store.clone(),
                inventory: h.inventory.clone(),
                lifecycle: h.lifecycle.clone(),
                executor: Arc::new(executor),
            },
            settings,
        )
    }

    fn healthy() -> MockExecutor {
        let out = serde_json::to_string(&MonStatusResponse::in_quorum(&["a", "b", "c"])).unwrap();
        MockExecutor::always(out)
    }

    #[tokio::test]
    async fn test_first_start_places_desired_count() {
        let h = harness(3);
        let mut orch = orchestrator(&h, healthy());

        let outcome = orch.start(None, "v18", &ClusterSpec::default()).await.unwrap();
        assert_eq!(outcome.created, vec!["a", "b", "c"]);
        assert!(outcome.cluster_info.is_initialized());
        assert_eq!(outcome.status(), ConvergenceStatus::Converged);
        assert_eq!(orch.max_mon_id(), Some(2));

        let mut used: Vec<&str> = orch.mapping().node.values().map(|n| n.name.as_str()).collect();
        used.sort();
        assert_eq!(used, vec!["node0", "node1", "node2"]);
        assert_eq!(h.lifecycle.apply_count(), 3);
        assert_eq!(h.store.save_count(), 3);
    }

    #[tokio::test]
    async fn test_spreads_across_zones_first() {
        let h = harness(4);
        let mut orch = orchestrator(&h, healthy());
        let spec = ClusterSpec {
            mon: crate::mon::spec::MonSpec {
                count: 2,
                allow_multiple_per_node: false,
            },
            ..Default::default()
        };
        orch.start(None, "v18", &spec).await.unwrap();
        // node0/node2 are zone0, node1/node3 are zone1.
        assert_eq!(orch.mapping().node["a"].name, "node0");
        assert_eq!(orch.mapping().node["b"].name, "node1");
    }

    #[tokio::test]
    async fn test_host_network_leases_ports() {
        let h = harness(1);
        let mut orch = orchestrator(&h, healthy());
        let mut spec = ClusterSpec::default();
        spec.network.host_network = true;
        spec.mon.allow_multiple_per_node = true;

        let outcome = orch.start(None, "v18", &spec).await.unwrap();
        assert_eq!(outcome.cluster_info.monitors["a"].endpoint, "10.0.0.1:6789");
        assert_eq!(outcome.cluster_info.monitors["b"].endpoint, "10.0.0.1:6790");
        assert_eq!(outcome.cluster_info.monitors["c"].endpoint, "10.0.0.1:6791");
        assert_eq!(orch.mapping().port["node0"], 6791);
    }

    #[tokio::test]
    async fn test_seeded_cluster_info_is_adopted() {
        let h = harness(3);
        let mut orch = orchestrator(&h, healthy());
        let mut seed = ClusterInfo::new("rook-ceph");
        seed.set_monitor("mon4", "10.0.0.9:6789".to_string());

        let outcome = orch
            .start(Some(seed), "v18", &ClusterSpec::default())
            .await
            .unwrap();
        assert_eq!(outcome.created, vec!["mon4", "f", "g"]);
        assert_eq!(orch.max_mon_id(), Some(6));
    }

    #[tokio::test]
    async fn test_missing_daemon_recreated() {
        let h = harness(3);
        let mut orch = orchestrator(&h, healthy());
        orch.start(None, "v18", &ClusterSpec::default()).await.unwrap();

        assert!(h.lifecycle.forget("rook-ceph-mon-b").await);
        let outcome = orch.start(None, "v18", &ClusterSpec::default()).await.unwrap();
        assert!(outcome.created.is_empty());
        assert_eq!(outcome.updated, vec!["b"]);
        assert!(h.lifecycle.applied("rook-ceph-mon-b").await.is_some());
    }

    #[tokio::test]
    async fn test_version_change_updates_in_place() {
        let h = harness(3);
        let mut orch = orchestrator(&h, healthy());
        orch.start(None, "v18", &ClusterSpec::default()).await.unwrap();
        let before = orch.mapping().clone();

        let outcome = orch.start(None, "v19", &ClusterSpec::default()).await.unwrap();
        assert_eq!(outcome.updated, vec!["a", "b", "c"]);
        assert_eq!(orch.mapping(), &before);
    }

    #[tokio::test]
    async fn test_host_network_follows_node_address() {
        let h = harness(3);
        let mut orch = orchestrator(&h, healthy());
        let mut spec = ClusterSpec::default();
        spec.network.host_network = true;
        orch.start(None, "v18", &spec).await.unwrap();

        let node = orch.mapping().node["a"].name.clone();
        assert!(
            h.inventory
                .update_node(&node, |n| {
                    n.addresses.clear();
                    n.addresses.push(crate::inventory::NodeAddress {
                        kind: AddressKind::InternalIP,
                        address: "10.9.9.9".to_string(),
                    });
                })
                .await
        );

        let outcome = orch.start(None, "v18", &spec).await.unwrap();
        assert_eq!(outcome.updated, vec!["a"]);
        assert_eq!(outcome.cluster_info.monitors["a"].endpoint, "10.9.9.9:6789");
        assert_eq!(orch.mapping().node["a"].address, "10.9.9.9");
        assert_eq!(orch.mapping().node["a"].name, node);
    }

    #[tokio::test]
    async fn test_soft_quorum_failure_without_creation() {
        let h = harness(3);
        let mut orch = orchestrator(&h, healthy());
        orch.start(None, "v18", &ClusterSpec::default()).await.unwrap();

        let mut orch = orchestrator(&h, MockExecutor::failing());
        let outcome = orch.start(None, "v18", &ClusterSpec::default()).await.unwrap();
        assert!(matches!(outcome.quorum, QuorumCheck::Unconfirmed { .. }));
        assert!(outcome.cluster_info.is_initialized());
        assert_eq!(outcome.status(), ConvergenceStatus::Converging);
    }

    #[tokio::test]
    async fn test_quorum_timeout_after_creation_is_error() {
        let h = harness(3);
        let mut orch = orchestrator(&h, MockExecutor::failing());
        let err = orch
            .start(None, "v18", &ClusterSpec::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MonError::QuorumTimeout { .. }));
        // Placement was persisted before verification.
        assert_eq!(h.store.save_count(), 3);
    }

    #[tokio::test]
    async fn test_invalid_spec_rejected_before_any_work() {
        let h = harness(3);
        let mut orch = orchestrator(&h, healthy());
        let mut spec = ClusterSpec::default();
        spec.mon.count = 0;
        assert!(matches!(
            orch.start(None, "v18", &spec).await,
            Err(MonError::InvalidSpec(_))
        ));
        assert_eq!(h.lifecycle.apply_count(), 0);
    }

    #[tokio::test]
    async fn test_shared_lock_is_released() {
        let h = harness(3);
        let lock = Arc::new(Mutex::new(()));
        let mut orch = orchestrator(&h, healthy()).with_orchestration_lock(lock.clone());
        orch.start(None, "v18", &ClusterSpec::default()).await.unwrap();
        assert!(lock.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_seed_entry_not_required_in_quorum() {
        let h = harness(3);
        let mut orch = orchestrator_with(&h, healthy(), true);
        let mut seed = ClusterInfo::new("rook-ceph");
        seed.set_monitor("monx", "10.0.0.9:6789".to_string());

        let outcome = orch
            .start(Some(seed), "v18", &ClusterSpec::default())
            .await
            .unwrap();
        assert_eq!(outcome.created, vec!["a", "b", "c"]);
        assert!(matches!(outcome.quorum, QuorumCheck::Confirmed { .. }));
        assert!(!outcome.cluster_info.monitors.contains_key("monx"));

        let record = h.store.get(ENDPOINT_CONFIG_NAME).await.unwrap();
        assert!(!record[crate::mon::mapping::ENDPOINT_DATA_KEY].contains("monx"));

        let again = orch.start(None, "v18", &ClusterSpec::default()).await.unwrap();
        assert!(matches!(again.quorum, QuorumCheck::Confirmed { .. }));
    }

    #[tokio::test]
    async fn test_remove_persisted_invalid_entry() {
        let h = harness(3);
        let mut info = ClusterInfo::new("rook-ceph");
        info.set_monitor("a", "10.96.0.1:6789".to_string());
        info.set_monitor("monx", "10.0.0.9:6789".to_string());
        let mut mapping = Mapping::default();
        mapping.assign(
            "monx",
            NodeInfo {
                name: "node0".to_string(),
                hostname: "node0".to_string(),
                address: "10.0.0.1".to_string(),
            },
        );
        let record = PersistedState::capture(&info, &mapping, Some(0))
            .encode()
            .unwrap();
        h.store.insert(ENDPOINT_CONFIG_NAME, record).await;

        let mut orch = orchestrator(&h, healthy());
        assert!(orch.remove_mon("monx").await.unwrap());
        assert!(orch.mapping().node.is_empty());

        let state = PersistedState::decode(&h.store.get(ENDPOINT_CONFIG_NAME).await.unwrap())
            .unwrap();
        assert_eq!(state.monitors.keys().collect::<Vec<_>>(), vec!["a"]);
        assert!(state.mapping.node.is_empty());
        assert_eq!(state.max_mon_id, Some(0));
        assert!(!orch.remove_mon("monx").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_unknown_mon() {
        let h = harness(3);
        let mut orch = orchestrator(&h, healthy());
        assert!(!orch.remove_mon("z").await.unwrap());
    }
}
