//! Daemon lifecycle provider.
//!
//! Creating the actual process or container for a monitor is delegated to
//! a provider. The orchestrator only needs to know whether a daemon exists
//! with the spec it last applied.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use monplane_reconcile::SpecHash;
use tokio::sync::RwLock;
use tracing::info;

use crate::mon::config::MonConfig;

/// Creates, updates and removes monitor daemons.
#[async_trait]
pub trait DaemonLifecycle: Send + Sync {
    /// Hash of the spec last applied for a daemon, or `None` if the daemon
    /// does not exist.
    async fn applied_spec_hash(&self, resource_name: &str) -> Result<Option<SpecHash>>;

    /// Create or update the daemon for `mon` so it runs the hashed spec.
    async fn create_or_update_daemon(&self, mon: &MonConfig, spec_hash: &SpecHash) -> Result<()>;

    /// Virtual address that fronts a daemon outside host networking. The
    /// same identity must always get the same address, across restarts.
    async fn service_address(&self, mon: &MonConfig) -> Result<String>;

    /// Remove a daemon. Removing an absent daemon succeeds.
    async fn delete_daemon(&self, resource_name: &str) -> Result<()>;
}

/// Base of the virtual address range handed out by [`DryRunLifecycle`].
const SERVICE_BASE: Ipv4Addr = Ipv4Addr::new(10, 96, 0, 0);
const SERVICE_LAST: Ipv4Addr = Ipv4Addr::new(10, 111, 255, 254);

#[derive(Debug, Clone)]
struct AppliedDaemon {
    config: MonConfig,
    spec_hash: SpecHash,
}

/// Lifecycle provider that records what it would apply and logs it.
///
/// Service addresses are derived from the daemon index, so a new provider
/// hands out the same address for the same identity.
#[derive(Default)]
pub struct DryRunLifecycle {
    applied: RwLock<HashMap<String, AppliedDaemon>>,
    applies: AtomicU64,
    fail_applies: AtomicBool,
}

impl DryRunLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent creates fail (or succeed again).
    pub fn set_fail_applies(&self, fail: bool) {
        self.fail_applies.store(fail, Ordering::SeqCst);
    }

    /// Number of successful create-or-update calls.
    pub fn apply_count(&self) -> u64 {
        self.applies.load(Ordering::SeqCst)
    }

    /// The config last applied for a daemon.
    pub async fn applied(&self, resource_name: &str) -> Option<MonConfig> {
        self.applied
            .read()
            .await
            .get(resource_name)
            .map(|d| d.config.clone())
    }

    /// Drop a daemon as if it had vanished from the runtime.
    pub async fn forget(&self, resource_name: &str) -> bool {
        self.applied.write().await.remove(resource_name).is_some()
    }
}

#[async_trait]
impl DaemonLifecycle for DryRunLifecycle {
    async fn applied_spec_hash(&self, resource_name: &str) -> Result<Option<SpecHash>> {
        Ok(self
            .applied
            .read()
            .await
            .get(resource_name)
            .map(|d| d.spec_hash.clone()))
    }

    async fn create_or_update_daemon(&self, mon: &MonConfig, spec_hash: &SpecHash) -> Result<()> {
        if self.fail_applies.load(Ordering::SeqCst) {
            bail!("[MOCK] apply of {} rejected", mon.resource_name);
        }
        info!(
            daemon = %mon.daemon_name,
            resource = %mon.resource_name,
            endpoint = %mon.endpoint(),
            spec_hash = %spec_hash,
            "[MOCK] Applying monitor daemon"
        );
        self.applied.write().await.insert(
            mon.resource_name.clone(),
            AppliedDaemon {
                config: mon.clone(),
                spec_hash: spec_hash.clone(),
            },
        );
        self.applies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn service_address(&self, mon: &MonConfig) -> Result<String> {
        let address = u32::try_from(mon.daemon_name.index())
            .ok()
            .and_then(|index| index.checked_add(1))
            .and_then(|offset| u32::from(SERVICE_BASE).checked_add(offset))
            .filter(|raw| *raw <= u32::from(SERVICE_LAST));
        match address {
            Some(raw) => Ok(Ipv4Addr::from(raw).to_string()),
            None => bail!("[MOCK] no service address left for {}", mon.resource_name),
        }
    }

    async fn delete_daemon(&self, resource_name: &str) -> Result<()> {
        info!(resource = %resource_name, "[MOCK] Deleting monitor daemon");
        self.applied.write().await.remove(resource_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mon::config::IdentityContext;

    fn mon(id: &str) -> MonConfig {
        MonConfig::generate(id, &IdentityContext::new("rook-ceph", "")).unwrap()
    }

    #[tokio::test]
    async fn test_apply_records_hash() {
        let lifecycle = DryRunLifecycle::new();
        let hash = SpecHash::from_recorded("sha256:abc");
        let a = mon("a");

        assert!(lifecycle
            .applied_spec_hash(&a.resource_name)
            .await
            .unwrap()
            .is_none());
        lifecycle.create_or_update_daemon(&a, &hash).await.unwrap();
        assert_eq!(
            lifecycle.applied_spec_hash(&a.resource_name).await.unwrap(),
            Some(hash)
        );
        assert_eq!(lifecycle.apply_count(), 1);

        assert!(lifecycle.forget(&a.resource_name).await);
        assert!(lifecycle.applied(&a.resource_name).await.is_none());
    }

    #[tokio::test]
    async fn test_service_addresses_follow_identity() {
        let lifecycle = DryRunLifecycle::new();
        let b = lifecycle.service_address(&mon("b")).await.unwrap();
        let a = lifecycle.service_address(&mon("a")).await.unwrap();
        assert_eq!(a, "10.96.0.1");
        assert_eq!(b, "10.96.0.2");
        assert_eq!(lifecycle.service_address(&mon("a")).await.unwrap(), a);
        assert_eq!(
            lifecycle.service_address(&mon("mon255")).await.unwrap(),
            "10.96.1.0"
        );

        // A new provider, as after a process restart.
        let restarted = DryRunLifecycle::new();
        assert_eq!(restarted.service_address(&mon("d")).await.unwrap(), "10.96.0.4");
        assert_eq!(restarted.service_address(&mon("a")).await.unwrap(), a);
    }

    #[tokio::test]
    async fn test_fail_applies() {
        let lifecycle = DryRunLifecycle::new();
        lifecycle.set_fail_applies(true);
        let hash = SpecHash::from_recorded("sha256:abc");
        assert!(lifecycle
            .create_or_update_daemon(&mon("a"), &hash)
            .await
            .is_err());
        assert_eq!(lifecycle.apply_count(), 0);
    }
}
