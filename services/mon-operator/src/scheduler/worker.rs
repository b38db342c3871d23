//! Cluster background worker.
//!
//! Runs reconciliation passes for one cluster on a periodic interval.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::error::MonResult;
use crate::mon::cluster::{Orchestrator, StartOutcome};
use crate::mon::spec::ClusterSpec;

/// Worker that drives an orchestrator until shutdown.
pub struct ClusterWorker {
    orchestrator: Orchestrator,
    spec: ClusterSpec,
    version: String,
    interval: Duration,
}

impl ClusterWorker {
    /// Create a new cluster worker.
    pub fn new(
        orchestrator: Orchestrator,
        spec: ClusterSpec,
        version: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            spec,
            version: version.into(),
            interval,
        }
    }

    /// Run passes until shutdown is signaled. The first pass starts
    /// immediately.
    #[instrument(skip(self, shutdown), fields(cluster = %self.orchestrator.cluster_name()))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting cluster worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Outcomes are logged by the pass itself.
                    let _ = self.run_pass().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Cluster worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run a single reconciliation pass and log its outcome.
    pub async fn run_pass(&mut self) -> MonResult<StartOutcome> {
        let result = self
            .orchestrator
            .start(None, &self.version, &self.spec)
            .await;

        match &result {
            Ok(outcome) => {
                if !outcome.created.is_empty() || !outcome.updated.is_empty() {
                    info!(
                        created = ?outcome.created,
                        updated = ?outcome.updated,
                        status = ?outcome.status(),
                        "Cluster reconciliation complete"
                    );
                }
            }
            Err(e) if e.is_cluster_available() => {
                warn!(reason = e.reason_code(), error = %e, "Cluster reconciliation incomplete");
            }
            Err(e) => {
                error!(reason = e.reason_code(), error = %e, "Cluster reconciliation failed");
            }
        }

        result
    }
}
