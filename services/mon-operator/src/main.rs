//! monplane monitor operator
//!
//! Keeps one monitor cluster at its desired size. Every pass places missing
//! monitors, repairs drifted ones and verifies quorum.
//!
//! - **Store**: SQLite database under the data directory
//! - **Inventory**: JSON node list, re-read each pass
//! - **Lifecycle**: dry run; logs the daemons it would apply
//! - **Status**: runs the coordination service's status command

use std::sync::Arc;

use anyhow::{Context, Result};
use monplane_operator::config::Config;
use monplane_operator::exec::ProcessExecutor;
use monplane_operator::inventory::FileInventory;
use monplane_operator::lifecycle::DryRunLifecycle;
use monplane_operator::mon::{Collaborators, Orchestrator, OrchestratorSettings};
use monplane_operator::scheduler::ClusterWorker;
use monplane_operator::store::SqliteStore;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        cluster = %config.cluster_name,
        data_dir = %config.data_dir.display(),
        node_inventory = %config.node_inventory.display(),
        mon_count = config.mon_count,
        host_network = config.host_network,
        "Starting monitor operator"
    );

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;
    let store = SqliteStore::open(config.state_db_path())
        .with_context(|| format!("opening state database {}", config.state_db_path().display()))?;

    let collaborators = Collaborators {
        store: Arc::new(store),
        inventory: Arc::new(FileInventory::new(config.node_inventory.clone())),
        lifecycle: Arc::new(DryRunLifecycle::new()),
        executor: Arc::new(ProcessExecutor),
    };
    let settings = OrchestratorSettings {
        resource_prefix: config.cluster_name.clone(),
        quorum: config.quorum_wait(),
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(config.cluster_name.clone(), collaborators, settings);
    let worker = ClusterWorker::new(
        orchestrator,
        config.cluster_spec(),
        config.mon_version.clone(),
        config.reconcile_interval(),
    );

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker_handle = tokio::spawn(worker.run(shutdown_rx));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = &mut worker_handle => {
            if let Err(e) = result {
                error!(error = %e, "Cluster worker panicked");
            }
            return Ok(());
        }
    }

    let _ = shutdown_tx.send(true);
    info!("Waiting for cluster worker to shut down...");
    if let Err(e) = worker_handle.await {
        error!(error = %e, "Cluster worker panicked");
    }

    info!("Monitor operator shutdown complete");
    Ok(())
}
