//! Monitor quorum orchestrator.
//!
//! Decides how many monitor daemons must exist, places each on a node
//! (spreading across failure domains first), keeps every daemon's network
//! identity durable across restarts, and waits for the daemons to form
//! quorum before reporting the cluster usable.
//!
//! ## Architecture
//!
//! - **Identity**: [`mon::config`] derives a daemon's config from its id
//! - **Mapping**: [`mon::mapping`] holds node/port assignments, persisted
//!   through a [`store::ConfigStore`]
//! - **Scheduler**: [`scheduler`] scans nodes and picks a placement
//! - **Quorum**: [`mon::quorum`] polls status through an [`exec::CommandExecutor`]
//! - **Orchestrator**: [`mon::cluster`] runs the reconciliation pass
//!
//! Daemon creation and node inventory are external, behind the
//! [`lifecycle::DaemonLifecycle`] and [`inventory::NodeInventory`] traits.

pub mod config;
pub mod error;
pub mod exec;
pub mod inventory;
pub mod lifecycle;
pub mod mon;
pub mod scheduler;
pub mod store;

pub use error::{MonError, MonResult};
