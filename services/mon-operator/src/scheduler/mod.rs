//! Monitor placement.
//!
//! The scheduler is responsible for:
//! - Scanning node inventory into per-zone candidate lists
//! - Choosing a node for each monitor that has none yet
//! - Driving periodic reconciliation passes

pub mod placement;
pub mod usage;
mod worker;

pub use placement::schedule_monitor;
pub use usage::{node_is_valid, scan_node_usage, NodeUsage};
pub use worker::ClusterWorker;
