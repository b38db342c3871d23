//! Monitor cluster orchestration.
//!
//! - [`config`]: identity generation for a daemon identifier
//! - [`mapping`]: node/port assignments and their persisted record
//! - [`cluster_info`]: known monitors and endpoints
//! - [`quorum`]: quorum verification
//! - [`cluster`]: the reconciliation pass tying them together

pub mod cluster;
pub mod cluster_info;
pub mod config;
pub mod mapping;
pub mod quorum;
pub mod spec;

pub use cluster::{Collaborators, Orchestrator, OrchestratorSettings, QuorumCheck, StartOutcome};
pub use cluster_info::{ClusterInfo, MonInfo};
pub use config::{IdentityContext, MonConfig};
pub use mapping::{Mapping, NodeInfo};
pub use spec::ClusterSpec;
