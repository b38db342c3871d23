//! Error taxonomy for monitor orchestration.

use std::time::Duration;

use monplane_id::IdError;
use thiserror::Error;

use crate::store::StoreError;

/// Result type for orchestration operations.
pub type MonResult<T> = Result<T, MonError>;

/// Errors surfaced by the orchestrator and its components.
#[derive(Debug, Error)]
pub enum MonError {
    /// A daemon identifier matched neither naming scheme.
    #[error("invalid monitor identifier '{id}': {source}")]
    InvalidIdentifier {
        id: String,
        #[source]
        source: IdError,
    },

    /// The scheduler found no eligible node for a daemon.
    #[error("no schedulable nodes available for monitor {daemon}")]
    NoSchedulableNodes { daemon: String },

    /// Monitors did not confirm quorum before the deadline.
    #[error("monitors {expected:?} did not form quorum after {elapsed:?} ({attempts} attempts)")]
    QuorumTimeout {
        expected: Vec<String>,
        elapsed: Duration,
        attempts: u32,
    },

    /// The durable store rejected a read or write.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    /// A persisted record could not be decoded.
    #[error("corrupt persisted state under '{key}': {message}")]
    CorruptState { key: String, message: String },

    /// The daemon lifecycle provider rejected a create or update.
    #[error("failed to create monitor {daemon}: {message}")]
    DaemonCreation { daemon: String, message: String },

    /// The daemon lifecycle provider rejected a delete.
    #[error("failed to remove monitor {daemon}: {message}")]
    DaemonRemoval { daemon: String, message: String },

    /// The node inventory could not be listed.
    #[error("failed to list nodes: {0}")]
    Inventory(String),

    /// The requested cluster spec can not be satisfied.
    #[error("invalid cluster spec: {0}")]
    InvalidSpec(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MonError {
    /// Short, stable reason code for status reporting.
    pub fn reason_code(&self) -> &'static str {
        match self {
            MonError::InvalidIdentifier { .. } => "invalid_identifier",
            MonError::NoSchedulableNodes { .. } => "no_schedulable_nodes",
            MonError::QuorumTimeout { .. } => "quorum_timeout",
            MonError::Persistence(_) | MonError::CorruptState { .. } => "persistence_failure",
            MonError::DaemonCreation { .. } => "daemon_creation_failure",
            MonError::DaemonRemoval { .. } => "daemon_removal_failure",
            MonError::Inventory(_) => "inventory_failure",
            MonError::InvalidSpec(_) => "invalid_spec",
            MonError::Internal(_) => "internal",
        }
    }

    /// Returns true when already-running monitors are unaffected and the
    /// cluster may keep serving.
    pub fn is_cluster_available(&self) -> bool {
        matches!(
            self,
            MonError::NoSchedulableNodes { .. }
                | MonError::QuorumTimeout { .. }
                | MonError::InvalidIdentifier { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        let err = MonError::NoSchedulableNodes {
            daemon: "a".to_string(),
        };
        assert_eq!(err.reason_code(), "no_schedulable_nodes");
        assert!(err.is_cluster_available());

        let err = MonError::CorruptState {
            key: "mapping".to_string(),
            message: "eof".to_string(),
        };
        assert_eq!(err.reason_code(), "persistence_failure");
        assert!(!err.is_cluster_available());
    }
}
