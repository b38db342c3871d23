//! Reconciliation loop primitives.
//!
//! This library provides the building blocks shared by the monitor
//! orchestrator's control loop:
//!
//! - **Poll state machine**: a pure POLLING/SUCCEEDED/TIMED_OUT machine
//!   driven by observations and elapsed time, independent of any clock.
//! - **Spec hash**: a deterministic digest of a daemon's desired spec,
//!   used to decide whether an applied daemon is already current.
//! - **Convergence status**: the summary a reconciliation pass reports.
//!
//! # Invariants
//!
//! - Transitions are deterministic given the same inputs
//! - Terminal poll phases are absorbing
//! - Hashes are independent of JSON key order

pub mod poll;

use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use poll::{Observation, PollPhase, PollState};

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Timeout waiting for convergence.
    #[error("timeout after {elapsed:?} ({attempts} attempts) waiting for {resource}")]
    Timeout {
        resource: String,
        elapsed: Duration,
        attempts: u32,
    },

    /// A value could not be hashed.
    #[error("failed to hash spec: {0}")]
    Hash(#[from] serde_json::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convergence status for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// Resource has converged (current matches desired).
    Converged,

    /// Resource is converging (current is moving toward desired).
    Converging,

    /// Resource has diverged (requires intervention).
    Diverged,
}

impl ConvergenceStatus {
    /// Returns true if the resource has converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Returns true if the resource is still converging.
    pub fn is_converging(&self) -> bool {
        matches!(self, Self::Converging)
    }
}

/// A spec hash for deterministic comparison.
///
/// Used to detect when a daemon's desired configuration has changed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecHash(String);

impl SpecHash {
    /// Compute a spec hash from canonical JSON.
    pub fn from_json(json: &serde_json::Value) -> Self {
        let canonical = canonical_json(json);
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let result = hasher.finalize();
        Self(format!("sha256:{}", hex::encode(&result[..16])))
    }

    /// Compute a spec hash for any serializable value.
    pub fn of<T: Serialize>(value: &T) -> Result<Self, ReconcileError> {
        let json = serde_json::to_value(value)?;
        Ok(Self::from_json(&json))
    }

    /// Wrap a previously recorded hash string.
    pub fn from_recorded(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the hash string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SpecHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Produce canonical JSON (sorted keys, no extra whitespace).
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let inner: Vec<String> = pairs
                .iter()
                .map(|(k, v)| {
                    // Keys are plain strings, so serde_json's escaping is canonical.
                    let key = serde_json::Value::String((*k).clone()).to_string();
                    format!("{}:{}", key, canonical_json(v))
                })
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        serde_json::Value::Array(arr) => {
            let inner: Vec<String> = arr.iter().map(canonical_json).collect();
            format!("[{}]", inner.join(","))
        }
        other => other.to_string(),
    }
}

/// Default interval between reconciliation passes.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Default interval between quorum polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default total time to wait for quorum.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default bound on a single status query.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_hash_deterministic() {
        let json1 = serde_json::json!({"b": 2, "a": {"y": [1, 2], "x": "q\"uote"}});
        let json2 = serde_json::json!({"a": {"x": "q\"uote", "y": [1, 2]}, "b": 2});

        let hash1 = SpecHash::from_json(&json1);
        let hash2 = SpecHash::from_json(&json2);

        assert_eq!(hash1, hash2);
        assert!(hash1.as_str().starts_with("sha256:"));
    }

    #[test]
    fn test_spec_hash_detects_change() {
        #[derive(Serialize)]
        struct Spec {
            port: u16,
        }

        let a = SpecHash::of(&Spec { port: 6789 }).unwrap();
        let b = SpecHash::of(&Spec { port: 6790 }).unwrap();
        assert_ne!(a, b);
        assert_eq!(SpecHash::from_recorded(a.as_str()), a);
    }

    #[test]
    fn test_convergence_status() {
        assert!(ConvergenceStatus::Converged.is_converged());
        assert!(ConvergenceStatus::Converging.is_converging());
        assert!(!ConvergenceStatus::Diverged.is_converged());
    }
}
