//! Quorum verification.
//!
//! The poller runs the coordination service's status command until every
//! required monitor reports itself in quorum or the deadline passes. A
//! failed tick is expected while monitors bootstrap, so it is logged and
//! retried. Only the deadline is fatal.

use std::time::Duration;

use monplane_reconcile::{
    Observation, PollState, ReconcileError, DEFAULT_CALL_TIMEOUT, DEFAULT_POLL_INTERVAL,
    DEFAULT_POLL_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::error::{MonError, MonResult};
use crate::exec::CommandExecutor;

/// One monitor as listed in the status response's monitor map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonMapEntry {
    pub name: String,
    pub rank: i32,
    #[serde(default)]
    pub addr: String,
}

/// The monitor map section of a status response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonMap {
    #[serde(default)]
    pub mons: Vec<MonMapEntry>,
}

/// Status response of the coordination service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonStatusResponse {
    /// Ranks currently in quorum.
    #[serde(default)]
    pub quorum: Vec<i32>,
    #[serde(rename = "monmap", default)]
    pub mon_map: MonMap,
}

impl MonStatusResponse {
    /// A response in which every named monitor holds a rank in quorum.
    pub fn in_quorum<S: AsRef<str>>(names: &[S]) -> Self {
        let mons: Vec<MonMapEntry> = names
            .iter()
            .zip(0..)
            .map(|(name, rank)| MonMapEntry {
                name: name.as_ref().to_string(),
                rank,
                addr: String::new(),
            })
            .collect();
        Self {
            quorum: mons.iter().map(|m| m.rank).collect(),
            mon_map: MonMap { mons },
        }
    }

    /// Names of the monitors whose rank is in quorum.
    pub fn members(&self) -> Vec<String> {
        self.mon_map
            .mons
            .iter()
            .filter(|m| mon_in_quorum(m, &self.quorum))
            .map(|m| m.name.clone())
            .collect()
    }
}

/// Returns true if the monitor's rank is in the quorum rank set.
pub fn mon_in_quorum(entry: &MonMapEntry, quorum: &[i32]) -> bool {
    quorum.contains(&entry.rank)
}

/// Returns true if the named monitor is listed and its rank is in quorum.
pub fn mon_found_in_quorum(name: &str, response: &MonStatusResponse) -> bool {
    response
        .mon_map
        .mons
        .iter()
        .any(|m| m.name == name && mon_in_quorum(m, &response.quorum))
}

/// Poll timing and acceptance policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumWait {
    /// Delay between ticks. Zero is allowed.
    pub interval: Duration,
    /// Total deadline.
    pub timeout: Duration,
    /// Bound on a single status call.
    pub call_timeout: Duration,
    /// Require every expected monitor to be in quorum. Otherwise any
    /// successful status response is accepted.
    pub require_all: bool,
}

impl Default for QuorumWait {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            require_all: false,
        }
    }
}

/// Successful quorum confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumReport {
    /// Status calls made, including the successful one.
    pub attempts: u32,
    /// Monitors reported in quorum by the successful response.
    pub members: Vec<String>,
}

/// Status command and arguments for a cluster.
pub fn status_command(cluster: &str) -> (&'static str, Vec<String>) {
    (
        "ceph",
        ["mon_status", "--cluster", cluster, "--format", "json"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    )
}

/// Wait until the expected monitors form quorum.
///
/// At least one status call is always made, even with a zero timeout.
#[instrument(skip(executor, expected, wait), fields(expected_count = expected.len(), require_all = wait.require_all))]
pub async fn wait_for_quorum(
    executor: &dyn CommandExecutor,
    cluster: &str,
    expected: &[String],
    wait: &QuorumWait,
) -> MonResult<QuorumReport> {
    let (command, args) = status_command(cluster);
    let started = Instant::now();
    let mut state = PollState::new(wait.timeout);
    let mut members = Vec::new();

    loop {
        members.clear();
        let observation =
            match tokio::time::timeout(wait.call_timeout, executor.execute_for_status(command, &args))
                .await
            {
                Err(_) => {
                    debug!(attempt = state.attempts() + 1, "Status call timed out");
                    Observation::Unreachable
                }
                Ok(Err(e)) => {
                    debug!(attempt = state.attempts() + 1, error = %format!("{:#}", e), "Status call failed");
                    Observation::Unreachable
                }
                Ok(Ok(output)) => match serde_json::from_str::<MonStatusResponse>(&output) {
                    Err(e) => {
                        debug!(attempt = state.attempts() + 1, error = %e, "Unreadable status response");
                        Observation::Unreachable
                    }
                    Ok(response) => {
                        members = response.members();
                        let missing: Vec<&String> = expected
                            .iter()
                            .filter(|name| !mon_found_in_quorum(name, &response))
                            .collect();
                        if !wait.require_all || missing.is_empty() {
                            Observation::Ready
                        } else {
                            debug!(?missing, "Monitors not yet in quorum");
                            Observation::NotReady
                        }
                    }
                },
            };

        if state.observe(observation, started.elapsed()).is_terminal() {
            break;
        }
        tokio::time::sleep(wait.interval.min(state.remaining())).await;
    }

    match state.finish("quorum") {
        Ok(attempts) => {
            info!(
                attempts,
                unreachable = state.unreachable(),
                ?members,
                "Monitors in quorum"
            );
            Ok(QuorumReport { attempts, members })
        }
        Err(ReconcileError::Timeout {
            elapsed, attempts, ..
        }) => {
            debug!(
                attempts,
                unreachable = state.unreachable(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Quorum wait timed out"
            );
            Err(MonError::QuorumTimeout {
                expected: expected.to_vec(),
                elapsed,
                attempts,
            })
        }
        Err(e) => Err(MonError::Internal(e.to_string())),
    }
}
