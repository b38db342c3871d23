//! Poll state machine.
//!
//! A poll starts in [`PollPhase::Polling`] and ends in exactly one of
//! [`PollPhase::Succeeded`] or [`PollPhase::TimedOut`]. The machine never
//! sleeps or reads a clock: callers feed it an [`Observation`] together
//! with the time elapsed since the poll began.

use std::time::Duration;

use crate::ReconcileError;

/// Phase of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Still waiting; the caller should tick again after its interval.
    Polling,

    /// The awaited condition was observed.
    Succeeded,

    /// The deadline passed without the condition being observed.
    TimedOut,
}

impl PollPhase {
    /// Returns true for `Succeeded` and `TimedOut`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Polling)
    }
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The target could not be reached. Expected while daemons bootstrap.
    Unreachable,

    /// The target answered but the condition does not hold yet.
    NotReady,

    /// The condition holds.
    Ready,
}

/// Pure transition function.
///
/// Terminal phases are absorbing. A `Ready` observation always wins, even
/// when it arrives at or after the deadline.
pub fn transition(
    phase: PollPhase,
    observation: Observation,
    elapsed: Duration,
    timeout: Duration,
) -> PollPhase {
    if phase.is_terminal() {
        return phase;
    }
    match observation {
        Observation::Ready => PollPhase::Succeeded,
        Observation::Unreachable | Observation::NotReady if elapsed >= timeout => {
            PollPhase::TimedOut
        }
        Observation::Unreachable | Observation::NotReady => PollPhase::Polling,
    }
}

/// Bookkeeping around [`transition`].
#[derive(Debug, Clone)]
pub struct PollState {
    phase: PollPhase,
    timeout: Duration,
    attempts: u32,
    unreachable: u32,
    elapsed: Duration,
}

impl PollState {
    /// Start a poll with the given total timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            phase: PollPhase::Polling,
            timeout,
            attempts: 0,
            unreachable: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Record one tick and return the new phase.
    ///
    /// Observations fed after a terminal phase are ignored and not counted.
    pub fn observe(&mut self, observation: Observation, elapsed: Duration) -> PollPhase {
        if self.phase.is_terminal() {
            return self.phase;
        }
        self.attempts += 1;
        if observation == Observation::Unreachable {
            self.unreachable += 1;
        }
        self.elapsed = elapsed;
        self.phase = transition(self.phase, observation, elapsed, self.timeout);
        self.phase
    }

    /// Current phase.
    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Number of ticks observed.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Number of ticks that could not reach the target.
    pub fn unreachable(&self) -> u32 {
        self.unreachable
    }

    /// Time remaining before the deadline, as of the last observation.
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.elapsed)
    }

    /// Convert a terminal state into a result.
    ///
    /// `Ok` carries the number of attempts it took to succeed.
    pub fn finish(&self, resource: &str) -> Result<u32, ReconcileError> {
        match self.phase {
            PollPhase::Succeeded => Ok(self.attempts),
            PollPhase::TimedOut => Err(ReconcileError::Timeout {
                resource: resource.to_string(),
                elapsed: self.elapsed,
                attempts: self.attempts,
            }),
            PollPhase::Polling => Err(ReconcileError::Internal(format!(
                "poll for {} finished while still polling",
                resource
            ))),
        }
    }
}
