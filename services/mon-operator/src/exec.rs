//! Command/status execution facility.
//!
//! The quorum poller asks the coordination service for its status by
//! running a status command and reading its JSON output.

use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Runs status commands.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` with `args` and return its standard output.
    async fn execute_for_status(&self, command: &str, args: &[String]) -> Result<String>;
}

/// Executor that spawns a local process.
#[derive(Debug, Default, Clone)]
pub struct ProcessExecutor;

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute_for_status(&self, command: &str, args: &[String]) -> Result<String> {
        debug!(command, ?args, "Running status command");
        let output = tokio::process::Command::new(command)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", command))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        String::from_utf8(output.stdout).with_context(|| format!("{} wrote non-UTF-8 output", command))
    }
}

type Responder = dyn Fn(u32) -> Result<String> + Send + Sync;

/// Scripted executor for tests and development.
///
/// The responder receives the 1-based call number.
pub struct MockExecutor {
    responder: Box<Responder>,
    calls: AtomicU32,
}

impl MockExecutor {
    /// Create an executor that answers with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(u32) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicU32::new(0),
        }
    }

    /// Create an executor that always returns `output`.
    pub fn always(output: impl Into<String>) -> Self {
        let output = output.into();
        Self::new(move |_| Ok(output.clone()))
    }

    /// Create an executor whose every call fails.
    pub fn failing() -> Self {
        Self::new(|call| Err(anyhow!("[MOCK] status call {} refused", call)))
    }

    /// Number of calls observed.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn execute_for_status(&self, command: &str, args: &[String]) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(command, ?args, call, "[MOCK] Running status command");
        (self.responder)(call)
    }
}
