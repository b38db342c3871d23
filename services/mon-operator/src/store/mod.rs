//! Durable key-value configuration store.
//!
//! A record is a named flat `string -> string` map. Saving a record
//! replaces it as a whole, so every key in one record lands together.
//!
//! Two implementations are provided:
//! - [`SqliteStore`]: SQLite-backed, survives orchestrator restarts
//! - [`MemoryStore`]: in-process, for tests and embedding callers

mod memory;
mod sqlite;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A stored record.
pub type Record = BTreeMap<String, String>;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable configuration store.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Replace the record stored under `key`.
    async fn save(&self, key: &str, data: &Record) -> Result<(), StoreError>;

    /// Load the record stored under `key`, if any.
    async fn load(&self, key: &str) -> Result<Option<Record>, StoreError>;
}
