//! SQLite-based configuration store.
//!
//! Each record is one row holding the JSON-encoded map, so a save is a
//! single statement and either fully lands or not at all.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{ConfigStore, Record, StoreError};

/// SQLite configuration store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS config_records (
                name TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        debug!("Config store schema initialized");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        f(&conn)
    }

    /// Last update time of a record (Unix seconds).
    pub fn updated_at(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT updated_at FROM config_records WHERE name = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })
    }
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn save(&self, key: &str, data: &Record) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(data)?;
        let now = chrono::Utc::now().timestamp();
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO config_records (name, data, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(name) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at
                "#,
                params![key, encoded, now],
            )?;
            Ok(())
        })
    }

    async fn load(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let raw: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT data FROM config_records WHERE name = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}
