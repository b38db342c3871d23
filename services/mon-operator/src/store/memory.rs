//! In-memory configuration store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ConfigStore, Record, StoreError};

/// In-memory store with write-failure injection.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Record>>,
    saves: AtomicU64,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Direct view of a record, bypassing the trait.
    pub async fn get(&self, key: &str) -> Option<Record> {
        self.records.read().await.get(key).cloned()
    }

    /// Seed a record without counting it as a save.
    pub async fn insert(&self, key: &str, data: Record) {
        self.records.write().await.insert(key.to_string(), data);
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn save(&self, key: &str, data: &Record) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "write to '{}' rejected",
                key
            )));
        }
        self.records
            .write()
            .await
            .insert(key.to_string(), data.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_save_load() {
        let store = MemoryStore::new();
        assert!(store.load("cfg").await.unwrap().is_none());

        let mut data = Record::new();
        data.insert("k".to_string(), "v".to_string());
        store.save("cfg", &data).await.unwrap();

        assert_eq!(store.load("cfg").await.unwrap(), Some(data));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_fail_writes() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let err = store.save("cfg", &Record::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.get("cfg").await.is_none());

        store.set_fail_writes(false);
        store.save("cfg", &Record::new()).await.unwrap();
        assert!(store.get("cfg").await.is_some());
    }
}
