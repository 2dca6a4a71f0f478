use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::credentials::CredentialStore;
use crate::schedule_cache::ScheduleCache;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persistent string key/value store with the semantics of browser local
/// storage: whole values are read and replaced, nothing is cached in memory.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// Aggregates the persisted stores behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
    pub credentials: CredentialStore,
    pub schedules: Arc<ScheduleCache>,
}

impl Storage {
    /// Build the credential and schedule stores on top of one key/value backend.
    #[must_use]
    pub fn from_kv(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            credentials: CredentialStore::new(Arc::clone(&kv)),
            schedules: Arc::new(ScheduleCache::new(Arc::clone(&kv))),
            kv,
        }
    }

    /// Rebuild the schedule cache with a different entry lifetime.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.schedules = Arc::new(ScheduleCache::new(Arc::clone(&self.kv)).with_ttl(ttl));
        self
    }

    #[must_use]
    pub fn in_memory() -> Self {
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        Self::from_kv(kv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_replaces_and_removes() {
        let store = InMemoryKeyValueStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "one").await.unwrap();
        store.set("k", "two").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryKeyValueStore::new();
        let other = store.clone();
        store.set("token", "abc").await.unwrap();
        assert_eq!(other.get("token").await.unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn cache_ttl_override_shares_the_backend() {
        let storage = Storage::in_memory();
        let tuned = storage.clone().with_cache_ttl(chrono::Duration::days(3));
        assert_eq!(tuned.schedules.ttl(), chrono::Duration::days(3));
        assert_eq!(storage.schedules.ttl(), chrono::Duration::days(crate::DEFAULT_CACHE_TTL_DAYS));

        tuned.kv.set("shared", "yes").await.unwrap();
        assert_eq!(storage.kv.get("shared").await.unwrap().as_deref(), Some("yes"));
    }
}
