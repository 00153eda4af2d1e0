//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use siteshift_core::error::StorageError;
use siteshift_core::store::KeyValueStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A key-value store held in a sorted map.
/// Keys enumerate in lexicographic order.
#[derive(Clone)]
pub struct InMemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.keys().nth(index).cloned())
    }

    async fn len(&self) -> Result<usize, StorageError> {
        Ok(self.entries.read().await.len())
    }
}
