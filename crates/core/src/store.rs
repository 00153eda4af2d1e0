//! Key-value store trait — the persistence contract for history and cache.
//!
//! Mirrors a browser's local storage: string keys, JSON-encoded string values,
//! enumerable by index. Callers treat every failure as "storage unavailable".

use crate::error::StorageError;
use async_trait::async_trait;

/// The core KeyValueStore trait.
///
/// Implementations: in-memory, JSON file, no-op (storage disabled).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// The backend name (e.g., "memory", "file", "none").
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> std::result::Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: String) -> std::result::Result<(), StorageError>;

    async fn remove(&self, key: &str) -> std::result::Result<(), StorageError>;

    /// The key at `index` in the store's enumeration order.
    async fn key(&self, index: usize) -> std::result::Result<Option<String>, StorageError>;

    /// Number of stored keys.
    async fn len(&self) -> std::result::Result<usize, StorageError>;

    async fn is_empty(&self) -> std::result::Result<bool, StorageError> {
        Ok(self.len().await? == 0)
    }

    /// Snapshot of all keys, built from index access.
    async fn keys(&self) -> std::result::Result<Vec<String>, StorageError> {
        let len = self.len().await?;
        let mut keys = Vec::with_capacity(len);
        for index in 0..len {
            if let Some(key) = self.key(index).await? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
