//! No-op store — models a browser with storage disabled.

use async_trait::async_trait;
use siteshift_core::error::StorageError;
use siteshift_core::store::KeyValueStore;

/// A store whose every operation fails with [`StorageError::Unavailable`].
pub struct NoopStore;

fn unavailable() -> StorageError {
    StorageError::Unavailable("storage disabled".into())
}

#[async_trait]
impl KeyValueStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(unavailable())
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
        Err(unavailable())
    }

    async fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(unavailable())
    }

    async fn key(&self, _index: usize) -> Result<Option<String>, StorageError> {
        Err(unavailable())
    }

    async fn len(&self) -> Result<usize, StorageError> {
        Err(unavailable())
    }
}
