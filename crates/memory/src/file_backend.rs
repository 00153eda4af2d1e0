//! File-based store — a single JSON object on disk.
//!
//! Storage location: `~/.siteshift/state.json` by default.
//!
//! The whole map is loaded on creation and flushed on every mutation, which
//! gives fast reads with durable writes. Suitable for the CLI and for
//! single-process deployments.

use async_trait::async_trait;
use siteshift_core::error::StorageError;
use siteshift_core::store::KeyValueStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed key-value store.
pub struct FileStore {
    path: PathBuf,
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl FileStore {
    /// Create a store at the given path.
    ///
    /// If the file exists, entries are loaded from it. A missing file starts
    /// empty (created on first write); an unreadable one is logged and
    /// replaced on the next write.
    pub fn new(path: PathBuf) -> Self {
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "File store loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return BTreeMap::new(), // File doesn't exist yet — start empty
        };

        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupted state file");
                BTreeMap::new()
            }
        }
    }

    /// Flush all entries to disk.
    async fn flush(&self) -> Result<(), StorageError> {
        let entries = self.entries.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Write(format!("Failed to create state directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(&*entries)
            .map_err(|e| StorageError::Write(format!("Failed to serialize state: {e}")))?;

        std::fs::write(&self.path, content)
            .map_err(|e| StorageError::Write(format!("Failed to write state file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.write().await.insert(key.to_string(), value);
        self.flush().await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = self.entries.write().await.remove(key).is_some();
        if removed {
            self.flush().await?;
        }
        Ok(())
    }

    async fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.keys().nth(index).cloned())
    }

    async fn len(&self) -> Result<usize, StorageError> {
        Ok(self.entries.read().await.len())
    }
}
