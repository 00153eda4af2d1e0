pub mod cache;
pub mod config_cmd;
pub mod decide;
pub mod history;

use siteshift_config::{AppConfig, ConfigError};
use siteshift_core::KeyValueStore;
use siteshift_memory::{FileStore, InMemoryStore};
use std::path::Path;
use std::sync::Arc;

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides();
            Ok(config)
        }
        None => AppConfig::load(),
    }
}

/// The key-value store selected by `[storage]`.
pub fn open_store(config: &AppConfig) -> Arc<dyn KeyValueStore> {
    match config.storage.backend.as_str() {
        "memory" => Arc::new(InMemoryStore::new()),
        _ => Arc::new(FileStore::new(config.storage.resolved_path())),
    }
}
