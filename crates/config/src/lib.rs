//! Configuration loading, validation, and management for siteshift.
//!
//! Loads configuration from `~/.siteshift/config.toml` with environment
//! variable overrides, and normalizes caller-supplied AI settings into a
//! [`siteshift_core::ModelConfig`].

pub mod model;

pub use model::RawModelConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.siteshift/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// AI decision settings
    #[serde(default)]
    pub ai: RawModelConfig,

    /// Where history and cache live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Deterministic engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Declarative custom rules, evaluated in order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Redact a secret string for Debug output.
pub(crate) fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "memory" or "file"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// File path for the "file" backend (defaults to `~/.siteshift/state.json`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_storage_backend() -> String {
    "file".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

impl StorageConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("state.json"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pick a random variant for visitors with no UTM and no referrer
    #[serde(default = "default_true")]
    pub random_fallback: bool,

    /// Record deterministic decisions in the visit history
    #[serde(default = "default_true")]
    pub record_history: bool,

    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,

    #[serde(default = "default_history_decay")]
    pub history_decay: f64,
}

fn default_true() -> bool {
    true
}
fn default_max_history_size() -> usize {
    50
}
fn default_history_decay() -> f64 {
    0.9
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            random_fallback: true,
            record_history: true,
            max_history_size: default_max_history_size(),
            history_decay: default_history_decay(),
        }
    }
}

/// A declarative custom rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Unique name; doubles as the intent when `intent` is absent
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    /// Every present field must match (case-insensitive)
    #[serde(default)]
    pub when: RuleCondition,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_campaign_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_category: Option<String>,
    /// "mobile", "tablet" or "desktop"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl RuleCondition {
    pub fn is_empty(&self) -> bool {
        self.utm_source.is_none()
            && self.utm_medium.is_none()
            && self.utm_campaign_contains.is_none()
            && self.referrer_source.is_none()
            && self.referrer_category.is_none()
            && self.device.is_none()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.siteshift/config.toml).
    ///
    /// Also checks environment variables:
    /// - `SITESHIFT_API_KEY` / `OPENAI_API_KEY` (only when no key is configured)
    /// - `SITESHIFT_PROXY_URL`
    /// - `SITESHIFT_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Fill credentials and model from the environment.
    pub fn apply_env_overrides(&mut self) {
        if self.ai.api_key.is_none() {
            self.ai.api_key = std::env::var("SITESHIFT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("SITESHIFT_PROXY_URL") {
            self.ai.proxy_url = Some(url);
        }

        if let Ok(model) = std::env::var("SITESHIFT_MODEL") {
            self.ai.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".siteshift")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ai.temperature < 0.0 || self.ai.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "ai.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(self.engine.history_decay > 0.0 && self.engine.history_decay <= 1.0) {
            return Err(ConfigError::ValidationError(
                "engine.history_decay must be in (0, 1]".into(),
            ));
        }

        if !matches!(self.storage.backend.as_str(), "memory" | "file") {
            return Err(ConfigError::ValidationError(format!(
                "unknown storage backend '{}'",
                self.storage.backend
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("AI mode cannot run: {0}")]
    MissingCredentials(String),
}

impl From<ConfigError> for siteshift_core::Error {
    fn from(err: ConfigError) -> Self {
        siteshift_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.ai.enabled);
        assert!(config.engine.random_fallback);
        assert_eq!(config.storage.backend, "file");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.ai.model, config.ai.model);
        assert_eq!(parsed.engine.max_history_size, config.engine.max_history_size);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().ai.model, "gpt-4o-mini");
    }

    #[test]
    fn loads_rules_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[ai]
enabled = true
proxyUrl = "https://proxy.example/ai"
mode = "generate"

[storage]
backend = "memory"

[[rules]]
name = "newsletter"
intent = "professional"
[rules.when]
utm_medium = "email"

[[rules]]
name = "gaming"
[rules.when]
referrer_source = "twitch"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(config.ai.enabled);
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].intent.as_deref(), Some("professional"));
        assert_eq!(config.rules[1].when.referrer_source.as_deref(), Some("twitch"));
        assert!(config.ai.normalize().unwrap().connection.is_proxy());
    }

    #[test]
    fn duplicate_rule_names_rejected() {
        let config = AppConfig {
            rules: vec![
                RuleConfig { name: "a".into(), intent: None, when: RuleCondition::default() },
                RuleConfig { name: "a".into(), intent: None, when: RuleCondition::default() },
            ],
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn unknown_backend_rejected() {
        let config = AppConfig {
            storage: StorageConfig { backend: "redis".into(), path: None },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("random_fallback"));
    }

    #[test]
    fn config_error_converts_to_core_error() {
        let err: siteshift_core::Error = ConfigError::MissingCredentials("no key".into()).into();
        assert!(matches!(err, siteshift_core::Error::Config { .. }));
    }
}
