//! Raw model configuration as supplied by callers, and its normalization.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use siteshift_core::gateway::{BrandProfile, Connection, Mode, ModelConfig};
use siteshift_core::history::HistoryLimits;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Caller-facing AI configuration. Every field is optional on the wire.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawModelConfig {
    /// Whether the AI path runs at all
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Takes precedence over `api_key` when both are set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Retry 4xx responses (other than 429) like any other failure
    #[serde(default = "default_true")]
    pub retry_client_errors: bool,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    #[serde(default = "default_true")]
    pub enable_history: bool,

    #[serde(default = "default_history_decay")]
    pub history_decay: f64,

    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,

    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default = "default_true")]
    pub fallback_to_standard: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_override: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_profile: Option<BrandProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_template: Option<String>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    500
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_cache_ttl_ms() -> u64 {
    3_600_000
}
fn default_history_decay() -> f64 {
    0.9
}
fn default_max_history_size() -> usize {
    50
}
fn default_history_window() -> usize {
    10
}
fn default_true() -> bool {
    true
}

impl Default for RawModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            proxy_url: None,
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_client_errors: true,
            cache_enabled: true,
            cache_ttl_ms: default_cache_ttl_ms(),
            enable_history: true,
            history_decay: default_history_decay(),
            max_history_size: default_max_history_size(),
            history_window: default_history_window(),
            mode: Mode::default(),
            fallback_to_standard: true,
            prompt_override: None,
            brand_profile: None,
            reference_template: None,
        }
    }
}

impl std::fmt::Debug for RawModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawModelConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &crate::redact(&self.api_key))
            .field("proxy_url", &self.proxy_url)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("cache_enabled", &self.cache_enabled)
            .field("cache_ttl_ms", &self.cache_ttl_ms)
            .field("enable_history", &self.enable_history)
            .field("history_decay", &self.history_decay)
            .field("mode", &self.mode)
            .field("fallback_to_standard", &self.fallback_to_standard)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl RawModelConfig {
    /// Resolve the connection mode and validate ranges.
    ///
    /// Missing credentials fail fast: AI mode cannot run without either a
    /// proxy URL or an API key.
    pub fn normalize(&self) -> Result<ModelConfig, ConfigError> {
        let connection = if let Some(url) = non_empty(&self.proxy_url) {
            Connection::Proxy { url: url.to_string() }
        } else if let Some(key) = non_empty(&self.api_key) {
            if self.endpoint.trim().is_empty() {
                return Err(ConfigError::MissingCredentials(
                    "direct mode requires a model endpoint".into(),
                ));
            }
            Connection::Direct {
                endpoint: self.endpoint.trim().to_string(),
                api_key: key.to_string(),
            }
        } else {
            return Err(ConfigError::MissingCredentials(
                "either proxyUrl or apiKey must be set to enable AI mode".into(),
            ));
        };

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !(self.history_decay > 0.0 && self.history_decay <= 1.0) {
            return Err(ConfigError::ValidationError(
                "historyDecay must be in (0, 1]".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError("timeoutMs must be > 0".into()));
        }
        if self.max_history_size == 0 {
            return Err(ConfigError::ValidationError(
                "maxHistorySize must be at least 1".into(),
            ));
        }

        Ok(ModelConfig {
            connection,
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            retry_client_errors: self.retry_client_errors,
            cache_enabled: self.cache_enabled,
            cache_ttl: Duration::from_millis(self.cache_ttl_ms),
            history_enabled: self.enable_history,
            history: HistoryLimits {
                max_size: self.max_history_size,
                decay_rate: self.history_decay,
            },
            history_window: self.history_window,
            mode: self.mode,
            fallback_to_standard: self.fallback_to_standard,
            prompt_override: non_empty(&self.prompt_override).map(String::from),
            brand_profile: self.brand_profile.clone(),
            reference_template: non_empty(&self.reference_template).map(String::from),
        })
    }
}
