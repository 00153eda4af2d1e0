//! Model gateway trait — the abstraction over the remote model endpoint.
//!
//! A gateway knows how to send a prompt to a chat-completions style endpoint
//! and hand back the structured JSON payload the model produced.
//!
//! Implementations: OpenAI-compatible HTTP (direct or through a proxy),
//! scripted mocks in tests.

use crate::error::ModelError;
use crate::history::HistoryLimits;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// The AI task variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Pick one of the caller-supplied variants
    #[default]
    Select,
    /// Synthesize new headline/subheadline/CTA copy
    Generate,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Generate => "generate",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How requests reach the model. A proxy injects credentials server-side.
#[derive(Clone, PartialEq)]
pub enum Connection {
    Direct { endpoint: String, api_key: String },
    Proxy { url: String },
}

impl Connection {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Direct { endpoint, .. } => endpoint,
            Self::Proxy { url } => url,
        }
    }

    /// Bearer credential, only sent in direct mode.
    pub fn bearer(&self) -> Option<&str> {
        match self {
            Self::Direct { api_key, .. } => Some(api_key),
            Self::Proxy { .. } => None,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy { .. })
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct { endpoint, .. } => f
                .debug_struct("Direct")
                .field("endpoint", endpoint)
                .field("api_key", &"[REDACTED]")
                .finish(),
            Self::Proxy { url } => f.debug_struct("Proxy").field("url", url).finish(),
        }
    }
}

/// Brand voice used to steer generated copy.
///
/// Unknown fields are kept and echoed verbatim into the prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Normalized model configuration, built once per decision request.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub connection: Connection,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Hard deadline for each attempt
    pub timeout: Duration,
    /// Additional attempts after the first
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt
    pub retry_base_delay: Duration,
    pub retry_client_errors: bool,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub history_enabled: bool,
    pub history: HistoryLimits,
    /// How many weighted visits are summarized in the prompt
    pub history_window: usize,
    pub mode: Mode,
    pub fallback_to_standard: bool,
    pub prompt_override: Option<String>,
    pub brand_profile: Option<BrandProfile>,
    /// Catalog key of a template whose tone generated copy should follow
    pub reference_template: Option<String>,
}

/// The structured payload extracted from a successful model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub payload: serde_json::Value,
    /// Model reported by the endpoint, or the configured one
    pub model: String,
    pub latency_ms: u64,
}

/// The core ModelGateway trait.
///
/// `invoke` performs exactly one attempt and must respect `config.timeout`;
/// retries are layered on top by the caller.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// A human-readable name for this gateway (e.g., "openai-compat").
    fn name(&self) -> &str;

    /// Send one request and return the decision payload.
    async fn invoke(
        &self,
        messages: &[Message],
        config: &ModelConfig,
    ) -> std::result::Result<ModelReply, ModelError>;
}
