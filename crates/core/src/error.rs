//! Error types for the siteshift domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all siteshift operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Model gateway errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of a single model invocation.
///
/// `Network` and `Timeout` are transport failures; every other variant
/// except `NotConfigured` is a protocol failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Model gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Rate limited by model endpoint")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Model response rejected: {0}")]
    Validation(String),
}

impl ModelError {
    /// Whether another attempt may be made after this failure.
    ///
    /// Client errors (4xx other than 429) are only retried when
    /// `retry_client_errors` is set.
    pub fn is_retryable(&self, retry_client_errors: bool) -> bool {
        match self {
            Self::NotConfigured(_) => false,
            Self::AuthenticationFailed(_) => retry_client_errors,
            Self::ApiError { status_code, .. } if (400..500).contains(status_code) => {
                retry_client_errors
            }
            _ => true,
        }
    }

    /// Transport failures (as opposed to protocol failures).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout { .. })
    }
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage read failed: {0}")]
    Read(String),

    #[error("Storage write failed: {0}")]
    Write(String),

    #[error("Stored value is corrupt: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_displays_correctly() {
        let err = Error::Model(ModelError::ApiError {
            status_code: 502,
            message: "Bad gateway".into(),
        });
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("Bad gateway"));
    }

    #[test]
    fn client_errors_follow_retry_flag() {
        let unauthorized = ModelError::AuthenticationFailed("bad key".into());
        assert!(unauthorized.is_retryable(true));
        assert!(!unauthorized.is_retryable(false));

        let not_found = ModelError::ApiError { status_code: 404, message: "nope".into() };
        assert!(!not_found.is_retryable(false));

        assert!(ModelError::RateLimited.is_retryable(false));
        assert!(ModelError::Timeout { timeout_ms: 5000 }.is_retryable(false));
    }

    #[test]
    fn not_configured_is_never_retried() {
        let err = ModelError::NotConfigured("no endpoint".into());
        assert!(!err.is_retryable(true));
        assert!(!err.is_transport());
    }
}
