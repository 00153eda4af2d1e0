//! Schema checks on model payloads.
//!
//! An unknown variant key is always rejected, never coerced to a default.

use serde_json::Value;
use siteshift_core::decision::TemplateCatalog;
use siteshift_core::error::ModelError;

/// Copy synthesized in generate mode.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCopy {
    pub headline: String,
    pub subheadline: String,
    pub cta_label: String,
}

/// The catalog key chosen by a select-mode payload.
pub fn selection(payload: &Value, catalog: &TemplateCatalog) -> Result<String, ModelError> {
    let key = non_empty_str(payload, "selectedVariant")
        .ok_or_else(|| ModelError::Validation("selectedVariant missing or empty".into()))?;

    if !catalog.contains(key) {
        return Err(ModelError::Validation(format!(
            "selectedVariant '{key}' is not in the catalog"
        )));
    }
    Ok(key.to_string())
}

/// The copy carried by a generate-mode payload.
pub fn generated(payload: &Value) -> Result<GeneratedCopy, ModelError> {
    let field = |name: &str| {
        non_empty_str(payload, name)
            .map(String::from)
            .ok_or_else(|| ModelError::Validation(format!("{name} missing or empty")))
    };

    Ok(GeneratedCopy {
        headline: field("headline")?,
        subheadline: field("subheadline")?,
        cta_label: field("ctaLabel")?,
    })
}

/// Reported confidence, clamped to [0, 1]. Non-numeric values are ignored.
pub fn confidence(payload: &Value) -> Option<f64> {
    payload
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
}

pub fn reasoning(payload: &Value) -> Option<String> {
    non_empty_str(payload, "reasoning").map(String::from)
}

/// Whether a proxy reported serving this payload from its own cache.
pub fn proxy_cached(payload: &Value) -> bool {
    payload.get("cached").and_then(Value::as_bool).unwrap_or(false)
}

fn non_empty_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
