//! Extracting the decision payload from a model response body.
//!
//! Two body shapes are accepted:
//! - the raw provider shape `{choices:[{message:{content:"<json>"}}]}`
//! - the payload itself, when a proxy has already extracted it server-side

use serde_json::Value;
use siteshift_core::error::ModelError;

/// Fields that identify a bare decision payload.
const PAYLOAD_FIELDS: [&str; 4] = ["selectedVariant", "headline", "subheadline", "ctaLabel"];

/// The decision payload carried by a response body.
pub fn extract_payload(body: &Value) -> Result<Value, ModelError> {
    if let Some(choices) = body.get("choices") {
        let content = choices
            .get(0)
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ModelError::InvalidResponse("missing choices[0].message.content".into())
            })?;
        return parse_content(content);
    }

    if body.is_object() && PAYLOAD_FIELDS.iter().any(|field| body.get(field).is_some()) {
        return Ok(body.clone());
    }

    Err(ModelError::InvalidResponse("unrecognized response shape".into()))
}

/// Parse message content as a JSON object, recovering the first top-level
/// `{...}` when the model wrapped it in prose or code fences.
pub fn parse_content(content: &str) -> Result<Value, ModelError> {
    if let Ok(value) = serde_json::from_str::<Value>(content.trim()) {
        if value.is_object() {
            return Ok(value);
        }
    }

    let candidate = first_json_object(content)
        .ok_or_else(|| ModelError::InvalidResponse("no JSON object in model output".into()))?;

    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object)
        .ok_or_else(|| ModelError::InvalidResponse("model output is not valid JSON".into()))
}

/// The first balanced `{...}` substring, ignoring braces inside strings.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
