//! Chat message types exchanged with the remote model.
//!
//! A prompt is a short conversation: one system message carrying the
//! instruction contract and one user message carrying the visitor context.

use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions and output contract
    System,
    /// Visitor context and task
    User,
    /// Model output
    Assistant,
}

/// A single message, serialized exactly as `{role, content}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_wire_shape() {
        let json = serde_json::to_value(Message::system("Return JSON")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "Return JSON"}));
    }
}
