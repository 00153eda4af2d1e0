//! The siteshift decision engine.
//!
//! Turns a visit context into a content decision through layers:
//!
//! 1. **Custom rules**: caller predicates, first match wins
//! 2. **Decision cache**: earlier AI decisions for the same traffic segment
//! 3. **Model call**: history-aware prompt, retried with backoff, validated
//! 4. **Deterministic engine**: UTM, referrer or random variant, used when AI
//!    is off or as the fallback when the model call fails

pub mod policy;
pub mod prompt;
pub mod rules;
pub mod standard;
pub mod validate;

pub use policy::{DecisionPolicy, DecisionRequest};
pub use prompt::{PromptInput, build_generate, build_messages, build_select};
pub use rules::{CustomRule, RuleSet};
pub use standard::{Resolved, StandardEngine, StandardOptions, resolve_key};
pub use validate::GeneratedCopy;
