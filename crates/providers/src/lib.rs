//! Model gateway implementations for siteshift.
//!
//! All gateways implement the `siteshift_core::ModelGateway` trait. Retries
//! are layered on top of any gateway by [`invoke_with_retry`].

pub mod openai_compat;
pub mod parse;
pub mod retry;

pub use openai_compat::HttpModelGateway;
pub use parse::{extract_payload, first_json_object, parse_content};
pub use retry::{backoff_delay, invoke_with_retry};
