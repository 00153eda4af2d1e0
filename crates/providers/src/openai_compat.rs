//! OpenAI-compatible model gateway.
//!
//! Works with OpenAI, OpenRouter, vLLM, Ollama and any endpoint speaking the
//! `/v1/chat/completions` protocol, either directly (bearer key) or through a
//! proxy that injects credentials server-side.

use crate::parse::extract_payload;
use async_trait::async_trait;
use serde_json::json;
use siteshift_core::error::ModelError;
use siteshift_core::gateway::{ModelConfig, ModelGateway, ModelReply};
use siteshift_core::message::Message;
use std::time::Instant;
use tracing::{debug, warn};

/// A model gateway speaking the chat-completions protocol over HTTP.
pub struct HttpModelGateway {
    name: String,
    client: reqwest::Client,
}

impl HttpModelGateway {
    /// Create a gateway with a default HTTP client.
    pub fn new() -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ModelError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    /// Create a gateway around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            name: "openai-compat".into(),
            client,
        }
    }

    /// The JSON request body for one attempt.
    fn request_body(messages: &[Message], config: &ModelConfig) -> serde_json::Value {
        json!({
            "model": config.model,
            "messages": messages,
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "response_format": { "type": "json_object" },
        })
    }

    async fn send(&self, messages: &[Message], config: &ModelConfig) -> Result<serde_json::Value, ModelError> {
        let endpoint = config.connection.endpoint();
        if endpoint.is_empty() {
            return Err(ModelError::NotConfigured("no model endpoint".into()));
        }

        debug!(
            gateway = %self.name,
            model = %config.model,
            proxy = config.connection.is_proxy(),
            "Sending model request"
        );

        let mut request = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(&Self::request_body(messages, config));

        if let Some(api_key) = config.connection.bearer() {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout {
                    timeout_ms: config.timeout.as_millis() as u64,
                }
            } else {
                ModelError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ModelError::RateLimited);
        }

        if status == 401 || status == 403 {
            return Err(ModelError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model endpoint returned error");
            return Err(ModelError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("Failed to parse response body: {e}")))
    }
}

#[async_trait]
impl ModelGateway for HttpModelGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, messages: &[Message], config: &ModelConfig) -> Result<ModelReply, ModelError> {
        let started = Instant::now();

        // Dropping the future on timeout abandons the in-flight request.
        let body = tokio::time::timeout(config.timeout, self.send(messages, config))
            .await
            .map_err(|_| ModelError::Timeout {
                timeout_ms: config.timeout.as_millis() as u64,
            })??;

        let payload = extract_payload(&body)?;
        let model = body
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(&config.model)
            .to_string();

        Ok(ModelReply {
            payload,
            model,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use siteshift_core::gateway::{Connection, Mode};
    use siteshift_core::history::HistoryLimits;
    use std::time::Duration;

    fn config(connection: Connection) -> ModelConfig {
        ModelConfig {
            connection,
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 500,
            timeout: Duration::from_secs(5),
            max_retries: 0,
            retry_base_delay: Duration::from_millis(500),
            retry_client_errors: true,
            cache_enabled: false,
            cache_ttl: Duration::from_secs(3600),
            history_enabled: false,
            history: HistoryLimits::default(),
            history_window: 10,
            mode: Mode::Select,
            fallback_to_standard: true,
            prompt_override: None,
            brand_profile: None,
            reference_template: None,
        }
    }

    fn direct(server: &mockito::ServerGuard) -> ModelConfig {
        config(Connection::Direct {
            endpoint: format!("{}/v1/chat/completions", server.url()),
            api_key: "sk-test".into(),
        })
    }

    fn messages() -> Vec<Message> {
        vec![Message::system("Return JSON"), Message::user("Pick a variant")]
    }

    #[test]
    fn request_body_matches_wire_contract() {
        let body = HttpModelGateway::request_body(
            &messages(),
            &config(Connection::Proxy { url: "http://proxy".into() }),
        );
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Pick a variant");
    }

    #[tokio::test]
    async fn direct_mode_sends_bearer_and_parses_choices() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "response_format": {"type": "json_object"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"model":"gpt-4o-mini-2024","choices":[{"message":{"content":"{\"selectedVariant\":\"gaming\",\"confidence\":0.92}"}}]}"#,
            )
            .create_async()
            .await;

        let gateway = HttpModelGateway::new().unwrap();
        let reply = gateway.invoke(&messages(), &direct(&server)).await.unwrap();
        assert_eq!(reply.payload["selectedVariant"], "gaming");
        assert_eq!(reply.model, "gpt-4o-mini-2024");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn proxy_mode_omits_authorization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/personalize")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"selectedVariant":"professional","confidence":0.8}"#)
            .create_async()
            .await;

        let cfg = config(Connection::Proxy {
            url: format!("{}/personalize", server.url()),
        });
        let reply = HttpModelGateway::new().unwrap().invoke(&messages(), &cfg).await.unwrap();
        assert_eq!(reply.payload["selectedVariant"], "professional");
        assert_eq!(reply.model, "gpt-4o-mini");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .create_async()
            .await;

        let err = HttpModelGateway::new().unwrap().invoke(&messages(), &direct(&server)).await.unwrap_err();
        assert!(matches!(err, ModelError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let err = HttpModelGateway::new().unwrap().invoke(&messages(), &direct(&server)).await.unwrap_err();
        match err {
            ModelError::ApiError { status_code, message } => {
                assert_eq!(status_code, 503);
                assert!(message.contains("upstream"));
            }
            other => panic!("Expected ApiError, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_maps_to_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let err = HttpModelGateway::new().unwrap().invoke(&messages(), &direct(&server)).await.unwrap_err();
        assert_eq!(err, ModelError::RateLimited);
    }

    #[tokio::test]
    async fn non_json_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let err = HttpModelGateway::new().unwrap().invoke(&messages(), &direct(&server)).await.unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        use std::io::Write;

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(2));
                w.write_all(br#"{"selectedVariant":"gaming"}"#)
            })
            .create_async()
            .await;

        let mut cfg = direct(&server);
        cfg.timeout = Duration::from_millis(100);

        let started = std::time::Instant::now();
        let err = HttpModelGateway::new().unwrap().invoke(&messages(), &cfg).await.unwrap_err();

        assert_eq!(err, ModelError::Timeout { timeout_ms: 100 });
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let cfg = config(Connection::Direct {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".into(),
            api_key: "sk-test".into(),
        });
        let err = HttpModelGateway::new().unwrap().invoke(&messages(), &cfg).await.unwrap_err();
        assert!(err.is_transport());
    }
}
