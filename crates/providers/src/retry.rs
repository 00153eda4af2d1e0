//! Retry policy for model invocations.
//!
//! Each attempt is bounded by the configured timeout. Between attempts the
//! delay doubles from `retry_base_delay` (500ms, 1s, 2s, ...). A reply the
//! caller's validator rejects counts as a failed attempt. Errors that are not
//! retryable end the loop immediately, and the final error is returned
//! unchanged.

use siteshift_core::error::ModelError;
use siteshift_core::gateway::{ModelConfig, ModelGateway, ModelReply};
use siteshift_core::message::Message;
use std::time::Duration;
use tracing::{info, warn};

/// Delay before retry number `retry` (zero-based).
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry))
}

/// Invoke the gateway up to `max_retries + 1` times, passing each reply
/// through `accept` before it counts as a success.
pub async fn invoke_with_retry<T, F>(
    gateway: &dyn ModelGateway,
    messages: &[Message],
    config: &ModelConfig,
    accept: F,
) -> Result<T, ModelError>
where
    F: Fn(ModelReply) -> Result<T, ModelError>,
{
    let attempts = config.max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = match tokio::time::timeout(config.timeout, gateway.invoke(messages, config)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout {
                timeout_ms: config.timeout.as_millis() as u64,
            }),
        };

        let err = match outcome.and_then(&accept) {
            Ok(reply) => {
                if attempt > 1 {
                    info!(gateway = gateway.name(), attempt, "Model call succeeded after retry");
                }
                return Ok(reply);
            }
            Err(err) => err,
        };

        if attempt >= attempts || !err.is_retryable(config.retry_client_errors) {
            warn!(
                gateway = gateway.name(),
                attempt,
                total = attempts,
                error = %err,
                "Model call failed"
            );
            return Err(err);
        }

        let delay = backoff_delay(config.retry_base_delay, attempt - 1);
        warn!(
            gateway = gateway.name(),
            attempt,
            total = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Model call failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use siteshift_core::gateway::{Connection, Mode};
    use siteshift_core::history::HistoryLimits;
    use std::sync::Mutex;

    /// Fails `failures` times with `error`, then succeeds.
    struct FlakyGateway {
        failures: usize,
        error: ModelError,
        call_count: Mutex<usize>,
    }

    impl FlakyGateway {
        fn new(failures: usize, error: ModelError) -> Self {
            Self {
                failures,
                error,
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl ModelGateway for FlakyGateway {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn invoke(&self, _messages: &[Message], config: &ModelConfig) -> Result<ModelReply, ModelError> {
            let call = {
                let mut count = self.call_count.lock().unwrap();
                *count += 1;
                *count
            };
            if call <= self.failures {
                return Err(self.error.clone());
            }
            Ok(ModelReply {
                payload: json!({"selectedVariant": "gaming"}),
                model: config.model.clone(),
                latency_ms: 1,
            })
        }
    }

    /// Never answers.
    struct HangingGateway {
        call_count: Mutex<usize>,
    }

    #[async_trait]
    impl ModelGateway for HangingGateway {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn invoke(&self, _messages: &[Message], _config: &ModelConfig) -> Result<ModelReply, ModelError> {
            *self.call_count.lock().unwrap() += 1;
            std::future::pending().await
        }
    }

    fn config(max_retries: u32) -> ModelConfig {
        ModelConfig {
            connection: Connection::Proxy {
                url: "http://proxy".into(),
            },
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 500,
            timeout: Duration::from_millis(5000),
            max_retries,
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

    fn messages() -> Vec<Message> {
        vec![Message::user("pick")]
    }

    #[test]
    fn backoff_doubles() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_backoff() {
        let gateway = FlakyGateway::new(2, ModelError::Network("connection reset".into()));
        let started = tokio::time::Instant::now();

        let reply = invoke_with_retry(&gateway, &messages(), &config(2), Ok).await.unwrap();

        assert_eq!(reply.payload["selectedVariant"], "gaming");
        assert_eq!(gateway.calls(), 3);
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_returns_last_error() {
        let error = ModelError::ApiError {
            status_code: 500,
            message: "boom".into(),
        };
        let gateway = FlakyGateway::new(10, error.clone());

        let err = invoke_with_retry(&gateway, &messages(), &config(2), Ok).await.unwrap_err();

        assert_eq!(err, error);
        assert_eq!(gateway.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let gateway = FlakyGateway::new(1, ModelError::RateLimited);
        let err = invoke_with_retry(&gateway, &messages(), &config(0), Ok).await.unwrap_err();
        assert_eq!(err, ModelError::RateLimited);
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_not_retried_when_disabled() {
        let gateway = FlakyGateway::new(
            10,
            ModelError::ApiError {
                status_code: 400,
                message: "bad request".into(),
            },
        );
        let mut cfg = config(2);
        cfg.retry_client_errors = false;

        invoke_with_retry(&gateway, &messages(), &cfg, Ok).await.unwrap_err();
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_configured_is_never_retried() {
        let gateway = FlakyGateway::new(10, ModelError::NotConfigured("no endpoint".into()));
        invoke_with_retry(&gateway, &messages(), &config(3), Ok).await.unwrap_err();
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_gateway_times_out_each_attempt() {
        let gateway = HangingGateway {
            call_count: Mutex::new(0),
        };
        let err = invoke_with_retry(&gateway, &messages(), &config(1), Ok).await.unwrap_err();

        assert_eq!(err, ModelError::Timeout { timeout_ms: 5000 });
        assert_eq!(*gateway.call_count.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_reply_uses_retry_budget() {
        let gateway = FlakyGateway::new(0, ModelError::RateLimited);
        let seen = Mutex::new(0usize);
        let accept = |reply: ModelReply| {
            let mut seen = seen.lock().unwrap();
            *seen += 1;
            if *seen == 1 {
                return Err(ModelError::Validation("unknown variant".into()));
            }
            Ok(reply.payload["selectedVariant"].as_str().unwrap_or_default().to_string())
        };

        let variant = invoke_with_retry(&gateway, &messages(), &config(2), accept).await.unwrap();

        assert_eq!(variant, "gaming");
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rejection_returns_validation_error() {
        let gateway = FlakyGateway::new(0, ModelError::RateLimited);
        let rejection = ModelError::Validation("missing headline".into());

        let err = invoke_with_retry(&gateway, &messages(), &config(1), |_| {
            Err::<(), _>(rejection.clone())
        })
        .await
        .unwrap_err();

        assert_eq!(err, rejection);
        assert_eq!(gateway.calls(), 2);
    }
}
