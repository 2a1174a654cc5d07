use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use caseforge_core::config::{ModelConfig, RetryConfig};
use caseforge_core::error::{ForgeError, Result};
use caseforge_core::traits::ModelClient;
use caseforge_core::types::{AssistantTurn, ChatMessage, ToolDefinition};

/// A model client that retries failed requests with exponential backoff.
pub struct RetryingClient {
    inner: Box<dyn ModelClient>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(inner: Box<dyn ModelClient>, retry_config: RetryConfig) -> Self {
        Self {
            inner,
            retry_config,
        }
    }
}

fn is_retryable(e: &ForgeError) -> bool {
    match e {
        ForgeError::ModelRequest(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timeout")
                || msg.contains("connection")
        }
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    // Clamp the exponent: past ~20 doublings the cap decides anyway, and an
    // unclamped shift would overflow for very large retry counts.
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.pow(attempt.min(20)))
        .min(config.max_backoff_ms);
    // Jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

macro_rules! retried {
    ($self:ident, $call:expr) => {{
        let max_retries = $self.retry_config.max_retries;
        let mut result = $call.await;
        let mut attempt = 0u32;
        while let Err(e) = &result {
            if !is_retryable(e) || attempt >= max_retries {
                break;
            }
            let backoff = calculate_backoff(attempt, &$self.retry_config);
            warn!(
                attempt = attempt + 1,
                max_retries,
                backoff_ms = backoff.as_millis() as u64,
                error = %e,
                "Retrying model request"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
            result = $call.await;
        }
        result
    }};
}

impl ModelClient for RetryingClient {
    fn complete(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<String>> {
        let config = config.clone();
        Box::pin(async move { retried!(self, self.inner.complete(&config, messages.clone())) })
    }

    fn complete_structured(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        schema_name: &str,
        schema: &serde_json::Value,
    ) -> BoxFuture<'_, Result<serde_json::Value>> {
        let config = config.clone();
        let schema_name = schema_name.to_string();
        let schema = schema.clone();
        Box::pin(async move {
            retried!(
                self,
                self.inner
                    .complete_structured(&config, messages.clone(), &schema_name, &schema)
            )
        })
    }

    fn chat(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<AssistantTurn>> {
        let config = config.clone();
        let tools = tools.to_vec();
        Box::pin(async move {
            retried!(self, self.inner.chat(&config, messages.clone(), &tools))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(&ForgeError::ModelRequest(
            "HTTP 429: rate limited".into()
        )));
        assert!(is_retryable(&ForgeError::ModelRequest(
            "connection reset".into()
        )));
        assert!(!is_retryable(&ForgeError::ModelRequest(
            "HTTP 401: unauthorized".into()
        )));
        assert!(!is_retryable(&ForgeError::ModelParse("bad json".into())));
    }

    #[test]
    fn test_backoff_is_bounded() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 2000,
        };
        for attempt in 0..10 {
            let backoff = calculate_backoff(attempt, &config);
            // 2000ms cap * 1.2 jitter ceiling
            assert!(backoff.as_millis() <= 2400);
        }
    }

    #[test]
    fn test_backoff_survives_large_attempt_counts() {
        let config = RetryConfig {
            max_retries: u32::MAX,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
        };
        // Exponent far past where 2^n overflows u64; must stay at the cap.
        for attempt in [55, 64, 200, u32::MAX] {
            let backoff = calculate_backoff(attempt, &config);
            assert!(backoff.as_millis() <= 9600);
            assert!(backoff.as_millis() >= 6400);
        }
    }
}
