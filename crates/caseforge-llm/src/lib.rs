pub mod openai;
pub mod retry;

use caseforge_core::config::ModelConfig;
use caseforge_core::traits::ModelClient;

pub use openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create a model client from config, wrapping it in retries when configured.
pub fn create_client(config: &ModelConfig) -> Box<dyn ModelClient> {
    let inner: Box<dyn ModelClient> = Box::new(OpenAiClient::new());
    match &config.retry {
        Some(retry) => Box::new(RetryingClient::new(inner, retry.clone())),
        None => inner,
    }
}
