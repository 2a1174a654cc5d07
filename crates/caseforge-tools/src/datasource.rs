use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use caseforge_core::config::DataSourceConfig;
use caseforge_core::error::{ForgeError, Result};
use caseforge_core::types::ToolOutcome;

use crate::rows::extract_rows;

/// Client for the remote data-source tool endpoint (JSON-RPC 2.0
/// `tools/call`).
///
/// Transport failures and application-level errors are both folded into
/// `ToolOutcome::Error` so the model-driven step can decide whether to retry
/// with different arguments or mark the item failed.
pub struct DataSourceClient {
    http: Client,
    base_url: String,
}

impl DataSourceClient {
    pub fn new(config: &DataSourceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ForgeError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    /// Invoke a named remote tool, normalizing the result into rows.
    pub async fn call(&self, tool_name: &str, arguments: Value) -> ToolOutcome {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": tool_name,
                "arguments": arguments,
            }
        });

        debug!(tool = tool_name, "Calling data-source tool");

        let response = match self.http.post(&self.base_url).json(&payload).send().await {
            Ok(r) => r,
            Err(e) => {
                error!(tool = tool_name, error = %e, "Data-source request failed");
                return ToolOutcome::error(format!("request failed: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return ToolOutcome::error(format!("HTTP {status}: {body}"));
        }

        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => return ToolOutcome::error(format!("invalid JSON-RPC response: {e}")),
        };

        if let Some(err) = body.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return ToolOutcome::error(message);
        }

        let result = body.get("result").unwrap_or(&body);
        ToolOutcome::success(extract_rows(result))
    }
}
