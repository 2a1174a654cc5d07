use std::path::Path;

use futures::future::BoxFuture;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::{AssistantTurn, ChatMessage, ToolDefinition, ToolOutcome};

/// Model client — the black-box language-model boundary.
///
/// Free-text output is never assumed well-formed; callers pass it through the
/// repair stage. Schema-constrained output is assumed valid JSON.
pub trait ModelClient: Send + Sync + 'static {
    /// Send a chat request and receive the full response text.
    fn complete(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<String>>;

    /// Send a chat request constrained to a JSON schema; the returned value
    /// conforms to the schema.
    fn complete_structured(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        schema_name: &str,
        schema: &serde_json::Value,
    ) -> BoxFuture<'_, Result<serde_json::Value>>;

    /// Send a chat request with tools bound and receive the assistant turn,
    /// including any tool calls.
    fn chat(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<AssistantTurn>>;
}

/// Tool — a callable capability with a declared name, input schema, and
/// success/error contract.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in model tool calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input.
    fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<ToolOutcome>>;
}

/// Artifact upload boundary.
pub trait Uploader: Send + Sync + 'static {
    /// Upload a local file under the given namespace, returning the remote
    /// location.
    fn upload(&self, local_path: &Path, namespace: &str) -> BoxFuture<'_, Result<String>>;
}
