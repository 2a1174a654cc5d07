use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use caseforge_core::config::ModelConfig;
use caseforge_core::error::{ForgeError, Result};
use caseforge_core::traits::ModelClient;
use caseforge_core::types::{AssistantTurn, ChatMessage, Role, ToolCall, ToolDefinition};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq, etc.
///
/// Non-streaming: the workflow consumes whole assistant turns, so responses
/// are requested complete.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OaiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
}

#[derive(Serialize)]
struct OaiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OaiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OaiToolCall {
    id: String,
    r#type: String,
    function: OaiFunction,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OaiFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct OaiTool {
    r#type: String,
    function: OaiToolDef,
}

#[derive(Serialize)]
struct OaiToolDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OaiToolCall>>,
}

fn to_oai_messages(messages: Vec<ChatMessage>) -> Vec<OaiMessage> {
    messages
        .into_iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            let tool_calls = if m.tool_calls.is_empty() {
                None
            } else {
                Some(
                    m.tool_calls
                        .iter()
                        .map(|tc| OaiToolCall {
                            id: tc.id.clone(),
                            r#type: "function".into(),
                            function: OaiFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect(),
                )
            };
            OaiMessage {
                role: role.into(),
                content: if m.content.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(m.content)
                },
                tool_calls,
                tool_call_id: m.tool_call_id,
            }
        })
        .collect()
}

impl OpenAiClient {
    async fn send(&self, config: &ModelConfig, request: &ChatRequest) -> Result<ChatResponse> {
        let url = config
            .base_url
            .clone()
            .unwrap_or_else(|| OPENAI_API_URL.to_string());
        let api_key = config.resolve_api_key().unwrap_or_default();

        debug!(model = %config.model_id, url = %url, "Sending chat request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ForgeError::ModelRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ForgeError::ModelRequest(format!("HTTP {status}: {body}")));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ForgeError::ModelParse(e.to_string()))
    }

    async fn turn(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
        response_format: Option<serde_json::Value>,
    ) -> Result<AssistantTurn> {
        let request = ChatRequest {
            model: config.model_id.clone(),
            messages: to_oai_messages(messages),
            max_tokens: config.max_tokens,
            temperature: Some(config.temperature),
            tools: tools
                .iter()
                .map(|t| OaiTool {
                    r#type: "function".into(),
                    function: OaiToolDef {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    },
                })
                .collect(),
            response_format,
            // One tool call per turn keeps the router single-path.
            parallel_tool_calls: if tools.is_empty() { None } else { Some(false) },
        };

        let response = self.send(config, &request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ForgeError::ModelParse("response has no choices".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::Null);
                ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                }
            })
            .collect();

        Ok(AssistantTurn {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

impl ModelClient for OpenAiClient {
    fn complete(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<String>> {
        let config = config.clone();
        Box::pin(async move {
            let turn = self.turn(&config, messages, &[], None).await?;
            Ok(turn.text)
        })
    }

    fn complete_structured(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        schema_name: &str,
        schema: &serde_json::Value,
    ) -> BoxFuture<'_, Result<serde_json::Value>> {
        let config = config.clone();
        let format = serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema_name,
                "schema": schema,
                "strict": true,
            }
        });
        Box::pin(async move {
            let turn = self.turn(&config, messages, &[], Some(format)).await?;
            serde_json::from_str(&turn.text).map_err(|e| {
                ForgeError::ModelParse(format!("structured output is not valid JSON: {e}"))
            })
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
        Box::pin(async move { self.turn(&config, messages, &tools, None).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_message_with_tool_calls_serializes_without_content() {
        let msgs = to_oai_messages(vec![ChatMessage::assistant(
            "",
            vec![ToolCall {
                id: "c1".into(),
                name: "execute_query".into(),
                arguments: serde_json::json!({"query": "SELECT 1"}),
            }],
        )]);
        assert!(msgs[0].content.is_none());
        let calls = msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "execute_query");
    }

    #[test]
    fn test_tool_result_message_carries_call_id() {
        let msgs = to_oai_messages(vec![ChatMessage::tool_result("c1", "rows")]);
        assert_eq!(msgs[0].role, "tool");
        assert_eq!(msgs[0].tool_call_id.as_deref(), Some("c1"));
    }
}
