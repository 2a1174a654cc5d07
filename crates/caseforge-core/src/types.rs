use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which workflow path an inbound run selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    CreateCollection,
    EnhanceCollection,
    EnhanceCollectionWithData,
    ValidateSpec,
    /// Any selector the dispatch table does not recognize.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Task::CreateCollection => "create_collection",
            Task::EnhanceCollection => "enhance_collection",
            Task::EnhanceCollectionWithData => "enhance_collection_with_data",
            Task::ValidateSpec => "validate_spec",
            Task::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Terminal/intermediate signal carried in workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Searching,
    Success,
    Error,
    Found,
    Failed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Searching => "searching",
            Status::Success => "success",
            Status::Error => "error",
            Status::Found => "found",
            Status::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One queryable table: name plus a human description of what it stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub description: String,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A flat key-value record returned by the data source.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Tagged outcome of a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutcome {
    Success { rows: Vec<Row> },
    Error { message: String },
}

impl ToolOutcome {
    pub fn success(rows: Vec<Row>) -> Self {
        Self::Success { rows }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Normalized record of the most recent data-source invocation.
///
/// Schema lookups carry the table name; query executions carry the query
/// text. Both carry the same rows payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub tool_name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub rows: Vec<Row>,
}

/// Role in a model conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A model-requested tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A message in a model conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Tool calls issued by an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool-result messages: which call this answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// One complete assistant turn from the model.
#[derive(Debug, Clone, Default)]
pub struct AssistantTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    /// The first tool call of this turn, if any.
    ///
    /// Tool choice is configured single-call, so this is the only one the
    /// router ever acts on.
    pub fn first_tool_call(&self) -> Option<&ToolCall> {
        self.tool_calls.first()
    }

    pub fn into_message(self) -> ChatMessage {
        ChatMessage::assistant(self.text, self.tool_calls)
    }
}

/// Tool definition advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Inbound request that seeds a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub task: Task,
    pub spec_fpath: PathBuf,
    pub api_name: String,
    #[serde(default)]
    pub existing_collection_fpath: Option<PathBuf>,
    #[serde(default)]
    pub test_data_scenario: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_parses_known_selectors() {
        let t: Task = serde_json::from_str("\"create_collection\"").unwrap();
        assert_eq!(t, Task::CreateCollection);
        let t: Task = serde_json::from_str("\"enhance_collection_with_data\"").unwrap();
        assert_eq!(t, Task::EnhanceCollectionWithData);
    }

    #[test]
    fn test_task_unknown_selector_falls_through() {
        let t: Task = serde_json::from_str("\"delete_everything\"").unwrap();
        assert_eq!(t, Task::Unknown);
    }

    #[test]
    fn test_tool_outcome_tagging() {
        let json = serde_json::to_value(ToolOutcome::error("boom")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "boom");

        let ok = ToolOutcome::success(vec![]);
        assert!(!ok.is_error());
    }

    #[test]
    fn test_chat_message_constructors() {
        let msg = ChatMessage::tool_result("call_1", "rows: []");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));

        let turn = AssistantTurn {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: "c1".into(),
                name: "describe_schema".into(),
                arguments: serde_json::json!({"name": "stations"}),
            }],
        };
        assert_eq!(turn.first_tool_call().unwrap().name, "describe_schema");
    }

    #[test]
    fn test_run_request_optional_fields() {
        let req: RunRequest = serde_json::from_str(
            r#"{"task":"create_collection","spec_fpath":"spec.json","api_name":"TFL"}"#,
        )
        .unwrap();
        assert!(req.existing_collection_fpath.is_none());
        assert!(req.test_data_scenario.is_empty());
    }
}
