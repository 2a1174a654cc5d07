use futures::future::BoxFuture;
use serde_json::{json, Value};

use caseforge_core::error::{ForgeError, Result};
use caseforge_core::traits::Tool;
use caseforge_core::types::{Status, ToolOutcome};

/// The declared end of a data search, extracted from a `mark_complete` call.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    pub status: Status,
    pub reasoning: String,
}

impl CompletionSignal {
    /// Parse and validate `mark_complete` arguments. Only `found` and
    /// `failed` are accepted terminal statuses; anything else is an input
    /// validation error, not a silent pass.
    pub fn from_args(args: &Value) -> Result<Self> {
        let status = match args.get("status").and_then(Value::as_str) {
            Some("found") => Status::Found,
            Some("failed") => Status::Failed,
            Some(other) => {
                return Err(ForgeError::ToolValidation(format!(
                    "invalid status '{other}': must be 'found' or 'failed'"
                )))
            }
            None => {
                return Err(ForgeError::ToolValidation(
                    "mark_complete requires a 'status' argument".into(),
                ))
            }
        };
        let reasoning = args
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or("no reasoning given")
            .to_string();
        Ok(Self { status, reasoning })
    }
}

/// Completion signal advertised to the model alongside the database tools.
///
/// The tool router intercepts calls to this tool and terminates the search
/// sub-workflow; `execute` only runs if something invokes it directly.
pub struct MarkCompleteTool;

impl Tool for MarkCompleteTool {
    fn name(&self) -> &str {
        "mark_complete"
    }
    fn description(&self) -> &str {
        "Mark the current data search as complete. Use status 'found' when the \
         requested data was retrieved, 'failed' when all options are exhausted."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["found", "failed"],
                    "description": "'found' if data was retrieved, 'failed' otherwise"
                },
                "reasoning": {
                    "type": "string",
                    "description": "What was found, or why the search failed"
                }
            },
            "required": ["status", "reasoning"]
        })
    }
    fn execute(&self, input: Value) -> BoxFuture<'_, Result<ToolOutcome>> {
        Box::pin(async move {
            CompletionSignal::from_args(&input)?;
            Ok(ToolOutcome::success(Vec::new()))
        })
    }
}
