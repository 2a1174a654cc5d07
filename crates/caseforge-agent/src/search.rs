use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, warn};

use caseforge_core::error::{ForgeError, Result};
use caseforge_core::types::{ChatMessage, QueryRecord, Status, ToolCall, ToolOutcome};
use caseforge_tools::CompletionSignal;
use caseforge_workflow::{StepNode, StepOutcome, Transition, WorkflowGraph};

use crate::prompts;
use crate::state::{SearchPatch, SearchState};
use crate::AgentDeps;

/// Model step of the data-search loop. Seeds the conversation on first entry,
/// then feeds the full history back with the database tools bound.
pub struct ModelCallNode {
    deps: Arc<AgentDeps>,
}

impl ModelCallNode {
    pub fn new(deps: Arc<AgentDeps>) -> Self {
        Self { deps }
    }
}

impl StepNode<SearchState> for ModelCallNode {
    fn id(&self) -> &str {
        "model_call"
    }

    fn run<'a>(&'a self, state: &'a SearchState) -> BoxFuture<'a, Result<StepOutcome<SearchState>>> {
        Box::pin(async move {
            let mut patch = SearchPatch::default();

            let mut messages = state.messages.clone();
            if messages.is_empty() {
                let seed = vec![
                    ChatMessage::system(prompts::data_search_prompt(
                        &state.lookup_query,
                        &state.all_tables,
                    )),
                    ChatMessage::user("Begin the search."),
                ];
                patch.messages.extend(seed.clone());
                messages = seed;
            }

            let turn = self
                .deps
                .model
                .chat(&self.deps.model_config, messages, &self.deps.tools.definitions())
                .await?;
            let has_tool_call = turn.first_tool_call().is_some();
            patch.messages.push(turn.into_message());

            if has_tool_call {
                Ok(StepOutcome::new(patch, Transition::Next))
            } else {
                // Text-only turn: nudge the model back onto the tool protocol
                // and loop. The step budget bounds this.
                debug!("Assistant turn carried no tool call, prompting again");
                patch.messages.push(ChatMessage::user(
                    "Respond with a tool call: use the database tools to continue, or \
                     mark_complete to finish.",
                ));
                Ok(StepOutcome::new(patch, Transition::goto("model_call")))
            }
        })
    }
}

/// Routing step of the data-search loop: executes the tool the model chose,
/// appends its result to the history, and loops back — or terminates on a
/// valid `mark_complete`.
pub struct ToolRouterNode {
    deps: Arc<AgentDeps>,
}

impl ToolRouterNode {
    pub fn new(deps: Arc<AgentDeps>) -> Self {
        Self { deps }
    }

    async fn dispatch(&self, call: &ToolCall) -> StepOutcome<SearchState> {
        if call.name == "mark_complete" {
            return match CompletionSignal::from_args(&call.arguments) {
                Ok(signal) => {
                    let mut patch = SearchPatch::terminal(signal.status, signal.reasoning);
                    patch
                        .messages
                        .push(ChatMessage::tool_result(&call.id, "search marked complete"));
                    StepOutcome::finish(patch)
                }
                Err(e) => {
                    // Invalid completion arguments go back to the model as a
                    // tool error instead of ending the search.
                    warn!(error = %e, "Rejected mark_complete call");
                    let mut patch = SearchPatch::push(ChatMessage::tool_result(
                        &call.id,
                        format!("error: {e}"),
                    ));
                    patch.status = Some(Status::Searching);
                    StepOutcome::new(patch, Transition::goto("model_call"))
                }
            };
        }

        let outcome = match self.deps.tools.execute(&call.name, call.arguments.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => ToolOutcome::error(e.to_string()),
        };

        let content =
            serde_json::to_string(&outcome).unwrap_or_else(|e| format!("serialization error: {e}"));
        let mut patch = SearchPatch::push(ChatMessage::tool_result(&call.id, content));
        patch.last_query_result = record_for(call, &outcome);
        StepOutcome::new(patch, Transition::goto("model_call"))
    }
}

/// Build the normalized record of a data-source invocation, if the tool is
/// one whose results feed the lookup report. Schema listing is history-only.
fn record_for(call: &ToolCall, outcome: &ToolOutcome) -> Option<QueryRecord> {
    if call.name == "list_schemas" {
        return None;
    }
    let (status, rows) = match outcome {
        ToolOutcome::Success { rows } => (Status::Success, rows.clone()),
        ToolOutcome::Error { .. } => (Status::Error, Vec::new()),
    };
    Some(QueryRecord {
        tool_name: call.name.clone(),
        status,
        table: arg_str(&call.arguments, "name"),
        query: arg_str(&call.arguments, "query"),
        rows,
    })
}

fn arg_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

impl StepNode<SearchState> for ToolRouterNode {
    fn id(&self) -> &str {
        "route_tool"
    }

    fn run<'a>(&'a self, state: &'a SearchState) -> BoxFuture<'a, Result<StepOutcome<SearchState>>> {
        Box::pin(async move {
            let call = state
                .messages
                .iter()
                .rev()
                .find(|m| !m.tool_calls.is_empty())
                .and_then(|m| m.tool_calls.first())
                .ok_or_else(|| {
                    ForgeError::ToolExecution {
                        tool: "route_tool".into(),
                        message: "no pending tool call in history".into(),
                    }
                })?;
            Ok(self.dispatch(call).await)
        })
    }
}

/// The two-node search loop: model proposes, router executes, until a valid
/// completion signal or the step budget.
pub fn build_search_graph(deps: Arc<AgentDeps>) -> Result<WorkflowGraph<SearchState>> {
    let max_steps = deps.workflow.max_search_steps;
    WorkflowGraph::builder()
        .add_node(ModelCallNode::new(deps.clone()))
        .add_node(ToolRouterNode::new(deps))
        .add_edge("model_call", "route_tool")
        .entry("model_call")
        .max_steps(max_steps)
        .build()
}
