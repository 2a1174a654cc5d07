use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{error, info, warn};

use caseforge_core::error::{ForgeError, Result};
use caseforge_core::types::{ChatMessage, Status, ToolOutcome};
use caseforge_tools::tables_from_rows;
use caseforge_workflow::{StepNode, StepOutcome, WorkflowGraph};

use crate::enhance::parse_string_array;
use crate::prompts;
use crate::search::build_search_graph;
use crate::state::{LookupPatch, LookupState, RunPatch, RunState, SearchState};
use crate::AgentDeps;

/// Outcome of one data-search sub-workflow run.
pub struct LookupResult {
    pub request: String,
    pub status: Status,
    pub reasoning: String,
    pub rows_json: Option<String>,
}

impl LookupResult {
    fn failed(request: String, reasoning: String) -> Self {
        Self {
            request,
            status: Status::Failed,
            reasoning,
            rows_json: None,
        }
    }
}

/// Render the aggregate lookup report. Successful lookups carry their rows;
/// failures are collected under a trailing section so a reader can see at a
/// glance what is missing.
pub fn format_lookup_report(results: &[LookupResult]) -> String {
    let mut out = String::new();
    let mut failures = Vec::new();

    for result in results {
        match result.status {
            Status::Found => {
                out.push_str(&format!(
                    "LOOKUP: {}\nSTATUS: found\nREASONING: {}\nROWS: {}\n\n",
                    result.request,
                    result.reasoning,
                    result.rows_json.as_deref().unwrap_or("[]"),
                ));
            }
            _ => failures.push(result),
        }
    }

    if !failures.is_empty() {
        out.push_str("FAILED LOOKUPS:\n");
        for result in failures {
            out.push_str(&format!("- {}: {}\n", result.request, result.reasoning));
        }
    }

    out
}

/// Plan which reference data the scenario needs looked up.
pub struct DeriveRequirementsNode {
    deps: Arc<AgentDeps>,
}

impl DeriveRequirementsNode {
    pub fn new(deps: Arc<AgentDeps>) -> Self {
        Self { deps }
    }
}

impl StepNode<LookupState> for DeriveRequirementsNode {
    fn id(&self) -> &str {
        "derive_requirements"
    }

    fn run<'a>(&'a self, state: &'a LookupState) -> BoxFuture<'a, Result<StepOutcome<LookupState>>> {
        Box::pin(async move {
            let response = self
                .deps
                .model
                .complete_structured(
                    &self.deps.model_config,
                    vec![ChatMessage::user(prompts::derive_requirements_prompt(
                        &state.test_data_scenario,
                    ))],
                    "lookup_requests",
                    &prompts::lookup_requests_schema(),
                )
                .await?;
            let requests = parse_string_array(&response, "data_to_lookup")?;
            info!(count = requests.len(), "Derived lookup requests");

            Ok(StepOutcome::advance(LookupPatch {
                lookup_requests: Some(requests),
                ..Default::default()
            }))
        })
    }
}

/// Fetch the queryable table inventory once, up front, so every search
/// sub-workflow starts with the same view.
pub struct ListSchemasNode {
    deps: Arc<AgentDeps>,
}

impl ListSchemasNode {
    pub fn new(deps: Arc<AgentDeps>) -> Self {
        Self { deps }
    }
}

impl StepNode<LookupState> for ListSchemasNode {
    fn id(&self) -> &str {
        "list_schemas"
    }

    fn run<'a>(&'a self, _state: &'a LookupState) -> BoxFuture<'a, Result<StepOutcome<LookupState>>> {
        Box::pin(async move {
            let outcome = self.deps.tools.execute("list_schemas", json!({})).await?;
            let tables = match outcome {
                ToolOutcome::Success { rows } => tables_from_rows(&rows),
                ToolOutcome::Error { message } => {
                    // Degraded, not fatal: searches run with an empty
                    // inventory and will report failed items.
                    warn!(error = %message, "Table listing failed");
                    Vec::new()
                }
            };
            info!(count = tables.len(), "Listed queryable tables");

            Ok(StepOutcome::advance(LookupPatch {
                tables: Some(tables),
                ..Default::default()
            }))
        })
    }
}

/// Run one search sub-workflow per lookup request and write the aggregate
/// report. A failing item never aborts the batch: it lands in the failed
/// section and the next item runs.
pub struct RunLookupsNode {
    deps: Arc<AgentDeps>,
}

impl RunLookupsNode {
    pub fn new(deps: Arc<AgentDeps>) -> Self {
        Self { deps }
    }

    async fn run_one(
        &self,
        graph: &WorkflowGraph<SearchState>,
        request: &str,
        state: &LookupState,
    ) -> LookupResult {
        let search = SearchState::new(request, state.tables.clone());
        match graph.run(search).await {
            Ok(done) => {
                // A found claim with no recorded query behind it carries no
                // data; demote it so the report never shows empty successes.
                if done.status == Status::Found && done.last_query_result.is_none() {
                    warn!(request, "Search reported found without executing a query");
                    return LookupResult::failed(
                        request.to_string(),
                        format!("reported found but never queried: {}", done.reasoning),
                    );
                }
                let rows_json = done
                    .last_query_result
                    .as_ref()
                    .and_then(|r| serde_json::to_string(&r.rows).ok());
                LookupResult {
                    request: request.to_string(),
                    status: done.status,
                    reasoning: done.reasoning,
                    rows_json,
                }
            }
            Err(ForgeError::StepBudgetExceeded(max)) => {
                warn!(request, max, "Search exhausted its step budget");
                LookupResult::failed(
                    request.to_string(),
                    format!("search did not converge within {max} steps"),
                )
            }
            Err(e) => {
                warn!(request, error = %e, "Search failed");
                LookupResult::failed(request.to_string(), e.to_string())
            }
        }
    }

    fn write_report(&self, results: &[LookupResult]) -> Result<PathBuf> {
        let dir = self.deps.store.artifacts_dir();
        std::fs::create_dir_all(dir).map_err(|e| ForgeError::Persist(e.to_string()))?;

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = dir.join(format!("lookups_result_{ts}.txt"));
        std::fs::write(&path, format_lookup_report(results))
            .map_err(|e| ForgeError::Persist(e.to_string()))?;
        Ok(path)
    }
}

impl StepNode<LookupState> for RunLookupsNode {
    fn id(&self) -> &str {
        "run_lookups"
    }

    fn run<'a>(&'a self, state: &'a LookupState) -> BoxFuture<'a, Result<StepOutcome<LookupState>>> {
        Box::pin(async move {
            let graph = build_search_graph(self.deps.clone())?;

            let mut results = Vec::with_capacity(state.lookup_requests.len());
            for request in &state.lookup_requests {
                let result = self.run_one(&graph, request, state).await;
                info!(request, status = %result.status, "Lookup finished");
                results.push(result);
            }

            let path = self.write_report(&results)?;
            info!(path = %path.display(), "Lookup report written");

            Ok(StepOutcome::advance(LookupPatch {
                data_fpath: Some(path),
                ..Default::default()
            }))
        })
    }
}

fn build_lookup_graph(deps: Arc<AgentDeps>) -> Result<WorkflowGraph<LookupState>> {
    WorkflowGraph::builder()
        .add_node(DeriveRequirementsNode::new(deps.clone()))
        .add_node(ListSchemasNode::new(deps.clone()))
        .add_node(RunLookupsNode::new(deps))
        .add_edge("derive_requirements", "list_schemas")
        .add_edge("list_schemas", "run_lookups")
        .entry("derive_requirements")
        .build()
}

/// The lookup pipeline exposed as a single node of the run graph. It runs the
/// inner graph on its own state and folds the declared outputs back into the
/// run state; any inner failure becomes a terminal run error.
pub struct DataLookupNode {
    deps: Arc<AgentDeps>,
}

impl DataLookupNode {
    pub fn new(deps: Arc<AgentDeps>) -> Self {
        Self { deps }
    }
}

impl StepNode<RunState> for DataLookupNode {
    fn id(&self) -> &str {
        "data_lookup"
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepOutcome<RunState>>> {
        Box::pin(async move {
            let inner = LookupState {
                test_data_scenario: state.test_data_scenario.clone(),
                ..Default::default()
            };
            let run = async {
                let graph = build_lookup_graph(self.deps.clone())?;
                graph.run(inner).await
            };
            match run.await {
                Ok(done) => Ok(StepOutcome::advance(RunPatch {
                    lookup_requests: Some(done.lookup_requests),
                    tables: Some(done.tables),
                    data_fpath: done.data_fpath,
                    ..Default::default()
                })),
                Err(e) => {
                    error!(error = %e, "Data lookup pipeline failed");
                    Ok(StepOutcome::finish(RunPatch::error(format!(
                        "data lookup failed: {e}"
                    ))))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_groups_failures_at_the_end() {
        let results = vec![
            LookupResult {
                request: "station pairs".into(),
                status: Status::Found,
                reasoning: "two rows from stations".into(),
                rows_json: Some(r#"[{"name":"Bank"}]"#.into()),
            },
            LookupResult::failed("oyster balances".into(), "no such table".into()),
            LookupResult {
                request: "line statuses".into(),
                status: Status::Found,
                reasoning: "three rows".into(),
                rows_json: Some("[]".into()),
            },
        ];

        let report = format_lookup_report(&results);
        assert!(report.contains("LOOKUP: station pairs"));
        assert!(report.contains(r#"ROWS: [{"name":"Bank"}]"#));
        assert!(report.contains("FAILED LOOKUPS:\n- oyster balances: no such table"));
        // Failures come after every successful entry.
        let failed_at = report.find("FAILED LOOKUPS:").unwrap();
        assert!(report.find("line statuses").unwrap() < failed_at);
    }

    #[test]
    fn test_report_without_failures_has_no_failed_section() {
        let results = vec![LookupResult {
            request: "modes".into(),
            status: Status::Found,
            reasoning: "ok".into(),
            rows_json: None,
        }];
        let report = format_lookup_report(&results);
        assert!(!report.contains("FAILED LOOKUPS"));
        assert!(report.contains("ROWS: []"));
    }
}
