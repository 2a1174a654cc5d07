//! Workflow step nodes for API test-collection generation.
//!
//! The run graph validates the inbound specification, dispatches on the
//! requested task, runs the matching generation branch, and uploads the
//! produced collection. The data-enhancement branch nests a lookup pipeline
//! which in turn runs one model-driven search sub-workflow per lookup
//! request.

pub mod collection;
pub mod create;
pub mod dispatch;
pub mod enhance;
pub mod lookups;
pub mod prompts;
pub mod search;
pub mod state;
pub mod upload;
pub mod validate;

use std::sync::Arc;

use tracing::error;

use caseforge_core::config::{ModelConfig, WorkflowConfig};
use caseforge_core::error::Result;
use caseforge_core::traits::{ModelClient, Uploader};
use caseforge_core::types::{RunRequest, Status};
use caseforge_tools::ToolRegistry;
use caseforge_workflow::WorkflowGraph;

pub use collection::CollectionStore;
pub use state::RunState;
pub use upload::FsUploader;

/// Shared dependencies every step node draws from.
pub struct AgentDeps {
    pub model: Arc<dyn ModelClient>,
    pub model_config: ModelConfig,
    pub tools: Arc<ToolRegistry>,
    pub store: CollectionStore,
    pub uploader: Arc<dyn Uploader>,
    pub workflow: WorkflowConfig,
}

/// Assemble the top-level run graph.
pub fn build_run_graph(deps: Arc<AgentDeps>) -> Result<WorkflowGraph<RunState>> {
    let max_steps = deps.workflow.max_run_steps;
    WorkflowGraph::builder()
        .add_node(validate::ValidateSpecNode)
        .add_node(dispatch::DispatchNode)
        .add_node(create::CreateCollectionNode::new(deps.clone()))
        .add_node(enhance::EnhanceCollectionNode::new(deps.clone()))
        .add_node(lookups::DataLookupNode::new(deps.clone()))
        .add_node(enhance::EnhanceWithDataNode::new(deps.clone()))
        .add_node(upload::UploadNode::new(deps))
        .add_edge("validate_spec", "dispatch")
        .add_edge("data_lookup", "enhance_with_data")
        .entry("validate_spec")
        .max_steps(max_steps)
        .build()
}

/// Execute one run end to end. This never surfaces an error: every failure
/// mode lands in the returned state as `status = error` with a reasoning.
pub async fn run_request(deps: Arc<AgentDeps>, req: RunRequest) -> RunState {
    let graph = match build_run_graph(deps) {
        Ok(graph) => graph,
        Err(e) => {
            error!(error = %e, "Run graph construction failed");
            return RunState::errored(req, format!("workflow construction failed: {e}"));
        }
    };

    match graph.run(RunState::from_request(req.clone())).await {
        Ok(mut done) => {
            if done.status.is_none() {
                done.status = Some(Status::Error);
                done.reasoning = Some("run ended without a terminal status".into());
            }
            done
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            RunState::errored(req, format!("run failed: {e}"))
        }
    }
}
