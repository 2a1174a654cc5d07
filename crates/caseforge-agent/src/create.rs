use std::sync::Arc;

use chrono::Local;
use futures::future::BoxFuture;
use tracing::{error, info};

use caseforge_core::error::Result;
use caseforge_core::types::ChatMessage;
use caseforge_workflow::{StepNode, StepOutcome, Transition};

use crate::collection::{clean_model_json, Variant};
use crate::prompts;
use crate::state::{RunPatch, RunState};
use crate::AgentDeps;

/// Generate a fresh collection from the specification in a single model call,
/// repair the free-text output, and persist it.
pub struct CreateCollectionNode {
    deps: Arc<AgentDeps>,
}

impl CreateCollectionNode {
    pub fn new(deps: Arc<AgentDeps>) -> Self {
        Self { deps }
    }

    async fn generate(&self, state: &RunState) -> Result<RunPatch> {
        let spec = std::fs::read_to_string(&state.spec_fpath)?;
        let date = Local::now().format("%Y-%m-%d").to_string();

        let messages = vec![
            ChatMessage::system(prompts::create_collection_prompt(&date)),
            ChatMessage::user(spec),
        ];
        let text = self
            .deps
            .model
            .complete(&self.deps.model_config, messages)
            .await?;

        let collection = clean_model_json(&text)?;
        let path = self.deps.store.save(&collection, Variant::Initial)?;
        info!(path = %path.display(), "Initial collection generated");

        Ok(RunPatch {
            generated_collection_fpath: Some(path),
            ..Default::default()
        })
    }
}

impl StepNode<RunState> for CreateCollectionNode {
    fn id(&self) -> &str {
        "create_collection"
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepOutcome<RunState>>> {
        Box::pin(async move {
            match self.generate(state).await {
                Ok(patch) => Ok(StepOutcome::new(patch, Transition::goto("upload"))),
                Err(e) => {
                    error!(error = %e, "Collection generation failed");
                    Ok(StepOutcome::finish(RunPatch::error(format!(
                        "collection generation failed: {e}"
                    ))))
                }
            }
        })
    }
}
