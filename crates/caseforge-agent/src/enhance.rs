use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{error, info};

use caseforge_core::error::{ForgeError, Result};
use caseforge_core::types::{ChatMessage, Status};
use caseforge_workflow::{StepNode, StepOutcome, Transition};

use crate::collection::{last_item, merge_collections, Variant};
use crate::prompts;
use crate::state::{RunPatch, RunState};
use crate::AgentDeps;

/// Outcome of the planning call: either new cases to generate, or nothing
/// missing.
enum Plan {
    Cases(Vec<String>),
    AlreadyCovered,
}

/// Pull the string array out of a schema-constrained planning response.
pub(crate) fn parse_string_array(value: &Value, key: &str) -> Result<Vec<String>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .ok_or_else(|| ForgeError::ModelParse(format!("response missing '{key}' array")))
}

/// Pull generated item objects out of a schema-constrained generation
/// response.
fn parse_item_array(value: &Value) -> Result<Vec<Value>> {
    value
        .get("test_cases")
        .and_then(Value::as_array)
        .map(|items| items.to_vec())
        .ok_or_else(|| ForgeError::ModelParse("response missing 'test_cases' array".into()))
}

/// Shared generation tail of both enhancement branches: turn a generation
/// prompt into merged items and a persisted artifact.
async fn generate_and_merge(
    deps: &AgentDeps,
    prompt: String,
    existing: &Value,
    variant: Variant,
) -> Result<std::path::PathBuf> {
    let response = deps
        .model
        .complete_structured(
            &deps.model_config,
            vec![ChatMessage::user(prompt)],
            "test_case_items",
            &prompts::test_case_items_schema(),
        )
        .await?;
    let new_items = parse_item_array(&response)?;

    let merged = merge_collections(existing, &new_items);
    let path = deps.store.save(&merged, variant)?;
    info!(
        added = new_items.len(),
        path = %path.display(),
        "Enhanced collection saved"
    );
    Ok(path)
}

fn example_item_text(collection: &Value) -> String {
    last_item(collection)
        .map(|item| item.to_string())
        .unwrap_or_else(|| "{}".to_string())
}

/// Two-call enhancement: plan the missing test cases against the existing
/// collection, then generate concrete items for them and merge.
pub struct EnhanceCollectionNode {
    deps: Arc<AgentDeps>,
}

impl EnhanceCollectionNode {
    pub fn new(deps: Arc<AgentDeps>) -> Self {
        Self { deps }
    }

    async fn plan(&self, spec: &str, collection: &Value, requirement: &str) -> Result<Plan> {
        let response = self
            .deps
            .model
            .complete_structured(
                &self.deps.model_config,
                vec![ChatMessage::user(prompts::plan_test_cases_prompt(
                    spec,
                    &collection.to_string(),
                    requirement,
                ))],
                "planned_cases",
                &prompts::planned_cases_schema(),
            )
            .await?;
        let cases = parse_string_array(&response, "test_cases")?;
        if cases.is_empty() {
            Ok(Plan::AlreadyCovered)
        } else {
            Ok(Plan::Cases(cases))
        }
    }

    async fn enhance(&self, state: &RunState, existing_fpath: &Path) -> Result<StepOutcome<RunState>> {
        let spec = std::fs::read_to_string(&state.spec_fpath)?;
        let existing = self.deps.store.load(existing_fpath)?;

        let cases = match self
            .plan(&spec, &existing, &state.test_data_scenario)
            .await?
        {
            Plan::AlreadyCovered => {
                info!("Planning found no missing test cases");
                return Ok(StepOutcome::finish(RunPatch::terminal(
                    Status::Success,
                    "existing collection already covers the requirement; nothing generated",
                )));
            }
            Plan::Cases(cases) => cases,
        };

        let prompt = prompts::generate_test_cases_prompt(&example_item_text(&existing), &spec, &cases);
        let path = generate_and_merge(&self.deps, prompt, &existing, Variant::Enhanced).await?;

        Ok(StepOutcome::new(
            RunPatch {
                generated_collection_fpath: Some(path),
                ..Default::default()
            },
            Transition::goto("upload"),
        ))
    }
}

impl StepNode<RunState> for EnhanceCollectionNode {
    fn id(&self) -> &str {
        "enhance_collection"
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepOutcome<RunState>>> {
        Box::pin(async move {
            let Some(existing) = state.existing_collection_fpath.clone() else {
                return Ok(StepOutcome::finish(RunPatch::error(
                    "enhancement requires an existing collection path",
                )));
            };
            match self.enhance(state, &existing).await {
                Ok(outcome) => Ok(outcome),
                Err(e) => {
                    error!(error = %e, "Collection enhancement failed");
                    Ok(StepOutcome::finish(RunPatch::error(format!(
                        "collection enhancement failed: {e}"
                    ))))
                }
            }
        })
    }
}

/// Data-driven enhancement: the looked-up reference data drives a single
/// generation call, then the merge.
pub struct EnhanceWithDataNode {
    deps: Arc<AgentDeps>,
}

impl EnhanceWithDataNode {
    pub fn new(deps: Arc<AgentDeps>) -> Self {
        Self { deps }
    }

    async fn enhance(&self, state: &RunState) -> Result<StepOutcome<RunState>> {
        let existing_fpath = state
            .existing_collection_fpath
            .as_deref()
            .ok_or_else(|| ForgeError::SpecValidation("no existing collection path".into()))?;
        let data_fpath = state.data_fpath.as_deref().ok_or_else(|| {
            ForgeError::SpecValidation("no lookup results available for data enhancement".into())
        })?;

        let spec = std::fs::read_to_string(&state.spec_fpath)?;
        let data = std::fs::read_to_string(data_fpath)?;
        let existing = self.deps.store.load(existing_fpath)?;

        let prompt = prompts::data_test_cases_prompt(
            &example_item_text(&existing),
            &spec,
            &state.test_data_scenario,
            &data,
        );
        let path =
            generate_and_merge(&self.deps, prompt, &existing, Variant::EnhancedWithData).await?;

        Ok(StepOutcome::new(
            RunPatch {
                generated_collection_fpath: Some(path),
                ..Default::default()
            },
            Transition::goto("upload"),
        ))
    }
}

impl StepNode<RunState> for EnhanceWithDataNode {
    fn id(&self) -> &str {
        "enhance_with_data"
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepOutcome<RunState>>> {
        Box::pin(async move {
            match self.enhance(state).await {
                Ok(outcome) => Ok(outcome),
                Err(e) => {
                    error!(error = %e, "Data-driven enhancement failed");
                    Ok(StepOutcome::finish(RunPatch::error(format!(
                        "data-driven enhancement failed: {e}"
                    ))))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_string_array() {
        let value = json!({"test_cases": ["invalid mode", "expired oyster card"]});
        let cases = parse_string_array(&value, "test_cases").unwrap();
        assert_eq!(cases.len(), 2);

        let err = parse_string_array(&json!({"other": []}), "test_cases").unwrap_err();
        assert!(matches!(err, ForgeError::ModelParse(_)));
    }

    #[test]
    fn test_parse_item_array() {
        let value = json!({"test_cases": [{"name": "t1", "request": {}}]});
        assert_eq!(parse_item_array(&value).unwrap().len(), 1);
        assert!(parse_item_array(&json!({})).is_err());
    }

    #[test]
    fn test_example_item_falls_back_to_empty_object() {
        assert_eq!(example_item_text(&json!({"item": []})), "{}");
        let text = example_item_text(&json!({"item": [{"name": "t1"}]}));
        assert!(text.contains("t1"));
    }
}
