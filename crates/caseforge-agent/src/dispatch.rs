use futures::future::BoxFuture;
use tracing::info;

use caseforge_core::error::Result;
use caseforge_core::types::{Status, Task};
use caseforge_workflow::{StepNode, StepOutcome, Transition};

use crate::state::{RunPatch, RunState};

/// Decide-then-go router: maps the requested task onto the branch that
/// implements it. Tasks that refine an existing collection are rejected here
/// when no collection path was supplied, before any model work starts.
pub struct DispatchNode;

impl StepNode<RunState> for DispatchNode {
    fn id(&self) -> &str {
        "dispatch"
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepOutcome<RunState>>> {
        Box::pin(async move {
            let outcome = match state.task {
                Task::CreateCollection => StepOutcome::route(Transition::goto("create_collection")),
                Task::EnhanceCollection | Task::EnhanceCollectionWithData
                    if state.existing_collection_fpath.is_none() =>
                {
                    StepOutcome::finish(RunPatch::error(format!(
                        "task '{}' requires an existing collection path",
                        state.task
                    )))
                }
                Task::EnhanceCollection => StepOutcome::route(Transition::goto("enhance_collection")),
                Task::EnhanceCollectionWithData => {
                    StepOutcome::route(Transition::goto("data_lookup"))
                }
                // The validation gate already ran; nothing left to do.
                Task::ValidateSpec => StepOutcome::finish(RunPatch::terminal(
                    Status::Success,
                    "specification passed validation",
                )),
                Task::Unknown => StepOutcome::finish(RunPatch::error(
                    "unrecognized task selector; no workflow branch matches",
                )),
            };
            info!(task = %state.task, "Dispatched run");
            Ok(outcome)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use caseforge_core::types::RunRequest;

    use super::*;

    fn state_for(task: Task, collection: Option<&str>) -> RunState {
        RunState::from_request(RunRequest {
            task,
            spec_fpath: PathBuf::from("spec.json"),
            api_name: "TFL".into(),
            existing_collection_fpath: collection.map(PathBuf::from),
            test_data_scenario: String::new(),
        })
    }

    async fn dispatch(state: &RunState) -> StepOutcome<RunState> {
        DispatchNode.run(state).await.unwrap()
    }

    #[tokio::test]
    async fn test_each_task_routes_to_its_branch() {
        let out = dispatch(&state_for(Task::CreateCollection, None)).await;
        assert_eq!(out.next, Transition::goto("create_collection"));

        let out = dispatch(&state_for(Task::EnhanceCollection, Some("c.json"))).await;
        assert_eq!(out.next, Transition::goto("enhance_collection"));

        let out = dispatch(&state_for(Task::EnhanceCollectionWithData, Some("c.json"))).await;
        assert_eq!(out.next, Transition::goto("data_lookup"));
    }

    #[tokio::test]
    async fn test_validate_only_terminates_successfully() {
        let out = dispatch(&state_for(Task::ValidateSpec, None)).await;
        assert_eq!(out.next, Transition::End);
        let patch = out.patch.unwrap();
        assert_eq!(patch.status, Some(Status::Success));
    }

    #[tokio::test]
    async fn test_unknown_task_is_a_terminal_error() {
        let out = dispatch(&state_for(Task::Unknown, None)).await;
        assert_eq!(out.next, Transition::End);
        let patch = out.patch.unwrap();
        assert_eq!(patch.status, Some(Status::Error));
        assert!(patch.reasoning.unwrap().contains("unrecognized"));
    }

    #[tokio::test]
    async fn test_enhance_without_collection_is_rejected() {
        for task in [Task::EnhanceCollection, Task::EnhanceCollectionWithData] {
            let out = dispatch(&state_for(task, None)).await;
            assert_eq!(out.next, Transition::End);
            assert_eq!(out.patch.unwrap().status, Some(Status::Error));
        }
    }
}
