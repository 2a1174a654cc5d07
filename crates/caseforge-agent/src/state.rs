use std::path::PathBuf;

use serde::Serialize;

use caseforge_core::types::{ChatMessage, QueryRecord, RunRequest, Status, TableInfo, Task};
use caseforge_workflow::WorkflowState;

/// State of one top-level run, created from the inbound request and mutated
/// additively by each step.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    pub task: Task,
    pub spec_fpath: PathBuf,
    pub api_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_collection_fpath: Option<PathBuf>,
    pub test_data_scenario: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_requests: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<TableInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_fpath: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_collection_fpath: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl RunState {
    pub fn from_request(req: RunRequest) -> Self {
        Self {
            task: req.task,
            spec_fpath: req.spec_fpath,
            api_name: req.api_name,
            existing_collection_fpath: req.existing_collection_fpath,
            test_data_scenario: req.test_data_scenario,
            lookup_requests: None,
            tables: None,
            data_fpath: None,
            generated_collection_fpath: None,
            status: None,
            reasoning: None,
        }
    }

    /// Terminal error state built outside the graph (request rejected before
    /// or while running).
    pub fn errored(req: RunRequest, reasoning: impl Into<String>) -> Self {
        let mut state = Self::from_request(req);
        state.status = Some(Status::Error);
        state.reasoning = Some(reasoning.into());
        state
    }
}

/// Additive update to a `RunState`. `None` fields leave the state untouched.
#[derive(Debug, Default)]
pub struct RunPatch {
    pub lookup_requests: Option<Vec<String>>,
    pub tables: Option<Vec<TableInfo>>,
    pub data_fpath: Option<PathBuf>,
    pub generated_collection_fpath: Option<PathBuf>,
    pub status: Option<Status>,
    pub reasoning: Option<String>,
}

impl RunPatch {
    /// Terminal patch: status plus the mandatory reasoning.
    pub fn terminal(status: Status, reasoning: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            reasoning: Some(reasoning.into()),
            ..Default::default()
        }
    }

    pub fn error(reasoning: impl Into<String>) -> Self {
        Self::terminal(Status::Error, reasoning)
    }
}

impl WorkflowState for RunState {
    type Patch = RunPatch;

    fn apply(&mut self, patch: RunPatch) {
        if let Some(v) = patch.lookup_requests {
            self.lookup_requests = Some(v);
        }
        if let Some(v) = patch.tables {
            self.tables = Some(v);
        }
        if let Some(v) = patch.data_fpath {
            self.data_fpath = Some(v);
        }
        if let Some(v) = patch.generated_collection_fpath {
            self.generated_collection_fpath = Some(v);
        }
        if let Some(v) = patch.status {
            self.status = Some(v);
        }
        if let Some(v) = patch.reasoning {
            self.reasoning = Some(v);
        }
    }
}

/// State of the data-lookup pipeline (the inner graph the data-enhancement
/// branch runs). Only the declared output fields are folded back into the
/// outer run state.
#[derive(Debug, Clone, Default)]
pub struct LookupState {
    pub test_data_scenario: String,
    pub lookup_requests: Vec<String>,
    pub tables: Vec<TableInfo>,
    pub data_fpath: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct LookupPatch {
    pub lookup_requests: Option<Vec<String>>,
    pub tables: Option<Vec<TableInfo>>,
    pub data_fpath: Option<PathBuf>,
}

impl WorkflowState for LookupState {
    type Patch = LookupPatch;

    fn apply(&mut self, patch: LookupPatch) {
        if let Some(v) = patch.lookup_requests {
            self.lookup_requests = v;
        }
        if let Some(v) = patch.tables {
            self.tables = v;
        }
        if let Some(v) = patch.data_fpath {
            self.data_fpath = Some(v);
        }
    }
}

/// State of one data-search sub-workflow: a single lookup request resolved
/// against the data source through model-chosen tool calls.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub lookup_query: String,
    pub all_tables: Vec<TableInfo>,
    /// Interaction history, append-only.
    pub messages: Vec<ChatMessage>,
    pub status: Status,
    pub reasoning: String,
    pub last_query_result: Option<QueryRecord>,
}

impl SearchState {
    pub fn new(lookup_query: impl Into<String>, all_tables: Vec<TableInfo>) -> Self {
        Self {
            lookup_query: lookup_query.into(),
            all_tables,
            messages: Vec::new(),
            status: Status::Searching,
            reasoning: String::new(),
            last_query_result: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SearchPatch {
    /// Appended to the history, never replacing it.
    pub messages: Vec<ChatMessage>,
    pub status: Option<Status>,
    pub reasoning: Option<String>,
    pub last_query_result: Option<QueryRecord>,
}

impl SearchPatch {
    pub fn push(message: ChatMessage) -> Self {
        Self {
            messages: vec![message],
            ..Default::default()
        }
    }

    pub fn terminal(status: Status, reasoning: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            reasoning: Some(reasoning.into()),
            ..Default::default()
        }
    }
}

impl WorkflowState for SearchState {
    type Patch = SearchPatch;

    fn apply(&mut self, patch: SearchPatch) {
        self.messages.extend(patch.messages);
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.reasoning {
            self.reasoning = v;
        }
        if let Some(v) = patch.last_query_result {
            self.last_query_result = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use caseforge_core::types::Role;

    use super::*;

    fn request() -> RunRequest {
        RunRequest {
            task: Task::CreateCollection,
            spec_fpath: PathBuf::from("spec.json"),
            api_name: "TFL".into(),
            existing_collection_fpath: None,
            test_data_scenario: String::new(),
        }
    }

    #[test]
    fn test_run_patch_merges_not_replaces() {
        let mut state = RunState::from_request(request());
        state.apply(RunPatch {
            tables: Some(vec![TableInfo::new("stations", "tube stations")]),
            ..Default::default()
        });
        state.apply(RunPatch {
            data_fpath: Some(PathBuf::from("artifacts/lookups.txt")),
            ..Default::default()
        });

        // Earlier fields survive later patches that do not own them.
        assert!(state.tables.is_some());
        assert!(state.data_fpath.is_some());
        assert!(state.status.is_none());
    }

    #[test]
    fn test_error_patch_carries_reasoning() {
        let mut state = RunState::from_request(request());
        state.apply(RunPatch::error("spec file unreadable"));
        assert_eq!(state.status, Some(Status::Error));
        assert_eq!(state.reasoning.as_deref(), Some("spec file unreadable"));
    }

    #[test]
    fn test_search_history_is_append_only() {
        let mut state = SearchState::new("station pairs", vec![]);
        state.apply(SearchPatch::push(ChatMessage::user("first")));
        state.apply(SearchPatch::push(ChatMessage::assistant("second", vec![])));

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, Role::User);
        assert_eq!(state.messages[1].role, Role::Assistant);
        assert_eq!(state.status, Status::Searching);
    }
}
