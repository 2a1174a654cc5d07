use futures::future::BoxFuture;

use caseforge_core::error::Result;

use crate::state::WorkflowState;

/// Where execution goes after a node returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Follow the static edge declared for this node. If the node has no
    /// static edge, the run completes.
    Next,
    /// Route dynamically to a named node ("decide-then-go").
    Goto(String),
    /// Terminate the run.
    End,
}

impl Transition {
    pub fn goto(node: impl Into<String>) -> Self {
        Self::Goto(node.into())
    }
}

/// What a node hands back to the executor: an optional state patch plus the
/// routing decision.
pub struct StepOutcome<S: WorkflowState> {
    pub patch: Option<S::Patch>,
    pub next: Transition,
}

impl<S: WorkflowState> StepOutcome<S> {
    pub fn new(patch: S::Patch, next: Transition) -> Self {
        Self {
            patch: Some(patch),
            next,
        }
    }

    /// A routing-only outcome that leaves the state untouched.
    pub fn route(next: Transition) -> Self {
        Self { patch: None, next }
    }

    /// Patch the state and follow the static edge.
    pub fn advance(patch: S::Patch) -> Self {
        Self::new(patch, Transition::Next)
    }

    /// Patch the state and terminate the run.
    pub fn finish(patch: S::Patch) -> Self {
        Self::new(patch, Transition::End)
    }
}

/// A unit of work in a workflow graph.
///
/// A node reads the current state, performs bounded local work (a model call,
/// a tool call, file I/O — all awaited to completion before returning), and
/// reports a patch plus a routing decision. Side effects are the node's own
/// responsibility and are not transactional with the state transition.
pub trait StepNode<S: WorkflowState>: Send + Sync {
    /// Unique node id within its graph.
    fn id(&self) -> &str;

    /// Execute this node against the current state.
    fn run<'a>(&'a self, state: &'a S) -> BoxFuture<'a, Result<StepOutcome<S>>>;
}
