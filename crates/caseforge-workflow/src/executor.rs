use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use caseforge_core::error::{ForgeError, Result};

use crate::node::{StepNode, Transition};
use crate::state::WorkflowState;

/// A directed graph of step nodes over a shared state type.
///
/// Execution starts at the entry node and follows each node's routing
/// decision: `Next` takes the node's static edge (or completes the run if
/// there is none), `Goto` jumps to a named node, `End` terminates. All graphs
/// here are constructed acyclic except for declared loops, so there is no
/// cycle detection — instead a whole-run step budget fails the run safely if
/// a loop does not converge.
pub struct WorkflowGraph<S: WorkflowState> {
    nodes: HashMap<String, Arc<dyn StepNode<S>>>,
    edges: HashMap<String, String>,
    entry: String,
    max_steps: usize,
}

/// Builder for a `WorkflowGraph`.
pub struct GraphBuilder<S: WorkflowState> {
    nodes: HashMap<String, Arc<dyn StepNode<S>>>,
    edges: HashMap<String, String>,
    entry: Option<String>,
    max_steps: usize,
}

impl<S: WorkflowState> GraphBuilder<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            max_steps: 32,
        }
    }

    /// Register a node. The first node added becomes the entry unless
    /// `entry()` names another.
    pub fn add_node(mut self, node: impl StepNode<S> + 'static) -> Self {
        let id = node.id().to_string();
        if self.entry.is_none() {
            self.entry = Some(id.clone());
        }
        self.nodes.insert(id, Arc::new(node));
        self
    }

    /// Declare a static edge: after `from` returns `Transition::Next`,
    /// execution continues at `to`.
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.insert(from.into(), to.into());
        self
    }

    /// Name the entry node explicitly.
    pub fn entry(mut self, id: impl Into<String>) -> Self {
        self.entry = Some(id.into());
        self
    }

    /// Cap the number of node executions for one run.
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn build(self) -> Result<WorkflowGraph<S>> {
        let entry = self
            .entry
            .ok_or_else(|| ForgeError::Config("workflow graph has no entry node".into()))?;
        if !self.nodes.contains_key(&entry) {
            return Err(ForgeError::NodeNotFound(entry));
        }
        for (from, to) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(ForgeError::NodeNotFound(from.clone()));
            }
            if !self.nodes.contains_key(to) {
                return Err(ForgeError::NodeNotFound(to.clone()));
            }
        }
        Ok(WorkflowGraph {
            nodes: self.nodes,
            edges: self.edges,
            entry,
            max_steps: self.max_steps,
        })
    }
}

impl<S: WorkflowState> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: WorkflowState> WorkflowGraph<S> {
    pub fn builder() -> GraphBuilder<S> {
        GraphBuilder::new()
    }

    /// Drive the graph to termination, returning the final state.
    pub async fn run(&self, mut state: S) -> Result<S> {
        let start = Instant::now();
        let mut current = self.entry.clone();
        let mut steps = 0usize;

        loop {
            if steps >= self.max_steps {
                warn!(
                    node = %current,
                    max_steps = self.max_steps,
                    "Step budget exhausted, terminating run"
                );
                return Err(ForgeError::StepBudgetExceeded(self.max_steps));
            }
            steps += 1;

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| ForgeError::NodeNotFound(current.clone()))?;

            debug!(node = %current, step = steps, "Executing workflow step");
            let node_start = Instant::now();
            let outcome = node.run(&state).await?;
            debug!(
                node = %current,
                elapsed_ms = node_start.elapsed().as_millis() as u64,
                "Step complete"
            );

            if let Some(patch) = outcome.patch {
                state.apply(patch);
            }

            match outcome.next {
                Transition::Next => match self.edges.get(&current) {
                    Some(next) => current = next.clone(),
                    None => {
                        debug!(node = %current, "No static edge, run complete");
                        break;
                    }
                },
                Transition::Goto(next) => {
                    if !self.nodes.contains_key(&next) {
                        return Err(ForgeError::NodeNotFound(next));
                    }
                    current = next;
                }
                Transition::End => break,
            }
        }

        info!(
            steps,
            total_elapsed_ms = start.elapsed().as_millis() as u64,
            "Workflow run complete"
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use caseforge_core::error::Result;

    use super::*;
    use crate::node::{StepOutcome, Transition};

    #[derive(Debug, Default, PartialEq)]
    struct Trace {
        visited: Vec<String>,
    }

    struct TracePatch(String);

    impl WorkflowState for Trace {
        type Patch = TracePatch;

        fn apply(&mut self, patch: TracePatch) {
            self.visited.push(patch.0);
        }
    }

    /// A node that records its visit and emits a fixed transition.
    struct Fixed {
        id: String,
        next: Transition,
    }

    impl Fixed {
        fn new(id: &str, next: Transition) -> Self {
            Self {
                id: id.into(),
                next,
            }
        }
    }

    impl StepNode<Trace> for Fixed {
        fn id(&self) -> &str {
            &self.id
        }

        fn run<'a>(&'a self, _state: &'a Trace) -> BoxFuture<'a, Result<StepOutcome<Trace>>> {
            Box::pin(async move {
                Ok(StepOutcome::new(TracePatch(self.id.clone()), self.next.clone()))
            })
        }
    }

    #[tokio::test]
    async fn test_static_edges_in_order() {
        let graph = WorkflowGraph::builder()
            .add_node(Fixed::new("a", Transition::Next))
            .add_node(Fixed::new("b", Transition::Next))
            .add_node(Fixed::new("c", Transition::End))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .build()
            .unwrap();

        let state = graph.run(Trace::default()).await.unwrap();
        assert_eq!(state.visited, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_goto_overrides_static_edge() {
        let graph = WorkflowGraph::builder()
            .add_node(Fixed::new("a", Transition::goto("c")))
            .add_node(Fixed::new("b", Transition::End))
            .add_node(Fixed::new("c", Transition::End))
            .add_edge("a", "b")
            .build()
            .unwrap();

        let state = graph.run(Trace::default()).await.unwrap();
        assert_eq!(state.visited, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_next_without_edge_completes() {
        let graph = WorkflowGraph::builder()
            .add_node(Fixed::new("only", Transition::Next))
            .build()
            .unwrap();

        let state = graph.run(Trace::default()).await.unwrap();
        assert_eq!(state.visited, vec!["only"]);
    }

    #[tokio::test]
    async fn test_step_budget_guards_cycles() {
        // a -> a forever; the budget must fail the run, not hang it.
        let graph = WorkflowGraph::builder()
            .add_node(Fixed::new("a", Transition::goto("a")))
            .max_steps(5)
            .build()
            .unwrap();

        let err = graph.run(Trace::default()).await.unwrap_err();
        assert!(matches!(err, ForgeError::StepBudgetExceeded(5)));
    }

    #[tokio::test]
    async fn test_goto_unknown_node_errors() {
        let graph = WorkflowGraph::builder()
            .add_node(Fixed::new("a", Transition::goto("ghost")))
            .build()
            .unwrap();

        let err = graph.run(Trace::default()).await.unwrap_err();
        assert!(matches!(err, ForgeError::NodeNotFound(name) if name == "ghost"));
    }

    #[test]
    fn test_builder_rejects_dangling_edge() {
        let err = WorkflowGraph::<Trace>::builder()
            .add_node(Fixed::new("a", Transition::End))
            .add_edge("a", "missing")
            .build()
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ForgeError::NodeNotFound(name) if name == "missing"));
    }

    #[test]
    fn test_builder_requires_entry() {
        let err = WorkflowGraph::<Trace>::builder().build().map(|_| ()).unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }
}
