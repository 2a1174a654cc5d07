//! Workflow graph engine — typed multi-step orchestration.
//!
//! A workflow is a directed graph of `StepNode`s over one `WorkflowState`
//! type. Each node reads the state, does bounded local work, and returns a
//! state patch plus a `Transition`: follow the static edge, jump to a named
//! node, or terminate. A whole graph can itself be wrapped in a node of an
//! outer graph, which is how the data-lookup sub-workflow composes.

pub mod executor;
pub mod node;
pub mod state;

pub use executor::{GraphBuilder, WorkflowGraph};
pub use node::{StepNode, StepOutcome, Transition};
pub use state::WorkflowState;
