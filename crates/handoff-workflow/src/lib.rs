//! Handoff Workflow
//!
//! This crate provides the process definition model for handoff.
//! A process definition is a directed graph of typed nodes rooted at a
//! single Start node. Everything here is a pure value type or a pure
//! function: loading and persisting definitions belongs to `handoff-store`,
//! advancing instances belongs to `handoff-engine`.
//!
//! Key pieces:
//! - [`Node`], [`NodeType`], [`Transition`] describe the graph
//! - [`ProcessNodes`] is a loaded definition with lookup and start resolution
//! - [`Graph`] answers upstream/downstream/reachability questions
//! - [`GuardEvaluator`] evaluates transition guards and assignee templates
//! - [`Variables`] is the instance variable snapshot and its JSON codec
//! - [`ProcessResource`] is the caller-supplied definition document

mod error;
mod graph;
mod guard;
mod node;
mod process;
mod resource;
mod variables;

pub use error::{VariableError, WorkflowError};
pub use graph::Graph;
pub use guard::GuardEvaluator;
pub use node::{Node, NodeType, SplitMode, Transition};
pub use process::ProcessNodes;
pub use resource::ProcessResource;
pub use variables::Variables;

/// Identifier of a process definition (one published version).
pub type ProcessId = i64;
