//! The definition document callers publish.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "node_id": "start", "node_type": "start", "outgoing": [{ "target": "lead" }] },
//!     { "node_id": "lead", "node_name": "Team lead", "node_type": "task",
//!       "assignees": ["{{ lead }}"], "reject_to": "start",
//!       "outgoing": [{ "target": "hr", "guard": "days | int > 3" }, { "target": "end" }] },
//!     { "node_id": "hr", "node_type": "task", "assignees": ["u-hr"], "outgoing": [{ "target": "end" }] },
//!     { "node_id": "end", "node_type": "end" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::guard::GuardEvaluator;
use crate::node::Node;
use crate::process::ProcessNodes;
use crate::ProcessId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResource {
  pub nodes: Vec<Node>,
}

impl ProcessResource {
  pub fn parse(json: &str) -> Result<Self, WorkflowError> {
    serde_json::from_str(json).map_err(WorkflowError::InvalidResource)
  }

  /// Validate the document as a definition graph.
  pub fn validate(&self, guards: &GuardEvaluator) -> Result<(), WorkflowError> {
    ProcessNodes::new(0, self.nodes.clone()).validate(guards)
  }

  /// Bind every node to the definition identifier the store assigned.
  pub fn into_nodes(self, process_id: ProcessId) -> Vec<Node> {
    self
      .nodes
      .into_iter()
      .map(|mut node| {
        node.process_id = process_id;
        node
      })
      .collect()
  }
}
