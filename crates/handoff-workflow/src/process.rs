use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::WorkflowError;
use crate::graph::Graph;
use crate::guard::GuardEvaluator;
use crate::node::{Node, NodeType};
use crate::ProcessId;

/// A loaded process definition: its nodes, indexed by node id.
///
/// Construction does not validate; definitions loaded from storage are taken
/// as published. [`ProcessNodes::validate`] is what publishing runs.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessNodes {
  process_id: ProcessId,
  /// Nodes in declared order.
  nodes: Vec<Node>,
  #[serde(skip)]
  index: HashMap<String, usize>,
  #[serde(skip)]
  graph: Graph,
}

impl PartialEq for ProcessNodes {
  fn eq(&self, other: &Self) -> bool {
    self.process_id == other.process_id && self.nodes == other.nodes
  }
}

impl ProcessNodes {
  pub fn new(process_id: ProcessId, nodes: Vec<Node>) -> Self {
    let index = nodes
      .iter()
      .enumerate()
      .map(|(i, node)| (node.node_id.clone(), i))
      .collect();
    let graph = Graph::new(&nodes);

    Self {
      process_id,
      nodes,
      index,
      graph,
    }
  }

  pub fn process_id(&self) -> ProcessId {
    self.process_id
  }

  /// Nodes in declared order.
  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// Get a node by ID.
  pub fn get(&self, node_id: &str) -> Option<&Node> {
    self.index.get(node_id).map(|&i| &self.nodes[i])
  }

  /// Get a node by ID, failing with `NodeNotFound`.
  pub fn node(&self, node_id: &str) -> Result<&Node, WorkflowError> {
    self
      .get(node_id)
      .ok_or_else(|| WorkflowError::NodeNotFound(node_id.to_string()))
  }

  /// The definition's Start node.
  pub fn start_node(&self) -> Result<&Node, WorkflowError> {
    self
      .nodes
      .iter()
      .find(|n| n.node_type == NodeType::Start)
      .ok_or(WorkflowError::NoStartNode)
  }

  /// Number of incoming edges of a node.
  pub fn incoming(&self, node_id: &str) -> usize {
    self.graph.upstream(node_id).len()
  }

  /// Validate the definition graph.
  ///
  /// Checks that node ids are unique, there is exactly one Start node, every
  /// transition and rejection target exists, every node is reachable from
  /// Start, every Task node has assignees and every guard compiles.
  pub fn validate(&self, guards: &GuardEvaluator) -> Result<(), WorkflowError> {
    let mut seen = HashSet::new();
    for node in &self.nodes {
      if !seen.insert(node.node_id.as_str()) {
        return Err(WorkflowError::DuplicateNode(node.node_id.clone()));
      }
    }

    let starts = self
      .nodes
      .iter()
      .filter(|n| n.node_type == NodeType::Start)
      .count();
    match starts {
      0 => return Err(WorkflowError::NoStartNode),
      1 => {}
      count => return Err(WorkflowError::MultipleStartNodes { count }),
    }

    for node in &self.nodes {
      for transition in &node.outgoing {
        if self.get(&transition.target).is_none() {
          return Err(WorkflowError::InvalidTransition {
            from: node.node_id.clone(),
            to: transition.target.clone(),
          });
        }
        if let Some(guard) = &transition.guard {
          guards
            .check(guard)
            .map_err(|e| WorkflowError::InvalidGuard {
              from: node.node_id.clone(),
              to: transition.target.clone(),
              message: e.to_string(),
            })?;
        }
      }

      if let Some(target) = &node.reject_to {
        if self.get(target).is_none() {
          return Err(WorkflowError::InvalidTransition {
            from: node.node_id.clone(),
            to: target.clone(),
          });
        }
      }

      if node.is_task() && node.assignees.is_empty() {
        return Err(WorkflowError::NoAssignees(node.node_id.clone()));
      }
    }

    let start = self.start_node()?;
    let reachable = self.graph.reachable_from(&start.node_id);
    if let Some(orphan) = self
      .nodes
      .iter()
      .find(|n| !reachable.contains(&n.node_id))
    {
      return Err(WorkflowError::Unreachable(orphan.node_id.clone()));
    }

    Ok(())
  }
}
