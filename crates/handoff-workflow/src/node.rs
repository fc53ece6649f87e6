use serde::{Deserialize, Serialize};

use crate::ProcessId;

/// Kind of a node in a process definition.
///
/// The integer codes are what the store persists; Start is `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
  Start,
  Task,
  Gateway,
  End,
}

impl NodeType {
  pub fn code(self) -> i64 {
    match self {
      NodeType::Start => 0,
      NodeType::Task => 1,
      NodeType::Gateway => 2,
      NodeType::End => 3,
    }
  }

  pub fn from_code(code: i64) -> Option<Self> {
    match code {
      0 => Some(NodeType::Start),
      1 => Some(NodeType::Task),
      2 => Some(NodeType::Gateway),
      3 => Some(NodeType::End),
      _ => None,
    }
  }
}

/// How a gateway picks among its satisfied outgoing transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
  /// First satisfied transition in declared order wins.
  #[default]
  Exclusive,
  /// Every satisfied transition gets a token. With more than one incoming
  /// edge the gateway also joins: it waits for a token on each of them.
  Parallel,
}

/// An outgoing edge of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
  pub target: String,
  /// Guard expression over the instance variables. `None` always passes.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub guard: Option<String>,
}

impl Transition {
  pub fn to(target: impl Into<String>) -> Self {
    Self {
      target: target.into(),
      guard: None,
    }
  }

  pub fn when(target: impl Into<String>, guard: impl Into<String>) -> Self {
    Self {
      target: target.into(),
      guard: Some(guard.into()),
    }
  }
}

/// A vertex of a process definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
  pub node_id: String,
  /// Owning definition. Assigned by the store when the definition is saved.
  #[serde(default)]
  pub process_id: ProcessId,
  #[serde(default)]
  pub node_name: String,
  pub node_type: NodeType,
  #[serde(default)]
  pub outgoing: Vec<Transition>,
  /// User templates for Task nodes, rendered against instance variables.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub assignees: Vec<String>,
  /// Where a rejected Task sends its token.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reject_to: Option<String>,
  /// Task nodes: every assignee has to pass before the token moves on.
  #[serde(default)]
  pub countersign: bool,
  #[serde(default)]
  pub split: SplitMode,
}

impl Node {
  fn new(node_id: impl Into<String>, node_type: NodeType) -> Self {
    let node_id = node_id.into();
    Self {
      node_name: node_id.clone(),
      node_id,
      process_id: 0,
      node_type,
      outgoing: Vec::new(),
      assignees: Vec::new(),
      reject_to: None,
      countersign: false,
      split: SplitMode::Exclusive,
    }
  }

  pub fn start(node_id: impl Into<String>) -> Self {
    Self::new(node_id, NodeType::Start)
  }

  pub fn task(node_id: impl Into<String>, assignees: &[&str]) -> Self {
    let mut node = Self::new(node_id, NodeType::Task);
    node.assignees = assignees.iter().map(|a| a.to_string()).collect();
    node
  }

  pub fn gateway(node_id: impl Into<String>, split: SplitMode) -> Self {
    let mut node = Self::new(node_id, NodeType::Gateway);
    node.split = split;
    node
  }

  pub fn end(node_id: impl Into<String>) -> Self {
    Self::new(node_id, NodeType::End)
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.node_name = name.into();
    self
  }

  pub fn with_transition(mut self, transition: Transition) -> Self {
    self.outgoing.push(transition);
    self
  }

  /// Append an unguarded transition.
  pub fn then(self, target: impl Into<String>) -> Self {
    self.with_transition(Transition::to(target))
  }

  pub fn reject_to(mut self, target: impl Into<String>) -> Self {
    self.reject_to = Some(target.into());
    self
  }

  pub fn countersigned(mut self) -> Self {
    self.countersign = true;
    self
  }

  pub fn is_task(&self) -> bool {
    self.node_type == NodeType::Task
  }
}
