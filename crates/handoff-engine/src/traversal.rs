//! Token planning.
//!
//! A [`Planner`] takes an instance's token multiset and moves tokens through
//! the definition graph in memory. Nothing here touches the store; the
//! resulting [`Plan`] is what one atomic `Store::advance` writes.
//!
//! Entry rules:
//! - Start: the token moves straight on along the first satisfied transition.
//! - Task: the token parks on the node and one Pending task is created per
//!   resolved assignee.
//! - Gateway (exclusive): first satisfied transition.
//! - Gateway (parallel): every satisfied transition. With more than one
//!   incoming edge the gateway is a join; arriving tokens wait on it until
//!   one has arrived per incoming edge, then merge and fan out.
//! - End: the token is consumed.
//!
//! A rejection rewinds before it re-enters: tokens that the re-entry will
//! produce again are removed first, so a join never counts a stale arrival.

use std::collections::{HashMap, VecDeque};

use handoff_store::{InstanceId, NewTask, TaskStatus};
use handoff_workflow::{
  GuardEvaluator, Node, NodeType, ProcessNodes, SplitMode, Variables, WorkflowError,
};

use crate::error::EngineError;

/// Outcome of planning: where the tokens are and which tasks to create.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Plan {
  pub tokens: Vec<String>,
  pub tasks: Vec<NewTask>,
}

impl Plan {
  pub fn is_finished(&self) -> bool {
    self.tokens.is_empty()
  }
}

pub(crate) struct Planner<'a> {
  instance_id: InstanceId,
  nodes: &'a ProcessNodes,
  guards: &'a GuardEvaluator,
  variables: &'a Variables,
  max_steps: usize,
  steps: usize,
  tokens: Vec<String>,
  tasks: Vec<NewTask>,
}

impl<'a> Planner<'a> {
  pub fn new(
    instance_id: InstanceId,
    nodes: &'a ProcessNodes,
    guards: &'a GuardEvaluator,
    variables: &'a Variables,
    tokens: Vec<String>,
    max_steps: usize,
  ) -> Self {
    Self {
      instance_id,
      nodes,
      guards,
      variables,
      max_steps,
      steps: 0,
      tokens,
      tasks: Vec::new(),
    }
  }

  /// Remove one token from a node. Returns false when none sits there.
  pub fn take_token(&mut self, node_id: &str) -> bool {
    match self.tokens.iter().position(|t| t == node_id) {
      Some(i) => {
        self.tokens.remove(i);
        true
      }
      None => false,
    }
  }

  /// Move a token out of `node` along its outgoing transitions.
  ///
  /// A Task node without outgoing transitions consumes the token.
  pub fn leave(&mut self, node: &Node) -> Result<(), EngineError> {
    if node.outgoing.is_empty() && node.is_task() {
      return Ok(());
    }
    let targets = self.route(node)?;
    self.enter_all(targets)
  }

  /// Remove the tokens that entering `target` will produce again.
  ///
  /// Every token on a node reachable from `target` is dropped, except that a
  /// parallel join keeps up to one parked token per incoming edge whose
  /// source lies outside that region. Returns the nodes that lost tokens.
  pub fn rewind(&mut self, target: &str) -> Vec<String> {
    let nodes = self.nodes;
    let graph = nodes.graph();
    let region = graph.reachable_from(target);

    let mut kept: HashMap<&str, usize> = HashMap::new();
    for node_id in &region {
      let Some(node) = nodes.get(node_id) else {
        continue;
      };
      if node.node_type == NodeType::Gateway
        && node.split == SplitMode::Parallel
        && graph.is_join_point(node_id)
      {
        let outside = graph
          .upstream(node_id)
          .iter()
          .filter(|source| !region.contains(*source))
          .count();
        kept.insert(node_id.as_str(), outside);
      }
    }

    let mut cleared = Vec::new();
    self.tokens.retain(|token| {
      if !region.contains(token) {
        return true;
      }
      if let Some(left) = kept.get_mut(token.as_str()) {
        if *left > 0 {
          *left -= 1;
          return true;
        }
      }
      if !cleared.contains(token) {
        cleared.push(token.clone());
      }
      false
    });
    cleared
  }

  /// Send a token into `node_id` and follow automatic nodes from there.
  pub fn enter(&mut self, node_id: &str) -> Result<(), EngineError> {
    self.enter_all(vec![node_id.to_string()])
  }

  pub fn finish(self) -> Plan {
    Plan {
      tokens: self.tokens,
      tasks: self.tasks,
    }
  }

  fn enter_all(&mut self, targets: Vec<String>) -> Result<(), EngineError> {
    let nodes = self.nodes;
    let mut queue: VecDeque<String> = targets.into();

    while let Some(node_id) = queue.pop_front() {
      self.steps += 1;
      if self.steps > self.max_steps {
        return Err(EngineError::TraversalLimit {
          limit: self.max_steps,
        });
      }

      let node = nodes.node(&node_id).map_err(|e| self.routing(&node_id, e))?;

      match node.node_type {
        NodeType::Start => queue.extend(self.route(node)?),
        NodeType::Task => {
          let assignees = self
            .guards
            .resolve_assignees(node, self.variables)
            .map_err(|e| self.routing(&node.node_id, e))?;
          for assignee_id in assignees {
            self.tasks.push(NewTask {
              node_id: node.node_id.clone(),
              node_name: node.node_name.clone(),
              assignee_id,
              status: TaskStatus::Pending,
              comment: None,
            });
          }
          self.tokens.push(node.node_id.clone());
        }
        NodeType::Gateway => {
          if node.split == SplitMode::Parallel {
            let incoming = nodes.incoming(&node.node_id);
            if incoming > 1 {
              self.tokens.push(node.node_id.clone());
              let arrived = self.tokens.iter().filter(|t| **t == node.node_id).count();
              if arrived < incoming {
                continue;
              }
              self.tokens.retain(|t| *t != node.node_id);
            }
          }
          queue.extend(self.route(node)?);
        }
        NodeType::End => {}
      }
    }

    Ok(())
  }

  /// Targets a token leaving `node` moves to.
  fn route(&self, node: &Node) -> Result<Vec<String>, EngineError> {
    let targets = if node.node_type == NodeType::Gateway && node.split == SplitMode::Parallel {
      self
        .guards
        .satisfied_targets(node, self.variables)
        .map_err(|e| self.routing(&node.node_id, e))?
    } else {
      self
        .guards
        .first_satisfied(node, self.variables)
        .map_err(|e| self.routing(&node.node_id, e))?
        .into_iter()
        .collect()
    };

    if targets.is_empty() {
      return Err(self.routing(
        &node.node_id,
        WorkflowError::NoTransition(node.node_id.clone()),
      ));
    }

    Ok(targets.into_iter().map(str::to_string).collect())
  }

  fn routing(&self, node_id: &str, source: WorkflowError) -> EngineError {
    EngineError::Routing {
      instance_id: self.instance_id,
      node_id: node_id.to_string(),
      source,
    }
  }
}
