use std::collections::{HashMap, HashSet, VecDeque};

use crate::Node;

/// Graph structure for traversal and analysis.
///
/// Built from the nodes' outgoing transitions only; rejection targets are
/// not edges of the graph.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: node_id -> list of downstream node_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node_id -> list of upstream node_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Nodes with multiple incoming edges (join points).
  join_points: HashSet<String>,
}

impl Graph {
  /// Build a graph from a definition's nodes.
  pub fn new<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for node in nodes {
      adjacency.entry(node.node_id.clone()).or_default();
      reverse_adjacency.entry(node.node_id.clone()).or_default();

      for transition in &node.outgoing {
        adjacency
          .entry(node.node_id.clone())
          .or_default()
          .push(transition.target.clone());
        reverse_adjacency
          .entry(transition.target.clone())
          .or_default()
          .push(node.node_id.clone());
      }
    }

    let join_points: HashSet<String> = reverse_adjacency
      .iter()
      .filter(|(_, incoming)| incoming.len() > 1)
      .map(|(id, _)| id.clone())
      .collect();

    Self {
      adjacency,
      reverse_adjacency,
      join_points,
    }
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Check if a node is a join point (has multiple incoming edges).
  pub fn is_join_point(&self, node_id: &str) -> bool {
    self.join_points.contains(node_id)
  }

  /// All node ids reachable from `from`, including `from` itself.
  pub fn reachable_from(&self, from: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([from.to_string()]);

    while let Some(id) = queue.pop_front() {
      if !seen.insert(id.clone()) {
        continue;
      }
      for next in self.downstream(&id) {
        if !seen.contains(next) {
          queue.push_back(next.clone());
        }
      }
    }

    seen
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::SplitMode;

  fn diamond() -> Vec<Node> {
    vec![
      Node::start("start").then("split"),
      Node::gateway("split", SplitMode::Parallel)
        .then("a")
        .then("b"),
      Node::task("a", &["u1"]).then("join"),
      Node::task("b", &["u2"]).then("join"),
      Node::gateway("join", SplitMode::Parallel).then("end"),
      Node::end("end"),
      Node::end("orphan"),
    ]
  }

  #[test]
  fn test_upstream_and_downstream() {
    let nodes = diamond();
    let graph = Graph::new(&nodes);

    assert_eq!(graph.downstream("split"), &["a".to_string(), "b".to_string()]);
    assert_eq!(graph.upstream("join"), &["a".to_string(), "b".to_string()]);
    assert!(graph.upstream("start").is_empty());
    assert!(graph.downstream("unknown").is_empty());
  }

  #[test]
  fn test_join_points() {
    let nodes = diamond();
    let graph = Graph::new(&nodes);

    assert!(graph.is_join_point("join"));
    assert!(!graph.is_join_point("split"));
  }

  #[test]
  fn test_reachable_from_start() {
    let nodes = diamond();
    let graph = Graph::new(&nodes);

    let reachable = graph.reachable_from("start");
    assert_eq!(reachable.len(), 6);
    assert!(!reachable.contains("orphan"));
  }
}
