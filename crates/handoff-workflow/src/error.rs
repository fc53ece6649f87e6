use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("node not found: {0}")]
  NodeNotFound(String),

  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("transition references unknown node: from={from}, to={to}")]
  InvalidTransition { from: String, to: String },

  #[error("definition has no start node")]
  NoStartNode,

  #[error("definition has {count} start nodes, expected exactly one")]
  MultipleStartNodes { count: usize },

  #[error("node '{0}' is not reachable from the start node")]
  Unreachable(String),

  #[error("task node '{0}' has no assignees")]
  NoAssignees(String),

  #[error("task node '{0}' declares no rejection target")]
  NoRejectTarget(String),

  #[error("no outgoing transition of node '{0}' is satisfied")]
  NoTransition(String),

  #[error("invalid guard on transition {from} -> {to}: {message}")]
  InvalidGuard {
    from: String,
    to: String,
    message: String,
  },

  #[error("failed to evaluate guard '{expression}'")]
  GuardEvaluation {
    expression: String,
    #[source]
    source: minijinja::Error,
  },

  #[error("failed to render assignee '{template}' of node '{node_id}'")]
  AssigneeTemplate {
    node_id: String,
    template: String,
    #[source]
    source: minijinja::Error,
  },

  #[error("assignee '{template}' of node '{node_id}' resolved to an empty user id")]
  UnresolvedAssignee { node_id: String, template: String },

  #[error("invalid definition resource")]
  InvalidResource(#[source] serde_json::Error),
}

/// Errors converting between the in-memory variable mapping and its JSON form.
#[derive(Debug, Error)]
pub enum VariableError {
  #[error("variables must be a JSON object of strings")]
  Malformed(#[source] serde_json::Error),

  #[error("failed to encode variables")]
  Encode(#[source] serde_json::Error),
}
