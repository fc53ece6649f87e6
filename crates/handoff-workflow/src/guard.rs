//! Guard and assignee evaluation.
//!
//! Guards are minijinja expressions evaluated against the instance
//! variables, e.g. `days | int > 3` or `approved == "yes"`. Every variable
//! is a string, so numeric comparisons go through the `int`/`float` filters.
//! Assignees are minijinja templates (`{{ manager }}`) rendered against the
//! same variables; a literal user id is a template without placeholders.

use minijinja::Environment;

use crate::error::WorkflowError;
use crate::node::{Node, Transition};
use crate::variables::Variables;

pub struct GuardEvaluator {
  env: Environment<'static>,
}

impl GuardEvaluator {
  pub fn new() -> Self {
    Self {
      env: Environment::new(),
    }
  }

  /// Check that a guard expression parses.
  pub fn check(&self, expression: &str) -> Result<(), minijinja::Error> {
    self.env.compile_expression(expression).map(|_| ())
  }

  /// Whether a transition may be taken with the given variables.
  pub fn is_satisfied(
    &self,
    transition: &Transition,
    variables: &Variables,
  ) -> Result<bool, WorkflowError> {
    let Some(expression) = transition.guard.as_deref() else {
      return Ok(true);
    };

    let to_error = |source: minijinja::Error| WorkflowError::GuardEvaluation {
      expression: expression.to_string(),
      source,
    };

    let compiled = self.env.compile_expression(expression).map_err(to_error)?;
    let value = compiled.eval(variables.as_map()).map_err(to_error)?;
    Ok(value.is_true())
  }

  /// Targets of the node's outgoing transitions whose guards hold, in
  /// declared order.
  pub fn satisfied_targets<'n>(
    &self,
    node: &'n Node,
    variables: &Variables,
  ) -> Result<Vec<&'n str>, WorkflowError> {
    let mut targets = Vec::new();
    for transition in &node.outgoing {
      if self.is_satisfied(transition, variables)? {
        targets.push(transition.target.as_str());
      }
    }
    Ok(targets)
  }

  /// First satisfied target in declared order.
  pub fn first_satisfied<'n>(
    &self,
    node: &'n Node,
    variables: &Variables,
  ) -> Result<Option<&'n str>, WorkflowError> {
    for transition in &node.outgoing {
      if self.is_satisfied(transition, variables)? {
        return Ok(Some(transition.target.as_str()));
      }
    }
    Ok(None)
  }

  /// Render a Task node's assignee templates into user ids.
  ///
  /// Duplicates collapse so one user never holds two tasks for the same
  /// node entry.
  pub fn resolve_assignees(
    &self,
    node: &Node,
    variables: &Variables,
  ) -> Result<Vec<String>, WorkflowError> {
    let mut users: Vec<String> = Vec::with_capacity(node.assignees.len());

    for template in &node.assignees {
      let rendered = self
        .env
        .render_str(template, variables.as_map())
        .map_err(|source| WorkflowError::AssigneeTemplate {
          node_id: node.node_id.clone(),
          template: template.clone(),
          source,
        })?;

      let user = rendered.trim();
      if user.is_empty() {
        return Err(WorkflowError::UnresolvedAssignee {
          node_id: node.node_id.clone(),
          template: template.clone(),
        });
      }
      if !users.iter().any(|u| u == user) {
        users.push(user.to_string());
      }
    }

    Ok(users)
  }
}

impl Default for GuardEvaluator {
  fn default() -> Self {
    Self::new()
  }
}
