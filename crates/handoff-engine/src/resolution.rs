//! Task resolution: pass and reject.
//!
//! A resolution is planned against a snapshot of the instance and written
//! with one `Store::advance`. The store checks the task is still Pending
//! before anything else, so of two concurrent resolutions of the same task
//! exactly one succeeds and the other sees `AlreadyResolved`. When another
//! task of the same instance moved the instance first, the store reports a
//! revision conflict and the resolution is planned again on fresh state.
//!
//! A reject rewinds the region its target leads into. Tokens in that region
//! are dropped and their Pending tasks cancelled before the target is
//! entered again.

use handoff_store::{
  Advance, InstanceId, InstanceStatus, TaskId, TaskResolution, TaskStatus,
};
use handoff_workflow::{Variables, WorkflowError};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::engine::ProcessEngine;
use crate::error::EngineError;
use crate::traversal::Planner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
  Pass,
  Reject,
}

impl Action {
  fn task_status(self) -> TaskStatus {
    match self {
      Action::Pass => TaskStatus::Passed,
      Action::Reject => TaskStatus::Rejected,
    }
  }
}

/// What a successful pass or reject did to the instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
  pub task_id: TaskId,
  pub instance_id: InstanceId,
  pub status: InstanceStatus,
  /// Token positions after the resolution.
  pub current_nodes: Vec<String>,
  pub created_tasks: Vec<TaskId>,
  pub cancelled_tasks: Vec<TaskId>,
}

impl ProcessEngine {
  /// Approve a Pending task.
  ///
  /// `variables` are merged into the instance's variables before the node's
  /// outgoing guards are evaluated. On a countersigned node the token only
  /// moves once every sibling task has passed.
  pub async fn pass_task(
    &self,
    task_id: TaskId,
    comment: &str,
    variables: Variables,
  ) -> Result<Resolution, EngineError> {
    self.resolve(task_id, Action::Pass, comment, variables).await
  }

  /// Reject a Pending task, sending the token to the node's rejection
  /// target.
  pub async fn reject_task(
    &self,
    task_id: TaskId,
    comment: &str,
    variables: Variables,
  ) -> Result<Resolution, EngineError> {
    self.resolve(task_id, Action::Reject, comment, variables).await
  }

  #[instrument(skip(self, comment, variables))]
  async fn resolve(
    &self,
    task_id: TaskId,
    action: Action,
    comment: &str,
    variables: Variables,
  ) -> Result<Resolution, EngineError> {
    let mut attempts = 0;
    loop {
      attempts += 1;

      let task = self.get_task(task_id).await?;
      if task.status != TaskStatus::Pending {
        return Err(EngineError::AlreadyResolved {
          task_id,
          status: task.status,
        });
      }

      let instance = self.get_instance(task.instance_id).await?;
      let instance_id = instance.instance_id;
      if instance.status != InstanceStatus::Running {
        return Err(EngineError::InstanceNotRunning {
          instance_id,
          status: instance.status,
        });
      }

      let nodes = self.get_definition(instance.process_id).await?;
      let node = nodes
        .node(&task.node_id)
        .map_err(|source| EngineError::MalformedDefinition {
          process_id: instance.process_id,
          source,
        })?;

      let mut merged = Variables::from_json(&instance.variables)
        .map_err(|source| EngineError::CorruptVariables {
          instance_id,
          source,
        })?;
      merged.merge(variables.clone());

      let pending: Vec<_> = self
        .store
        .list_instance_tasks(instance_id)
        .await?
        .into_iter()
        .filter(|t| t.status == TaskStatus::Pending && t.task_id != task_id)
        .collect();
      let siblings: Vec<TaskId> = pending
        .iter()
        .filter(|t| t.node_id == task.node_id)
        .map(|t| t.task_id)
        .collect();

      let mut planner = Planner::new(
        instance_id,
        &nodes,
        &self.guards,
        &merged,
        instance.current_nodes.0.clone(),
        self.config.max_traversal_steps,
      );

      let cancelled = match action {
        Action::Pass if node.countersign && !siblings.is_empty() => Vec::new(),
        Action::Pass => {
          planner.take_token(&node.node_id);
          planner.leave(node)?;
          siblings
        }
        Action::Reject => {
          let target = node
            .reject_to
            .as_deref()
            .ok_or_else(|| EngineError::Routing {
              instance_id,
              node_id: node.node_id.clone(),
              source: WorkflowError::NoRejectTarget(node.node_id.clone()),
            })?;
          planner.take_token(&node.node_id);
          let rewound = planner.rewind(target);
          planner.enter(target)?;
          pending
            .iter()
            .filter(|t| t.node_id == task.node_id || rewound.contains(&t.node_id))
            .map(|t| t.task_id)
            .collect()
        }
      };

      let plan = planner.finish();
      let status = if plan.is_finished() {
        InstanceStatus::Completed
      } else {
        InstanceStatus::Running
      };

      let advance = Advance {
        instance_id,
        expected_revision: instance.revision,
        resolution: Some(TaskResolution {
          task_id,
          status: action.task_status(),
          comment: (!comment.is_empty()).then(|| comment.to_string()),
        }),
        cancel_tasks: cancelled.clone(),
        variables: merged.to_json().map_err(EngineError::InvalidVariables)?,
        current_nodes: plan.tokens.clone(),
        new_tasks: plan.tasks,
        status,
      };

      match self.store.advance(&advance).await {
        Ok(created_tasks) => {
          match action {
            Action::Pass => info!(task_id, instance_id, node_id = %node.node_id, "task_passed"),
            Action::Reject => info!(task_id, instance_id, node_id = %node.node_id, "task_rejected"),
          }
          if status == InstanceStatus::Completed {
            info!(instance_id, "instance_completed");
          }

          return Ok(Resolution {
            task_id,
            instance_id,
            status,
            current_nodes: plan.tokens,
            created_tasks,
            cancelled_tasks: cancelled,
          });
        }
        Err(handoff_store::Error::AlreadyResolved { status, .. }) => {
          return Err(EngineError::AlreadyResolved { task_id, status });
        }
        Err(handoff_store::Error::NotFound(_)) => return Err(EngineError::TaskNotFound(task_id)),
        Err(handoff_store::Error::Conflict { .. }) if attempts <= self.config.max_conflict_retries => {
          warn!(task_id, instance_id, attempts, "resolution_conflict");
        }
        Err(handoff_store::Error::Conflict { .. }) => {
          return Err(EngineError::Conflict {
            instance_id,
            attempts,
          });
        }
        Err(e) => return Err(e.into()),
      }
    }
  }
}
