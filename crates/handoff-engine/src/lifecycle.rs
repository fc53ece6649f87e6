//! Instance creation and termination.

use handoff_store::{
  Advance, InstanceId, InstanceStatus, NewInstance, NewTask, TaskId, TaskStatus,
};
use handoff_workflow::{Node, ProcessId, ProcessNodes, Variables};
use tracing::{info, instrument, warn};

use crate::engine::ProcessEngine;
use crate::error::EngineError;
use crate::traversal::Planner;

/// Variable naming the user who starts an instance.
pub const STARTER_VARIABLE: &str = "starter";

impl ProcessEngine {
  /// Start an instance of a definition and route its token off the start
  /// node.
  ///
  /// Nothing is persisted when the definition is unknown or has no start
  /// node. If routing off the start node fails after the instance was
  /// created, the error is [`EngineError::StartHandling`] and carries the
  /// new instance id; the instance stays Running on its start node.
  #[instrument(skip(self, comment, variables))]
  pub async fn start_instance(
    &self,
    process_id: ProcessId,
    business_id: &str,
    comment: &str,
    variables: Variables,
  ) -> Result<InstanceId, EngineError> {
    let nodes = self.get_definition(process_id).await?;
    let start = nodes
      .start_node()
      .map_err(|source| EngineError::MalformedDefinition { process_id, source })?;
    let encoded = variables.to_json().map_err(EngineError::InvalidVariables)?;

    let instance_id = self
      .store
      .create_instance(&NewInstance {
        process_id,
        business_id: business_id.to_string(),
        start_node_id: start.node_id.clone(),
        variables: encoded.clone(),
      })
      .await
      .map_err(|e| match e {
        handoff_store::Error::Rejected(message) => EngineError::Rejected(message),
        e => e.into(),
      })?;

    self
      .handle_start(instance_id, &nodes, start, comment, &variables, encoded)
      .await
      .map_err(|source| {
        warn!(instance_id, error = %source, "start_handling_failed");
        EngineError::StartHandling {
          instance_id,
          source: Box::new(source),
        }
      })?;

    info!(process_id, instance_id, "instance_started");
    Ok(instance_id)
  }

  async fn handle_start(
    &self,
    instance_id: InstanceId,
    nodes: &ProcessNodes,
    start: &Node,
    comment: &str,
    variables: &Variables,
    encoded: String,
  ) -> Result<(), EngineError> {
    let instance = self.get_instance(instance_id).await?;

    let mut planner = Planner::new(
      instance_id,
      nodes,
      &self.guards,
      variables,
      instance.current_nodes.0.clone(),
      self.config.max_traversal_steps,
    );
    planner.take_token(&start.node_id);
    planner.enter(&start.node_id)?;
    let plan = planner.finish();

    let finished = plan.is_finished();
    let mut new_tasks = vec![NewTask {
      node_id: start.node_id.clone(),
      node_name: start.node_name.clone(),
      assignee_id: variables.get(STARTER_VARIABLE).unwrap_or_default().to_string(),
      status: TaskStatus::Passed,
      comment: (!comment.is_empty()).then(|| comment.to_string()),
    }];
    new_tasks.extend(plan.tasks);

    self
      .store
      .advance(&Advance {
        instance_id,
        expected_revision: instance.revision,
        resolution: None,
        cancel_tasks: vec![],
        variables: encoded,
        current_nodes: plan.tokens,
        new_tasks,
        status: if finished {
          InstanceStatus::Completed
        } else {
          InstanceStatus::Running
        },
      })
      .await?;

    if finished {
      info!(instance_id, "instance_completed");
    }
    Ok(())
  }

  /// Abort a running instance. Every Pending task is cancelled.
  ///
  /// Returns the ids of the cancelled tasks.
  #[instrument(skip(self))]
  pub async fn terminate_instance(&self, instance_id: InstanceId) -> Result<Vec<TaskId>, EngineError> {
    let mut attempts = 0;
    loop {
      attempts += 1;

      let instance = self.get_instance(instance_id).await?;
      if instance.status != InstanceStatus::Running {
        return Err(EngineError::InstanceNotRunning {
          instance_id,
          status: instance.status,
        });
      }

      let pending: Vec<TaskId> = self
        .store
        .list_instance_tasks(instance_id)
        .await?
        .into_iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .map(|t| t.task_id)
        .collect();

      let result = self
        .store
        .advance(&Advance {
          instance_id,
          expected_revision: instance.revision,
          resolution: None,
          cancel_tasks: pending.clone(),
          variables: instance.variables,
          current_nodes: vec![],
          new_tasks: vec![],
          status: InstanceStatus::Terminated,
        })
        .await;

      match result {
        Ok(_) => {
          info!(instance_id, cancelled = pending.len(), "instance_terminated");
          return Ok(pending);
        }
        Err(handoff_store::Error::Conflict { .. }) if attempts <= self.config.max_conflict_retries => {
          warn!(instance_id, attempts, "resolution_conflict");
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
