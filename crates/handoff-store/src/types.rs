use std::fmt;

use chrono::{DateTime, Utc};
use handoff_workflow::{Node, ProcessId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

pub type InstanceId = i64;
pub type TaskId = i64;

/// Status of a process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum InstanceStatus {
  Running,
  Completed,
  Terminated,
}

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  Passed,
  Rejected,
  /// Superseded by a sibling task's resolution or by termination.
  Cancelled,
}

impl TaskStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      TaskStatus::Pending => "pending",
      TaskStatus::Passed => "passed",
      TaskStatus::Rejected => "rejected",
      TaskStatus::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl fmt::Display for InstanceStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      InstanceStatus::Running => "running",
      InstanceStatus::Completed => "completed",
      InstanceStatus::Terminated => "terminated",
    })
  }
}

/// A published process definition (one version).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProcessDefinition {
  pub process_id: ProcessId,
  pub name: String,
  pub version: i64,
  pub resource: String,
  pub create_user_id: String,
  pub source: String,
  pub created_at: DateTime<Utc>,
}

/// A definition to publish. `nodes` is the parsed, validated `resource`.
#[derive(Debug, Clone)]
pub struct NewDefinition {
  pub name: String,
  pub resource: String,
  pub create_user_id: String,
  pub source: String,
  pub nodes: Vec<Node>,
}

/// A process instance as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProcessInstance {
  pub instance_id: InstanceId,
  pub process_id: ProcessId,
  pub business_id: String,
  /// One entry per token.
  pub current_nodes: Json<Vec<String>>,
  /// Variable snapshot, JSON object of strings.
  pub variables: String,
  pub status: InstanceStatus,
  /// Bumped by every state change.
  pub revision: i64,
  pub created_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
}

/// Input of the atomic instance creation.
#[derive(Debug, Clone)]
pub struct NewInstance {
  pub process_id: ProcessId,
  pub business_id: String,
  pub start_node_id: String,
  pub variables: String,
}

/// A task as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
  pub task_id: TaskId,
  pub instance_id: InstanceId,
  pub process_id: ProcessId,
  pub node_id: String,
  pub node_name: String,
  pub assignee_id: String,
  pub status: TaskStatus,
  pub comment: Option<String>,
  pub created_at: DateTime<Utc>,
  pub resolved_at: Option<DateTime<Utc>>,
}

/// A task created by an [`Advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
  pub node_id: String,
  pub node_name: String,
  pub assignee_id: String,
  /// `Pending` for work items; an already-decided status records history.
  pub status: TaskStatus,
  pub comment: Option<String>,
}

/// Check-and-set of one task from `Pending` to a resolved status.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResolution {
  pub task_id: TaskId,
  pub status: TaskStatus,
  pub comment: Option<String>,
}

/// One atomic state change of an instance.
///
/// Applied all-or-nothing: the task resolution (checked first), the instance
/// row (checked against `expected_revision`), sibling cancellation and new
/// tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
  pub instance_id: InstanceId,
  pub expected_revision: i64,
  pub resolution: Option<TaskResolution>,
  pub cancel_tasks: Vec<TaskId>,
  pub variables: String,
  pub current_nodes: Vec<String>,
  pub new_tasks: Vec<NewTask>,
  pub status: InstanceStatus,
}
