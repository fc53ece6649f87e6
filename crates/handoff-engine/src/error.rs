//! Engine errors.

use handoff_store::{InstanceId, InstanceStatus, TaskId, TaskStatus};
use handoff_workflow::{ProcessId, VariableError, WorkflowError};

/// Errors returned by [`crate::ProcessEngine`] operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// The store holds no nodes for the process id.
  #[error("process definition {0} not found")]
  DefinitionNotFound(ProcessId),

  #[error("instance {0} not found")]
  InstanceNotFound(InstanceId),

  #[error("task {0} not found")]
  TaskNotFound(TaskId),

  /// The task was acted on before this call.
  #[error("task {task_id} is already {status}")]
  AlreadyResolved { task_id: TaskId, status: TaskStatus },

  #[error("instance {instance_id} is {status}")]
  InstanceNotRunning {
    instance_id: InstanceId,
    status: InstanceStatus,
  },

  /// A published definition that cannot be executed.
  #[error("process definition {process_id} is malformed")]
  MalformedDefinition {
    process_id: ProcessId,
    #[source]
    source: WorkflowError,
  },

  /// A definition offered for publishing failed validation.
  #[error("invalid process definition")]
  InvalidDefinition(#[source] WorkflowError),

  /// Caller-supplied variables cannot be encoded.
  #[error("invalid variables")]
  InvalidVariables(#[source] VariableError),

  /// The token could not be routed out of a node.
  #[error("cannot route instance {instance_id} at node '{node_id}'")]
  Routing {
    instance_id: InstanceId,
    node_id: String,
    #[source]
    source: WorkflowError,
  },

  #[error("traversal exceeded {limit} automatic steps")]
  TraversalLimit { limit: usize },

  /// The instance's stored variables cannot be decoded.
  #[error("instance {instance_id} holds unreadable variables")]
  CorruptVariables {
    instance_id: InstanceId,
    #[source]
    source: VariableError,
  },

  /// Business rule failure reported by the store.
  #[error("{0}")]
  Rejected(String),

  /// The instance was created but its start node could not be handled.
  /// The instance stays Running with its token on the start node.
  #[error("instance {instance_id} was created but start handling failed")]
  StartHandling {
    instance_id: InstanceId,
    #[source]
    source: Box<EngineError>,
  },

  #[error("instance {instance_id} kept changing; gave up after {attempts} attempts")]
  Conflict {
    instance_id: InstanceId,
    attempts: usize,
  },

  #[error("store error")]
  Store(#[from] handoff_store::Error),
}

/// Error classes callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  /// Stored data the engine cannot execute. A server-side configuration
  /// failure.
  Malformed,
  Rejected,
  AlreadyResolved,
  InvalidInput,
  Conflict,
  /// Storage unavailable or failing; the caller may retry.
  Transient,
}

impl ErrorKind {
  /// Whether the failure is the caller's to fix (4xx-class).
  pub fn is_client_error(self) -> bool {
    matches!(
      self,
      ErrorKind::NotFound
        | ErrorKind::Rejected
        | ErrorKind::AlreadyResolved
        | ErrorKind::InvalidInput
        | ErrorKind::Conflict
    )
  }
}

impl EngineError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      EngineError::DefinitionNotFound(_)
      | EngineError::InstanceNotFound(_)
      | EngineError::TaskNotFound(_) => ErrorKind::NotFound,
      EngineError::AlreadyResolved { .. } => ErrorKind::AlreadyResolved,
      EngineError::InstanceNotRunning { .. } | EngineError::Rejected(_) => ErrorKind::Rejected,
      EngineError::MalformedDefinition { .. }
      | EngineError::Routing { .. }
      | EngineError::TraversalLimit { .. }
      | EngineError::CorruptVariables { .. } => ErrorKind::Malformed,
      EngineError::InvalidDefinition(_) | EngineError::InvalidVariables(_) => {
        ErrorKind::InvalidInput
      }
      EngineError::StartHandling { source, .. } => source.kind(),
      EngineError::Conflict { .. } => ErrorKind::Conflict,
      EngineError::Store(e) => match e {
        handoff_store::Error::NotFound(_) => ErrorKind::NotFound,
        handoff_store::Error::AlreadyResolved { .. } => ErrorKind::AlreadyResolved,
        handoff_store::Error::Conflict { .. } => ErrorKind::Conflict,
        handoff_store::Error::Rejected(_) => ErrorKind::Rejected,
        handoff_store::Error::Corrupt(_) | handoff_store::Error::Serialization(_) => {
          ErrorKind::Malformed
        }
        handoff_store::Error::Database(_) | handoff_store::Error::Migrate(_) => {
          ErrorKind::Transient
        }
      },
    }
  }

  /// Id of the instance a partially successful start created.
  pub fn created_instance(&self) -> Option<InstanceId> {
    match self {
      EngineError::StartHandling { instance_id, .. } => Some(*instance_id),
      _ => None,
    }
  }
}
