//! Handoff Store
//!
//! This crate provides the storage trait and implementations for process
//! definitions, instances and tasks. The store is the system of record; the
//! engine only holds request-scoped views of what it returns.
//!
//! The [`Store`] trait defines operations for:
//! - Publishing and listing definitions, loading a definition's nodes
//! - Creating an instance atomically
//! - Applying an [`Advance`]: one atomic state change of an instance,
//!   including the exactly-once check-and-set of a task's status
//! - Querying tasks by instance and by assignee
//!
//! [`SqliteStore`] persists to SQLite through sqlx; [`MemoryStore`] keeps
//! everything in process and is what the engine tests run against.

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{
  Advance, InstanceId, InstanceStatus, NewDefinition, NewInstance, NewTask, ProcessDefinition,
  ProcessInstance, Task, TaskId, TaskResolution, TaskStatus,
};

use async_trait::async_trait;
use handoff_workflow::{Node, ProcessId};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// The task's status was no longer `Pending` when the check-and-set ran.
  #[error("task {task_id} is already {status}")]
  AlreadyResolved { task_id: TaskId, status: TaskStatus },

  /// The instance row changed since it was read.
  #[error("instance {instance_id} changed concurrently (expected revision {expected})")]
  Conflict {
    instance_id: InstanceId,
    expected: i64,
  },

  /// A business rule of the store refused the operation.
  #[error("{0}")]
  Rejected(String),

  /// A stored record could not be decoded.
  #[error("corrupt record: {0}")]
  Corrupt(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Applying migrations failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// Storage trait for process definitions, instances and tasks.
#[async_trait]
pub trait Store: Send + Sync {
  /// Publish a definition. Republishing a `(name, source)` pair creates the
  /// next version under a new process id.
  async fn save_definition(&self, definition: &NewDefinition) -> Result<ProcessDefinition, Error>;

  /// Latest version of every definition published under `source`.
  async fn list_definitions(&self, source: &str) -> Result<Vec<ProcessDefinition>, Error>;

  /// Nodes of a definition in declared order. Empty when the id is unknown.
  async fn load_nodes(&self, process_id: ProcessId) -> Result<Vec<Node>, Error>;

  /// Create a running instance whose single token sits on the start node.
  async fn create_instance(&self, instance: &NewInstance) -> Result<InstanceId, Error>;

  /// Get an instance by ID.
  async fn get_instance(&self, instance_id: InstanceId) -> Result<ProcessInstance, Error>;

  /// Get a task by ID.
  async fn load_task(&self, task_id: TaskId) -> Result<Task, Error>;

  /// All tasks of an instance, oldest first.
  async fn list_instance_tasks(&self, instance_id: InstanceId) -> Result<Vec<Task>, Error>;

  /// Apply one state change atomically. Returns the ids of the created tasks.
  async fn advance(&self, advance: &Advance) -> Result<Vec<TaskId>, Error>;

  /// Pending tasks assigned to a user, oldest first.
  async fn list_pending_tasks(&self, assignee_id: &str) -> Result<Vec<Task>, Error>;

  /// Passed or rejected tasks of a user, most recently resolved first.
  async fn list_finished_tasks(&self, assignee_id: &str) -> Result<Vec<Task>, Error>;
}
