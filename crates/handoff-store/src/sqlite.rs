use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use handoff_workflow::{Node, ProcessId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::debug;

use crate::{
  Advance, Error, InstanceId, InstanceStatus, NewDefinition, NewInstance, ProcessDefinition,
  ProcessInstance, Store, Task, TaskId, TaskStatus,
};

const TASK_COLUMNS: &str = "task_id, instance_id, process_id, node_id, node_name, assignee_id, status, comment, created_at, resolved_at";

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
  unique_business_key: bool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self {
      pool,
      unique_business_key: false,
    }
  }

  /// Open (creating if missing) the database at `url`, e.g.
  /// `sqlite:///var/lib/handoff/handoff.db` or `sqlite::memory:`.
  pub async fn connect(url: &str) -> Result<Self, Error> {
    let options = SqliteConnectOptions::from_str(url)?
      .create_if_missing(true)
      .foreign_keys(true)
      .busy_timeout(Duration::from_secs(5));

    // An in-memory database lives and dies with its one connection.
    let pool = if url.contains(":memory:") {
      SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
    } else {
      SqlitePoolOptions::new().max_connections(5)
    }
    .connect_with(options)
    .await?;

    Ok(Self::new(pool))
  }

  /// Refuse to start a second running instance of a process for the same
  /// business key.
  pub fn with_unique_business_key(mut self, unique: bool) -> Self {
    self.unique_business_key = unique;
    self
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), Error> {
    sqlx::migrate!("../../migrations").run(&self.pool).await?;
    Ok(())
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn save_definition(&self, definition: &NewDefinition) -> Result<ProcessDefinition, Error> {
    let mut tx = self.pool.begin().await?;

    let inserted = sqlx::query(
      r#"
            INSERT INTO process_definitions (name, version, resource, create_user_id, source, created_at)
            VALUES (
                ?,
                (SELECT COALESCE(MAX(version), 0) + 1 FROM process_definitions WHERE name = ? AND source = ?),
                ?, ?, ?, ?
            )
            "#,
    )
    .bind(&definition.name)
    .bind(&definition.name)
    .bind(&definition.source)
    .bind(&definition.resource)
    .bind(&definition.create_user_id)
    .bind(&definition.source)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    let process_id = inserted.last_insert_rowid();

    for (position, node) in definition.nodes.iter().enumerate() {
      let mut node = node.clone();
      node.process_id = process_id;

      sqlx::query(
        r#"
            INSERT INTO process_nodes (process_id, position, node_id, node_type, node)
            VALUES (?, ?, ?, ?, ?)
            "#,
      )
      .bind(process_id)
      .bind(position as i64)
      .bind(&node.node_id)
      .bind(node.node_type.code())
      .bind(serde_json::to_string(&node)?)
      .execute(&mut *tx)
      .await?;
    }

    let saved: ProcessDefinition = sqlx::query_as(
      r#"
            SELECT process_id, name, version, resource, create_user_id, source, created_at
            FROM process_definitions
            WHERE process_id = ?
            "#,
    )
    .bind(process_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    debug!(process_id, version = saved.version, "definition row inserted");
    Ok(saved)
  }

  async fn list_definitions(&self, source: &str) -> Result<Vec<ProcessDefinition>, Error> {
    let definitions = sqlx::query_as(
      r#"
            SELECT d.process_id, d.name, d.version, d.resource, d.create_user_id, d.source, d.created_at
            FROM process_definitions d
            WHERE d.source = ?
              AND d.version = (
                  SELECT MAX(version) FROM process_definitions
                  WHERE name = d.name AND source = d.source
              )
            ORDER BY d.name ASC
            "#,
    )
    .bind(source)
    .fetch_all(&self.pool)
    .await?;

    Ok(definitions)
  }

  async fn load_nodes(&self, process_id: ProcessId) -> Result<Vec<Node>, Error> {
    let rows: Vec<String> = sqlx::query_scalar(
      r#"
            SELECT node
            FROM process_nodes
            WHERE process_id = ?
            ORDER BY position ASC
            "#,
    )
    .bind(process_id)
    .fetch_all(&self.pool)
    .await?;

    rows
      .iter()
      .map(|row| {
        let mut node: Node = serde_json::from_str(row)
          .map_err(|e| Error::Corrupt(format!("node of process {}: {}", process_id, e)))?;
        node.process_id = process_id;
        Ok(node)
      })
      .collect()
  }

  async fn create_instance(&self, instance: &NewInstance) -> Result<InstanceId, Error> {
    let mut tx = self.pool.begin().await?;

    let inserted = sqlx::query(
      r#"
            INSERT INTO process_instances (process_id, business_id, current_nodes, variables, status, revision, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
    )
    .bind(instance.process_id)
    .bind(&instance.business_id)
    .bind(Json(vec![instance.start_node_id.clone()]))
    .bind(&instance.variables)
    .bind(InstanceStatus::Running)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    let instance_id = inserted.last_insert_rowid();

    if self.unique_business_key {
      // Insert first, then count: the write lock is taken by the insert.
      let running: i64 = sqlx::query_scalar(
        r#"
            SELECT COUNT(*) FROM process_instances
            WHERE process_id = ? AND business_id = ? AND status = ?
            "#,
      )
      .bind(instance.process_id)
      .bind(&instance.business_id)
      .bind(InstanceStatus::Running)
      .fetch_one(&mut *tx)
      .await?;

      if running > 1 {
        tx.rollback().await?;
        return Err(Error::Rejected(format!(
          "business key '{}' already has a running instance of process {}",
          instance.business_id, instance.process_id
        )));
      }
    }

    tx.commit().await?;
    Ok(instance_id)
  }

  async fn get_instance(&self, instance_id: InstanceId) -> Result<ProcessInstance, Error> {
    sqlx::query_as(
      r#"
            SELECT instance_id, process_id, business_id, current_nodes, variables, status, revision, created_at, finished_at
            FROM process_instances
            WHERE instance_id = ?
            "#,
    )
    .bind(instance_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("instance {}", instance_id)))
  }

  async fn load_task(&self, task_id: TaskId) -> Result<Task, Error> {
    sqlx::query_as(&format!(
      "SELECT {} FROM process_tasks WHERE task_id = ?",
      TASK_COLUMNS
    ))
    .bind(task_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))
  }

  async fn list_instance_tasks(&self, instance_id: InstanceId) -> Result<Vec<Task>, Error> {
    let tasks = sqlx::query_as(&format!(
      "SELECT {} FROM process_tasks WHERE instance_id = ? ORDER BY task_id ASC",
      TASK_COLUMNS
    ))
    .bind(instance_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(tasks)
  }

  async fn advance(&self, advance: &Advance) -> Result<Vec<TaskId>, Error> {
    let now = Utc::now();
    let mut tx = self.pool.begin().await?;

    if let Some(resolution) = &advance.resolution {
      let resolved = sqlx::query(
        r#"
            UPDATE process_tasks
            SET status = ?, comment = ?, resolved_at = ?
            WHERE task_id = ? AND instance_id = ? AND status = ?
            "#,
      )
      .bind(resolution.status)
      .bind(&resolution.comment)
      .bind(now)
      .bind(resolution.task_id)
      .bind(advance.instance_id)
      .bind(TaskStatus::Pending)
      .execute(&mut *tx)
      .await?;

      if resolved.rows_affected() == 0 {
        let current: Option<TaskStatus> =
          sqlx::query_scalar("SELECT status FROM process_tasks WHERE task_id = ?")
            .bind(resolution.task_id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.rollback().await?;

        return Err(match current {
          Some(status) => Error::AlreadyResolved {
            task_id: resolution.task_id,
            status,
          },
          None => Error::NotFound(format!("task {}", resolution.task_id)),
        });
      }
    }

    let finished_at = (advance.status != InstanceStatus::Running).then_some(now);
    let updated = sqlx::query(
      r#"
            UPDATE process_instances
            SET current_nodes = ?, variables = ?, status = ?, finished_at = ?, revision = revision + 1
            WHERE instance_id = ? AND revision = ?
            "#,
    )
    .bind(Json(&advance.current_nodes))
    .bind(&advance.variables)
    .bind(advance.status)
    .bind(finished_at)
    .bind(advance.instance_id)
    .bind(advance.expected_revision)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
      tx.rollback().await?;
      return Err(Error::Conflict {
        instance_id: advance.instance_id,
        expected: advance.expected_revision,
      });
    }

    for task_id in &advance.cancel_tasks {
      sqlx::query(
        r#"
            UPDATE process_tasks
            SET status = ?, resolved_at = ?
            WHERE task_id = ? AND status = ?
            "#,
      )
      .bind(TaskStatus::Cancelled)
      .bind(now)
      .bind(task_id)
      .bind(TaskStatus::Pending)
      .execute(&mut *tx)
      .await?;
    }

    let process_id: ProcessId =
      sqlx::query_scalar("SELECT process_id FROM process_instances WHERE instance_id = ?")
        .bind(advance.instance_id)
        .fetch_one(&mut *tx)
        .await?;

    let mut created = Vec::with_capacity(advance.new_tasks.len());
    for task in &advance.new_tasks {
      let resolved_at = (task.status != TaskStatus::Pending).then_some(now);
      let inserted = sqlx::query(
        r#"
            INSERT INTO process_tasks (instance_id, process_id, node_id, node_name, assignee_id, status, comment, created_at, resolved_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
      )
      .bind(advance.instance_id)
      .bind(process_id)
      .bind(&task.node_id)
      .bind(&task.node_name)
      .bind(&task.assignee_id)
      .bind(task.status)
      .bind(&task.comment)
      .bind(now)
      .bind(resolved_at)
      .execute(&mut *tx)
      .await?;
      created.push(inserted.last_insert_rowid());
    }

    tx.commit().await?;
    Ok(created)
  }

  async fn list_pending_tasks(&self, assignee_id: &str) -> Result<Vec<Task>, Error> {
    let tasks = sqlx::query_as(&format!(
      "SELECT {} FROM process_tasks WHERE assignee_id = ? AND status = ? ORDER BY task_id ASC",
      TASK_COLUMNS
    ))
    .bind(assignee_id)
    .bind(TaskStatus::Pending)
    .fetch_all(&self.pool)
    .await?;

    Ok(tasks)
  }

  async fn list_finished_tasks(&self, assignee_id: &str) -> Result<Vec<Task>, Error> {
    let tasks = sqlx::query_as(&format!(
      "SELECT {} FROM process_tasks WHERE assignee_id = ? AND status IN (?, ?) ORDER BY resolved_at DESC, task_id DESC",
      TASK_COLUMNS
    ))
    .bind(assignee_id)
    .bind(TaskStatus::Passed)
    .bind(TaskStatus::Rejected)
    .fetch_all(&self.pool)
    .await?;

    Ok(tasks)
  }
}
