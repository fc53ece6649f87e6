use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use handoff_workflow::{Node, ProcessId};
use sqlx::types::Json;
use tokio::sync::Mutex;

use crate::{
  Advance, Error, InstanceId, InstanceStatus, NewDefinition, NewInstance, ProcessDefinition,
  ProcessInstance, Store, Task, TaskId, TaskStatus,
};

#[derive(Default)]
struct State {
  definitions: BTreeMap<ProcessId, ProcessDefinition>,
  nodes: HashMap<ProcessId, Vec<Node>>,
  instances: BTreeMap<InstanceId, ProcessInstance>,
  tasks: BTreeMap<TaskId, Task>,
  next_process_id: ProcessId,
  next_instance_id: InstanceId,
  next_task_id: TaskId,
}

/// In-process store with the same semantics as [`crate::SqliteStore`].
///
/// Every operation holds one lock for its whole duration, which gives the
/// same all-or-nothing behavior as a database transaction.
#[derive(Default)]
pub struct MemoryStore {
  state: Mutex<State>,
  unique_business_key: bool,
  node_loads: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_unique_business_key(mut self, unique: bool) -> Self {
    self.unique_business_key = unique;
    self
  }

  /// How many times `load_nodes` has been called.
  pub fn node_loads(&self) -> usize {
    self.node_loads.load(Ordering::SeqCst)
  }

  /// Number of stored instances, whatever their status.
  pub async fn instance_count(&self) -> usize {
    self.state.lock().await.instances.len()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn save_definition(&self, definition: &NewDefinition) -> Result<ProcessDefinition, Error> {
    let mut state = self.state.lock().await;

    let version = state
      .definitions
      .values()
      .filter(|d| d.name == definition.name && d.source == definition.source)
      .map(|d| d.version)
      .max()
      .unwrap_or(0)
      + 1;

    state.next_process_id += 1;
    let process_id = state.next_process_id;

    let saved = ProcessDefinition {
      process_id,
      name: definition.name.clone(),
      version,
      resource: definition.resource.clone(),
      create_user_id: definition.create_user_id.clone(),
      source: definition.source.clone(),
      created_at: Utc::now(),
    };

    let nodes = definition
      .nodes
      .iter()
      .cloned()
      .map(|mut node| {
        node.process_id = process_id;
        node
      })
      .collect();

    state.definitions.insert(process_id, saved.clone());
    state.nodes.insert(process_id, nodes);
    Ok(saved)
  }

  async fn list_definitions(&self, source: &str) -> Result<Vec<ProcessDefinition>, Error> {
    let state = self.state.lock().await;

    let mut latest: BTreeMap<&str, &ProcessDefinition> = BTreeMap::new();
    for definition in state.definitions.values().filter(|d| d.source == source) {
      let entry = latest.entry(definition.name.as_str()).or_insert(definition);
      if definition.version > entry.version {
        *entry = definition;
      }
    }

    Ok(latest.into_values().cloned().collect())
  }

  async fn load_nodes(&self, process_id: ProcessId) -> Result<Vec<Node>, Error> {
    self.node_loads.fetch_add(1, Ordering::SeqCst);
    let state = self.state.lock().await;
    Ok(state.nodes.get(&process_id).cloned().unwrap_or_default())
  }

  async fn create_instance(&self, instance: &NewInstance) -> Result<InstanceId, Error> {
    let mut state = self.state.lock().await;

    if self.unique_business_key
      && state.instances.values().any(|i| {
        i.process_id == instance.process_id
          && i.business_id == instance.business_id
          && i.status == InstanceStatus::Running
      })
    {
      return Err(Error::Rejected(format!(
        "business key '{}' already has a running instance of process {}",
        instance.business_id, instance.process_id
      )));
    }

    state.next_instance_id += 1;
    let instance_id = state.next_instance_id;
    state.instances.insert(
      instance_id,
      ProcessInstance {
        instance_id,
        process_id: instance.process_id,
        business_id: instance.business_id.clone(),
        current_nodes: Json(vec![instance.start_node_id.clone()]),
        variables: instance.variables.clone(),
        status: InstanceStatus::Running,
        revision: 0,
        created_at: Utc::now(),
        finished_at: None,
      },
    );

    Ok(instance_id)
  }

  async fn get_instance(&self, instance_id: InstanceId) -> Result<ProcessInstance, Error> {
    let state = self.state.lock().await;
    state
      .instances
      .get(&instance_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("instance {}", instance_id)))
  }

  async fn load_task(&self, task_id: TaskId) -> Result<Task, Error> {
    let state = self.state.lock().await;
    state
      .tasks
      .get(&task_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))
  }

  async fn list_instance_tasks(&self, instance_id: InstanceId) -> Result<Vec<Task>, Error> {
    let state = self.state.lock().await;
    Ok(
      state
        .tasks
        .values()
        .filter(|t| t.instance_id == instance_id)
        .cloned()
        .collect(),
    )
  }

  async fn advance(&self, advance: &Advance) -> Result<Vec<TaskId>, Error> {
    let now = Utc::now();
    let mut state = self.state.lock().await;

    // Check everything before mutating anything.
    if let Some(resolution) = &advance.resolution {
      match state.tasks.get(&resolution.task_id) {
        Some(task) if task.instance_id != advance.instance_id => {
          return Err(Error::NotFound(format!("task {}", resolution.task_id)));
        }
        Some(task) if task.status != TaskStatus::Pending => {
          return Err(Error::AlreadyResolved {
            task_id: resolution.task_id,
            status: task.status,
          });
        }
        Some(_) => {}
        None => return Err(Error::NotFound(format!("task {}", resolution.task_id))),
      }
    }

    let process_id = match state.instances.get(&advance.instance_id) {
      Some(instance) if instance.revision == advance.expected_revision => instance.process_id,
      _ => {
        return Err(Error::Conflict {
          instance_id: advance.instance_id,
          expected: advance.expected_revision,
        });
      }
    };

    if let Some(resolution) = &advance.resolution {
      if let Some(task) = state.tasks.get_mut(&resolution.task_id) {
        task.status = resolution.status;
        task.comment = resolution.comment.clone();
        task.resolved_at = Some(now);
      }
    }

    if let Some(instance) = state.instances.get_mut(&advance.instance_id) {
      instance.current_nodes = Json(advance.current_nodes.clone());
      instance.variables = advance.variables.clone();
      instance.status = advance.status;
      instance.revision += 1;
      if advance.status != InstanceStatus::Running {
        instance.finished_at = Some(now);
      }
    }

    for task_id in &advance.cancel_tasks {
      if let Some(task) = state.tasks.get_mut(task_id) {
        if task.status == TaskStatus::Pending {
          task.status = TaskStatus::Cancelled;
          task.resolved_at = Some(now);
        }
      }
    }

    let mut created = Vec::with_capacity(advance.new_tasks.len());
    for new_task in &advance.new_tasks {
      state.next_task_id += 1;
      let task_id = state.next_task_id;
      state.tasks.insert(
        task_id,
        Task {
          task_id,
          instance_id: advance.instance_id,
          process_id,
          node_id: new_task.node_id.clone(),
          node_name: new_task.node_name.clone(),
          assignee_id: new_task.assignee_id.clone(),
          status: new_task.status,
          comment: new_task.comment.clone(),
          created_at: now,
          resolved_at: (new_task.status != TaskStatus::Pending).then_some(now),
        },
      );
      created.push(task_id);
    }

    Ok(created)
  }

  async fn list_pending_tasks(&self, assignee_id: &str) -> Result<Vec<Task>, Error> {
    let state = self.state.lock().await;
    Ok(
      state
        .tasks
        .values()
        .filter(|t| t.assignee_id == assignee_id && t.status == TaskStatus::Pending)
        .cloned()
        .collect(),
    )
  }

  async fn list_finished_tasks(&self, assignee_id: &str) -> Result<Vec<Task>, Error> {
    let state = self.state.lock().await;
    let mut tasks: Vec<Task> = state
      .tasks
      .values()
      .filter(|t| {
        t.assignee_id == assignee_id
          && matches!(t.status, TaskStatus::Passed | TaskStatus::Rejected)
      })
      .cloned()
      .collect();
    tasks.sort_by(|a, b| {
      b.resolved_at
        .cmp(&a.resolved_at)
        .then(b.task_id.cmp(&a.task_id))
    });
    Ok(tasks)
  }
}
