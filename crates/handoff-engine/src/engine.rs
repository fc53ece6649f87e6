use std::sync::Arc;

use handoff_store::{
  InstanceId, NewDefinition, ProcessDefinition, ProcessInstance, Store, Task, TaskId,
};
use handoff_workflow::{GuardEvaluator, ProcessId, ProcessNodes, ProcessResource};
use tracing::{info, instrument};

use crate::cache::DefinitionCache;
use crate::config::EngineConfig;
use crate::error::EngineError;

/// Entry point for every caller-facing operation.
///
/// The engine holds no instance state of its own: instances and tasks live
/// in the [`Store`], definitions are read through the [`DefinitionCache`].
/// One engine is shared by all request handlers.
pub struct ProcessEngine {
  pub(crate) store: Arc<dyn Store>,
  pub(crate) cache: DefinitionCache,
  pub(crate) guards: GuardEvaluator,
  pub(crate) config: EngineConfig,
}

impl ProcessEngine {
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self::with_config(store, EngineConfig::default())
  }

  pub fn with_config(store: Arc<dyn Store>, config: EngineConfig) -> Self {
    Self {
      store,
      cache: DefinitionCache::new(),
      guards: GuardEvaluator::new(),
      config,
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn cache(&self) -> &DefinitionCache {
    &self.cache
  }

  /// Validate and publish a definition. Republishing a name under the same
  /// source creates the next version with a new process id.
  #[instrument(skip(self, resource))]
  pub async fn save_definition(
    &self,
    name: &str,
    resource: &str,
    create_user_id: &str,
    source: &str,
  ) -> Result<ProcessDefinition, EngineError> {
    let parsed = ProcessResource::parse(resource).map_err(EngineError::InvalidDefinition)?;
    parsed
      .validate(&self.guards)
      .map_err(EngineError::InvalidDefinition)?;

    let saved = self
      .store
      .save_definition(&NewDefinition {
        name: name.to_string(),
        resource: resource.to_string(),
        create_user_id: create_user_id.to_string(),
        source: source.to_string(),
        nodes: parsed.nodes,
      })
      .await?;

    info!(
      process_id = saved.process_id,
      version = saved.version,
      "definition_saved"
    );
    Ok(saved)
  }

  /// Latest version of each definition published under `source`.
  pub async fn list_definitions(&self, source: &str) -> Result<Vec<ProcessDefinition>, EngineError> {
    Ok(self.store.list_definitions(source).await?)
  }

  /// A definition's nodes, served from the cache.
  pub async fn get_definition(&self, process_id: ProcessId) -> Result<Arc<ProcessNodes>, EngineError> {
    self.cache.get(self.store.as_ref(), process_id).await
  }

  /// Drop a cached definition so the next lookup reloads it.
  pub async fn invalidate_definition(&self, process_id: ProcessId) -> bool {
    self.cache.invalidate(process_id).await
  }

  pub async fn clear_definitions(&self) {
    self.cache.clear().await;
  }

  pub async fn get_instance(&self, instance_id: InstanceId) -> Result<ProcessInstance, EngineError> {
    self
      .store
      .get_instance(instance_id)
      .await
      .map_err(|e| match e {
        handoff_store::Error::NotFound(_) => EngineError::InstanceNotFound(instance_id),
        e => e.into(),
      })
  }

  pub async fn get_task(&self, task_id: TaskId) -> Result<Task, EngineError> {
    self.store.load_task(task_id).await.map_err(|e| match e {
      handoff_store::Error::NotFound(_) => EngineError::TaskNotFound(task_id),
      e => e.into(),
    })
  }

  /// Every task of an instance, history included.
  pub async fn instance_tasks(&self, instance_id: InstanceId) -> Result<Vec<Task>, EngineError> {
    self.get_instance(instance_id).await?;
    Ok(self.store.list_instance_tasks(instance_id).await?)
  }

  /// Pending tasks assigned to a user.
  pub async fn todo_tasks(&self, user_id: &str) -> Result<Vec<Task>, EngineError> {
    Ok(self.store.list_pending_tasks(user_id).await?)
  }

  /// Tasks a user has passed or rejected.
  pub async fn finished_tasks(&self, user_id: &str) -> Result<Vec<Task>, EngineError> {
    Ok(self.store.list_finished_tasks(user_id).await?)
  }
}
