//! Definition caching.
//!
//! A definition's nodes are loaded from the store once and shared by every
//! later lookup. Concurrent misses for the same id wait on a single load.
//! Entries live until invalidated.

use std::collections::HashMap;
use std::sync::Arc;

use handoff_store::Store;
use handoff_workflow::{ProcessId, ProcessNodes};
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

use crate::error::EngineError;

type Slot = Arc<OnceCell<Arc<ProcessNodes>>>;

/// Caches loaded definitions by process id.
#[derive(Default)]
pub struct DefinitionCache {
  entries: RwLock<HashMap<ProcessId, Slot>>,
}

impl DefinitionCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get a definition from cache, or load and cache it.
  pub async fn get(
    &self,
    store: &dyn Store,
    process_id: ProcessId,
  ) -> Result<Arc<ProcessNodes>, EngineError> {
    let slot = self.slot(process_id).await;

    let loaded = slot
      .get_or_try_init(|| async {
        let nodes = store.load_nodes(process_id).await?;
        if nodes.is_empty() {
          return Err(EngineError::DefinitionNotFound(process_id));
        }
        debug!(process_id, nodes = nodes.len(), "definition_loaded");
        Ok(Arc::new(ProcessNodes::new(process_id, nodes)))
      })
      .await
      .cloned();

    if loaded.is_err() {
      // Unknown ids must not pile up empty slots.
      let mut entries = self.entries.write().await;
      if entries.get(&process_id).is_some_and(|s| Arc::ptr_eq(s, &slot) && !s.initialized()) {
        entries.remove(&process_id);
      }
    }

    loaded
  }

  async fn slot(&self, process_id: ProcessId) -> Slot {
    {
      let entries = self.entries.read().await;
      if let Some(slot) = entries.get(&process_id) {
        return slot.clone();
      }
    }

    let mut entries = self.entries.write().await;
    entries.entry(process_id).or_default().clone()
  }

  /// Drop one definition; the next lookup reloads it.
  pub async fn invalidate(&self, process_id: ProcessId) -> bool {
    self.entries.write().await.remove(&process_id).is_some()
  }

  /// Clear the cache.
  pub async fn clear(&self) {
    self.entries.write().await.clear();
  }

  pub async fn len(&self) -> usize {
    self.entries.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.entries.read().await.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use handoff_store::{MemoryStore, NewDefinition};
  use handoff_workflow::Node;

  async fn store_with_definition() -> (Arc<MemoryStore>, ProcessId) {
    let store = Arc::new(MemoryStore::new());
    let def = store
      .save_definition(&NewDefinition {
        name: "leave".to_string(),
        resource: "{}".to_string(),
        create_user_id: "u-admin".to_string(),
        source: "office".to_string(),
        nodes: vec![
          Node::start("start").then("a"),
          Node::task("a", &["u1"]).then("end"),
          Node::end("end"),
        ],
      })
      .await
      .unwrap();
    (store, def.process_id)
  }

  #[tokio::test]
  async fn test_loads_once() {
    let (store, process_id) = store_with_definition().await;
    let cache = DefinitionCache::new();

    let first = cache.get(store.as_ref(), process_id).await.unwrap();
    let second = cache.get(store.as_ref(), process_id).await.unwrap();

    assert_eq!(store.node_loads(), 1);
    assert_eq!(first, second);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.start_node().unwrap().node_id, "start");
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_misses_load_once() {
    let (store, process_id) = store_with_definition().await;
    let cache = Arc::new(DefinitionCache::new());

    let mut handles = Vec::new();
    for _ in 0..16 {
      let cache = cache.clone();
      let store = store.clone();
      handles.push(tokio::spawn(async move {
        cache.get(store.as_ref(), process_id).await.map(|n| n.len())
      }));
    }
    for handle in handles {
      assert_eq!(handle.await.unwrap().unwrap(), 3);
    }

    assert_eq!(store.node_loads(), 1);
  }

  #[tokio::test]
  async fn test_unknown_definition_is_not_cached() {
    let (store, _) = store_with_definition().await;
    let cache = DefinitionCache::new();

    let result = cache.get(store.as_ref(), 999).await;
    assert!(matches!(result, Err(EngineError::DefinitionNotFound(999))));
    assert!(cache.is_empty().await);

    // A miss is retried on the next lookup.
    let _ = cache.get(store.as_ref(), 999).await;
    assert_eq!(store.node_loads(), 2);
  }

  #[tokio::test]
  async fn test_invalidate_forces_reload() {
    let (store, process_id) = store_with_definition().await;
    let cache = DefinitionCache::new();

    cache.get(store.as_ref(), process_id).await.unwrap();
    assert!(cache.invalidate(process_id).await);
    assert!(!cache.invalidate(process_id).await);
    cache.get(store.as_ref(), process_id).await.unwrap();
    assert_eq!(store.node_loads(), 2);

    cache.clear().await;
    assert_eq!(cache.len().await, 0);
  }
}
