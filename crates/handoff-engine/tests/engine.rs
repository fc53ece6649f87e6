use std::sync::Arc;

use handoff_engine::{EngineConfig, EngineError, ErrorKind, ProcessEngine};
use handoff_store::{
  InstanceStatus, MemoryStore, NewDefinition, SqliteStore, Store, Task, TaskStatus,
};
use handoff_workflow::{Node, ProcessId, Variables};

const LINEAR: &str = r#"{
  "nodes": [
    { "node_id": "start", "node_type": "start", "outgoing": [{ "target": "a" }] },
    { "node_id": "a", "node_name": "Approve", "node_type": "task",
      "assignees": ["u-lead"], "reject_to": "start", "outgoing": [{ "target": "end" }] },
    { "node_id": "end", "node_type": "end" }
  ]
}"#;

const LEAVE: &str = r#"{
  "nodes": [
    { "node_id": "start", "node_type": "start", "outgoing": [{ "target": "lead" }] },
    { "node_id": "lead", "node_type": "task", "assignees": ["{{ lead }}"], "reject_to": "start",
      "outgoing": [{ "target": "hr", "guard": "days | int > 3" }, { "target": "end" }] },
    { "node_id": "hr", "node_type": "task", "assignees": ["u-hr"], "outgoing": [{ "target": "end" }] },
    { "node_id": "end", "node_type": "end" }
  ]
}"#;

const PARALLEL: &str = r#"{
  "nodes": [
    { "node_id": "start", "node_type": "start", "outgoing": [{ "target": "split" }] },
    { "node_id": "split", "node_type": "gateway", "split": "parallel",
      "outgoing": [{ "target": "legal" }, { "target": "finance" }] },
    { "node_id": "legal", "node_type": "task", "assignees": ["u-legal"], "outgoing": [{ "target": "join" }] },
    { "node_id": "finance", "node_type": "task", "assignees": ["u-fin"], "outgoing": [{ "target": "join" }] },
    { "node_id": "join", "node_type": "gateway", "split": "parallel", "outgoing": [{ "target": "end" }] },
    { "node_id": "end", "node_type": "end" }
  ]
}"#;

const PARALLEL_REVISE: &str = r#"{
  "nodes": [
    { "node_id": "start", "node_type": "start", "outgoing": [{ "target": "split" }] },
    { "node_id": "split", "node_type": "gateway", "split": "parallel",
      "outgoing": [{ "target": "legal" }, { "target": "finance" }] },
    { "node_id": "legal", "node_type": "task", "assignees": ["u-legal"], "reject_to": "start",
      "outgoing": [{ "target": "join" }] },
    { "node_id": "finance", "node_type": "task", "assignees": ["u-fin"], "reject_to": "start",
      "outgoing": [{ "target": "join" }] },
    { "node_id": "join", "node_type": "gateway", "split": "parallel", "outgoing": [{ "target": "end" }] },
    { "node_id": "end", "node_type": "end" }
  ]
}"#;

const BOARD: &str = r#"{
  "nodes": [
    { "node_id": "start", "node_type": "start", "outgoing": [{ "target": "board" }] },
    { "node_id": "board", "node_type": "task", "countersign": true,
      "assignees": ["u-1", "u-2", "u-3"], "reject_to": "start", "outgoing": [{ "target": "end" }] },
    { "node_id": "end", "node_type": "end" }
  ]
}"#;

const ANY_OF: &str = r#"{
  "nodes": [
    { "node_id": "start", "node_type": "start", "outgoing": [{ "target": "desk" }] },
    { "node_id": "desk", "node_type": "task", "assignees": ["u-1", "u-2"], "outgoing": [{ "target": "end" }] },
    { "node_id": "end", "node_type": "end" }
  ]
}"#;

fn engine() -> (Arc<MemoryStore>, ProcessEngine) {
  let store = Arc::new(MemoryStore::new());
  let engine = ProcessEngine::new(store.clone());
  (store, engine)
}

async fn publish(engine: &ProcessEngine, resource: &str) -> ProcessId {
  engine
    .save_definition("test", resource, "u-admin", "office")
    .await
    .unwrap()
    .process_id
}

async fn pending(engine: &ProcessEngine, instance_id: i64) -> Vec<Task> {
  engine
    .instance_tasks(instance_id)
    .await
    .unwrap()
    .into_iter()
    .filter(|t| t.status == TaskStatus::Pending)
    .collect()
}

fn vars(pairs: &[(&str, &str)]) -> Variables {
  pairs.iter().copied().collect()
}

#[tokio::test]
async fn test_linear_approval() {
  let (_, engine) = engine();
  let process_id = publish(&engine, LINEAR).await;

  let instance_id = engine
    .start_instance(process_id, "B-100", "", Variables::new())
    .await
    .unwrap();

  let instance = engine.get_instance(instance_id).await.unwrap();
  assert_eq!(instance.current_nodes.0, vec!["a".to_string()]);
  assert_eq!(instance.status, InstanceStatus::Running);

  let todo = engine.todo_tasks("u-lead").await.unwrap();
  assert_eq!(todo.len(), 1);
  assert_eq!(todo[0].node_id, "a");
  assert_eq!(todo[0].node_name, "Approve");

  let resolution = engine
    .pass_task(todo[0].task_id, "ok", Variables::new())
    .await
    .unwrap();
  assert_eq!(resolution.status, InstanceStatus::Completed);
  assert!(resolution.current_nodes.is_empty());

  let instance = engine.get_instance(instance_id).await.unwrap();
  assert_eq!(instance.status, InstanceStatus::Completed);
  assert!(instance.finished_at.is_some());

  assert!(engine.todo_tasks("u-lead").await.unwrap().is_empty());
  let done = engine.finished_tasks("u-lead").await.unwrap();
  assert_eq!(done.len(), 1);
  assert_eq!(done[0].comment.as_deref(), Some("ok"));
}

#[tokio::test]
async fn test_start_records_starter_and_comment() {
  let (_, engine) = engine();
  let process_id = publish(&engine, LINEAR).await;

  let instance_id = engine
    .start_instance(process_id, "B-1", "please", vars(&[("starter", "u-7")]))
    .await
    .unwrap();

  let tasks = engine.instance_tasks(instance_id).await.unwrap();
  assert_eq!(tasks[0].node_id, "start");
  assert_eq!(tasks[0].status, TaskStatus::Passed);
  assert_eq!(tasks[0].assignee_id, "u-7");
  assert_eq!(tasks[0].comment.as_deref(), Some("please"));
  assert_eq!(engine.finished_tasks("u-7").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejection_returns_to_start() {
  let (_, engine) = engine();
  let process_id = publish(&engine, LINEAR).await;
  let instance_id = engine
    .start_instance(process_id, "B-100", "", Variables::new())
    .await
    .unwrap();
  let first = pending(&engine, instance_id).await;

  let resolution = engine
    .reject_task(first[0].task_id, "no", Variables::new())
    .await
    .unwrap();
  assert_eq!(resolution.status, InstanceStatus::Running);
  assert_eq!(resolution.current_nodes, vec!["a".to_string()]);

  let again = pending(&engine, instance_id).await;
  assert_eq!(again.len(), 1);
  assert_eq!(again[0].node_id, "a");
  assert_ne!(again[0].task_id, first[0].task_id);

  let rejected = engine.get_task(first[0].task_id).await.unwrap();
  assert_eq!(rejected.status, TaskStatus::Rejected);
  assert_eq!(
    engine.get_instance(instance_id).await.unwrap().status,
    InstanceStatus::Running
  );
}

#[tokio::test]
async fn test_unknown_definition() {
  let (store, engine) = engine();

  let result = engine
    .start_instance(999, "B-1", "", Variables::new())
    .await;

  assert!(matches!(result, Err(EngineError::DefinitionNotFound(999))));
  assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
  assert_eq!(store.instance_count().await, 0);
}

#[tokio::test]
async fn test_missing_start_node_creates_no_instance() {
  let (store, engine) = engine();
  let def = store
    .save_definition(&NewDefinition {
      name: "broken".to_string(),
      resource: "{}".to_string(),
      create_user_id: "u-admin".to_string(),
      source: "office".to_string(),
      nodes: vec![Node::task("a", &["u1"]).then("end"), Node::end("end")],
    })
    .await
    .unwrap();

  let err = engine
    .start_instance(def.process_id, "B-1", "", Variables::new())
    .await
    .unwrap_err();

  assert!(matches!(err, EngineError::MalformedDefinition { .. }));
  assert_eq!(err.kind(), ErrorKind::Malformed);
  assert_eq!(store.instance_count().await, 0);
}

#[tokio::test]
async fn test_invalid_definition_is_not_saved() {
  let (store, engine) = engine();

  let dangling = r#"{"nodes": [
    { "node_id": "start", "node_type": "start", "outgoing": [{ "target": "nowhere" }] }
  ]}"#;
  let err = engine
    .save_definition("bad", dangling, "u-admin", "office")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidInput);

  let err = engine
    .save_definition("bad", "not json", "u-admin", "office")
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::InvalidDefinition(_)));

  assert!(store.list_definitions("office").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_definitions_are_versioned_and_cached() {
  let (store, engine) = engine();
  let v1 = engine.save_definition("leave", LINEAR, "u-admin", "office").await.unwrap();
  let v2 = engine.save_definition("leave", LEAVE, "u-admin", "office").await.unwrap();

  let listed = engine.list_definitions("office").await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].process_id, v2.process_id);
  assert_eq!(listed[0].version, 2);

  // The old version keeps serving running instances.
  let nodes = engine.get_definition(v1.process_id).await.unwrap();
  assert_eq!(nodes.len(), 3);
  engine.get_definition(v1.process_id).await.unwrap();
  assert_eq!(store.node_loads(), 1);

  assert!(engine.invalidate_definition(v1.process_id).await);
  engine.get_definition(v1.process_id).await.unwrap();
  assert_eq!(store.node_loads(), 2);

  engine.clear_definitions().await;
  assert!(engine.cache().is_empty().await);
}

#[tokio::test]
async fn test_guards_route_on_merged_variables() {
  let (_, engine) = engine();
  let process_id = publish(&engine, LEAVE).await;

  let short = engine
    .start_instance(process_id, "B-1", "", vars(&[("lead", "u-lead"), ("days", "2")]))
    .await
    .unwrap();
  let long = engine
    .start_instance(process_id, "B-2", "", vars(&[("lead", "u-lead"), ("days", "2")]))
    .await
    .unwrap();

  let task = pending(&engine, short).await.remove(0);
  assert_eq!(task.assignee_id, "u-lead");
  let resolution = engine.pass_task(task.task_id, "", Variables::new()).await.unwrap();
  assert_eq!(resolution.status, InstanceStatus::Completed);

  // The pass payload overrides `days` before guards are evaluated.
  let task = pending(&engine, long).await.remove(0);
  let resolution = engine
    .pass_task(task.task_id, "", vars(&[("days", "10")]))
    .await
    .unwrap();
  assert_eq!(resolution.current_nodes, vec!["hr".to_string()]);

  let instance = engine.get_instance(long).await.unwrap();
  let stored = Variables::from_json(&instance.variables).unwrap();
  assert_eq!(stored.get("days"), Some("10"));
  assert_eq!(stored.get("lead"), Some("u-lead"));
  assert_eq!(engine.todo_tasks("u-hr").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_replayed_pass_is_rejected_and_changes_nothing() {
  let (_, engine) = engine();
  let process_id = publish(&engine, LEAVE).await;
  let instance_id = engine
    .start_instance(process_id, "B-1", "", vars(&[("lead", "u-lead"), ("days", "5")]))
    .await
    .unwrap();
  let task = pending(&engine, instance_id).await.remove(0);

  let payload = vars(&[("note", "first")]);
  engine.pass_task(task.task_id, "ok", payload.clone()).await.unwrap();
  let after_first = engine.get_instance(instance_id).await.unwrap();

  let replay = engine.pass_task(task.task_id, "ok", payload).await;
  assert!(matches!(
    replay,
    Err(EngineError::AlreadyResolved { status: TaskStatus::Passed, .. })
  ));

  let after_replay = engine.get_instance(instance_id).await.unwrap();
  assert_eq!(after_replay.variables, after_first.variables);
  assert_eq!(after_replay.revision, after_first.revision);
  assert_eq!(after_replay.current_nodes, after_first.current_nodes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pass_and_reject_resolve_once() {
  let (_, engine) = engine();
  let engine = Arc::new(engine);
  let process_id = publish(&engine, LINEAR).await;

  for round in 0..20 {
    let instance_id = engine
      .start_instance(process_id, &format!("B-{round}"), "", Variables::new())
      .await
      .unwrap();
    let task_id = pending(&engine, instance_id).await[0].task_id;

    let passing = {
      let engine = engine.clone();
      tokio::spawn(async move { engine.pass_task(task_id, "", Variables::new()).await })
    };
    let rejecting = {
      let engine = engine.clone();
      tokio::spawn(async move { engine.reject_task(task_id, "", Variables::new()).await })
    };
    let passed = passing.await.unwrap();
    let rejected = rejecting.await.unwrap();

    assert!(passed.is_ok() ^ rejected.is_ok());
    let loser = if passed.is_ok() { rejected } else { passed };
    assert_eq!(loser.unwrap_err().kind(), ErrorKind::AlreadyResolved);

    let instance = engine.get_instance(instance_id).await.unwrap();
    match engine.get_task(task_id).await.unwrap().status {
      TaskStatus::Passed => assert_eq!(instance.status, InstanceStatus::Completed),
      TaskStatus::Rejected => {
        assert_eq!(instance.status, InstanceStatus::Running);
        assert_eq!(instance.current_nodes.0, vec!["a".to_string()]);
      }
      other => panic!("unexpected status {other}"),
    }
  }
}

#[tokio::test]
async fn test_parallel_split_and_join() {
  let (_, engine) = engine();
  let process_id = publish(&engine, PARALLEL).await;
  let instance_id = engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap();

  let instance = engine.get_instance(instance_id).await.unwrap();
  assert_eq!(
    instance.current_nodes.0,
    vec!["legal".to_string(), "finance".to_string()]
  );

  let legal = engine.todo_tasks("u-legal").await.unwrap().remove(0);
  let resolution = engine.pass_task(legal.task_id, "", Variables::new()).await.unwrap();
  assert_eq!(resolution.status, InstanceStatus::Running);
  assert_eq!(
    resolution.current_nodes,
    vec!["finance".to_string(), "join".to_string()]
  );

  let finance = engine.todo_tasks("u-fin").await.unwrap().remove(0);
  let resolution = engine.pass_task(finance.task_id, "", Variables::new()).await.unwrap();
  assert_eq!(resolution.status, InstanceStatus::Completed);
}

#[tokio::test]
async fn test_reject_after_join_arrival_restarts_both_branches() {
  let (_, engine) = engine();
  let process_id = publish(&engine, PARALLEL_REVISE).await;
  let instance_id = engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap();

  let legal = engine.todo_tasks("u-legal").await.unwrap().remove(0);
  engine.pass_task(legal.task_id, "", Variables::new()).await.unwrap();

  let finance = engine.todo_tasks("u-fin").await.unwrap().remove(0);
  let resolution = engine
    .reject_task(finance.task_id, "redo", Variables::new())
    .await
    .unwrap();
  assert_eq!(resolution.status, InstanceStatus::Running);
  assert_eq!(
    resolution.current_nodes,
    vec!["legal".to_string(), "finance".to_string()]
  );
  assert_eq!(pending(&engine, instance_id).await.len(), 2);

  let legal = engine.todo_tasks("u-legal").await.unwrap().remove(0);
  let resolution = engine.pass_task(legal.task_id, "", Variables::new()).await.unwrap();
  assert_eq!(
    resolution.current_nodes,
    vec!["finance".to_string(), "join".to_string()]
  );

  let finance = engine.todo_tasks("u-fin").await.unwrap().remove(0);
  let resolution = engine.pass_task(finance.task_id, "", Variables::new()).await.unwrap();
  assert_eq!(resolution.status, InstanceStatus::Completed);
  assert!(resolution.current_nodes.is_empty());
  assert!(pending(&engine, instance_id).await.is_empty());
}

#[tokio::test]
async fn test_reject_cancels_open_sibling_branch() {
  let (_, engine) = engine();
  let process_id = publish(&engine, PARALLEL_REVISE).await;
  let instance_id = engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap();

  let stale_legal = engine.todo_tasks("u-legal").await.unwrap().remove(0);
  let finance = engine.todo_tasks("u-fin").await.unwrap().remove(0);
  let resolution = engine
    .reject_task(finance.task_id, "redo", Variables::new())
    .await
    .unwrap();
  assert_eq!(resolution.cancelled_tasks, vec![stale_legal.task_id]);
  assert_eq!(
    resolution.current_nodes,
    vec!["legal".to_string(), "finance".to_string()]
  );
  assert_eq!(
    engine.get_task(stale_legal.task_id).await.unwrap().status,
    TaskStatus::Cancelled
  );

  for user in ["u-legal", "u-fin"] {
    let todo = engine.todo_tasks(user).await.unwrap();
    assert_eq!(todo.len(), 1);
    engine.pass_task(todo[0].task_id, "", Variables::new()).await.unwrap();
  }
  assert_eq!(
    engine.get_instance(instance_id).await.unwrap().status,
    InstanceStatus::Completed
  );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_branches_resolved_concurrently() {
  let (_, engine) = engine();
  let engine = Arc::new(engine);
  let process_id = publish(&engine, PARALLEL).await;
  let instance_id = engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap();

  let tasks = pending(&engine, instance_id).await;
  let handles: Vec<_> = tasks
    .into_iter()
    .map(|task| {
      let engine = engine.clone();
      tokio::spawn(async move { engine.pass_task(task.task_id, "", Variables::new()).await })
    })
    .collect();
  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  let instance = engine.get_instance(instance_id).await.unwrap();
  assert_eq!(instance.status, InstanceStatus::Completed);
  assert!(instance.current_nodes.0.is_empty());
}

#[tokio::test]
async fn test_countersign_waits_for_every_assignee() {
  let (_, engine) = engine();
  let process_id = publish(&engine, BOARD).await;
  let instance_id = engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap();

  let tasks = pending(&engine, instance_id).await;
  assert_eq!(tasks.len(), 3);

  let first = engine.pass_task(tasks[0].task_id, "", Variables::new()).await.unwrap();
  assert_eq!(first.status, InstanceStatus::Running);
  assert_eq!(first.current_nodes, vec!["board".to_string()]);
  assert!(first.cancelled_tasks.is_empty());

  engine.pass_task(tasks[1].task_id, "", Variables::new()).await.unwrap();
  let last = engine.pass_task(tasks[2].task_id, "", Variables::new()).await.unwrap();
  assert_eq!(last.status, InstanceStatus::Completed);
}

#[tokio::test]
async fn test_countersign_reject_decides_immediately() {
  let (_, engine) = engine();
  let process_id = publish(&engine, BOARD).await;
  let instance_id = engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap();
  let tasks = pending(&engine, instance_id).await;

  engine.pass_task(tasks[0].task_id, "", Variables::new()).await.unwrap();
  let rejected = engine.reject_task(tasks[1].task_id, "", Variables::new()).await.unwrap();

  assert_eq!(rejected.cancelled_tasks, vec![tasks[2].task_id]);
  assert_eq!(
    engine.get_task(tasks[2].task_id).await.unwrap().status,
    TaskStatus::Cancelled
  );
  // Back through start: a fresh round of three tasks.
  assert_eq!(pending(&engine, instance_id).await.len(), 3);
}

#[tokio::test]
async fn test_first_assignee_decides_without_countersign() {
  let (_, engine) = engine();
  let process_id = publish(&engine, ANY_OF).await;
  let instance_id = engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap();
  let tasks = pending(&engine, instance_id).await;
  assert_eq!(tasks.len(), 2);

  let resolution = engine.pass_task(tasks[1].task_id, "", Variables::new()).await.unwrap();
  assert_eq!(resolution.status, InstanceStatus::Completed);
  assert_eq!(resolution.cancelled_tasks, vec![tasks[0].task_id]);

  let late = engine.pass_task(tasks[0].task_id, "", Variables::new()).await;
  assert!(matches!(
    late,
    Err(EngineError::AlreadyResolved { status: TaskStatus::Cancelled, .. })
  ));
}

#[tokio::test]
async fn test_reject_without_target() {
  let (_, engine) = engine();
  let process_id = publish(&engine, ANY_OF).await;
  let instance_id = engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap();
  let task = pending(&engine, instance_id).await.remove(0);

  let err = engine.reject_task(task.task_id, "", Variables::new()).await.unwrap_err();
  assert!(matches!(err, EngineError::Routing { .. }));
  assert_eq!(engine.get_task(task.task_id).await.unwrap().status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_terminate_cancels_pending_tasks() {
  let (_, engine) = engine();
  let process_id = publish(&engine, PARALLEL).await;
  let instance_id = engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap();

  let cancelled = engine.terminate_instance(instance_id).await.unwrap();
  assert_eq!(cancelled.len(), 2);

  let instance = engine.get_instance(instance_id).await.unwrap();
  assert_eq!(instance.status, InstanceStatus::Terminated);
  assert!(pending(&engine, instance_id).await.is_empty());

  let again = engine.terminate_instance(instance_id).await.unwrap_err();
  assert!(matches!(again, EngineError::InstanceNotRunning { .. }));

  let task = engine.get_task(cancelled[0]).await.unwrap();
  assert_eq!(task.status, TaskStatus::Cancelled);
}

#[tokio::test]
async fn test_start_handling_failure_is_partial_success() {
  let (_, engine) = engine();
  let process_id = publish(&engine, LEAVE).await;

  // `lead` is missing, so the first task has nobody to assign.
  let err = engine
    .start_instance(process_id, "B-1", "", vars(&[("days", "1")]))
    .await
    .unwrap_err();

  let instance_id = err.created_instance().unwrap();
  assert!(matches!(err, EngineError::StartHandling { .. }));

  let instance = engine.get_instance(instance_id).await.unwrap();
  assert_eq!(instance.status, InstanceStatus::Running);
  assert_eq!(instance.current_nodes.0, vec!["start".to_string()]);

  engine.terminate_instance(instance_id).await.unwrap();
}

#[tokio::test]
async fn test_duplicate_business_key_is_rejected() {
  let store = Arc::new(MemoryStore::new().with_unique_business_key(true));
  let engine = ProcessEngine::new(store.clone());
  let process_id = publish(&engine, LINEAR).await;

  engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap();
  let err = engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap_err();

  assert!(matches!(err, EngineError::Rejected(_)));
  assert!(err.kind().is_client_error());
  assert_eq!(store.instance_count().await, 1);
}

#[tokio::test]
async fn test_unknown_ids() {
  let (_, engine) = engine();

  assert!(matches!(
    engine.pass_task(42, "", Variables::new()).await,
    Err(EngineError::TaskNotFound(42))
  ));
  assert!(matches!(
    engine.get_instance(42).await,
    Err(EngineError::InstanceNotFound(42))
  ));
  assert!(matches!(
    engine.terminate_instance(42).await,
    Err(EngineError::InstanceNotFound(42))
  ));
}

#[tokio::test]
async fn test_zero_retry_config_still_resolves() {
  let store = Arc::new(MemoryStore::new());
  let engine = ProcessEngine::with_config(
    store,
    EngineConfig {
      max_conflict_retries: 0,
      ..EngineConfig::default()
    },
  );
  let process_id = publish(&engine, LINEAR).await;
  let instance_id = engine
    .start_instance(process_id, "B-1", "", Variables::new())
    .await
    .unwrap();
  let task = pending(&engine, instance_id).await.remove(0);

  let resolution = engine.pass_task(task.task_id, "", Variables::new()).await.unwrap();
  assert_eq!(resolution.status, InstanceStatus::Completed);
}

#[tokio::test]
async fn test_linear_approval_on_sqlite() {
  let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
  store.migrate().await.unwrap();
  let engine = ProcessEngine::new(Arc::new(store));
  let process_id = publish(&engine, LINEAR).await;

  let instance_id = engine
    .start_instance(process_id, "B-100", "", Variables::new())
    .await
    .unwrap();
  let task = engine.todo_tasks("u-lead").await.unwrap().remove(0);

  let rejected = engine.reject_task(task.task_id, "no", Variables::new()).await.unwrap();
  assert_eq!(rejected.current_nodes, vec!["a".to_string()]);

  let task = engine.todo_tasks("u-lead").await.unwrap().remove(0);
  let passed = engine.pass_task(task.task_id, "ok", Variables::new()).await.unwrap();
  assert_eq!(passed.status, InstanceStatus::Completed);

  let tasks = engine.instance_tasks(instance_id).await.unwrap();
  let statuses: Vec<TaskStatus> = tasks.iter().map(|t| t.status).collect();
  assert_eq!(
    statuses,
    vec![TaskStatus::Passed, TaskStatus::Rejected, TaskStatus::Passed]
  );
}
