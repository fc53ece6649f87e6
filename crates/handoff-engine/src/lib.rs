//! Handoff Engine
//!
//! This crate runs process instances: it starts them, moves their tokens
//! when participants pass or reject tasks, and terminates them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ProcessEngine                          │
//! │  - definitions: save / list / get / invalidate              │
//! │  - instances: start / get / terminate                       │
//! │  - tasks: pass / reject / todo / finished                   │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                      │
//!          ▼                    ▼                      ▼
//! ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────┐
//! │ DefinitionCache  │ │     Planner      │ │      Store       │
//! │ load once per id │ │ token traversal  │ │ atomic advance   │
//! └──────────────────┘ └──────────────────┘ └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let store = Arc::new(SqliteStore::connect("sqlite://handoff.db").await?);
//! store.migrate().await?;
//! let engine = ProcessEngine::new(store);
//!
//! let def = engine.save_definition("leave", resource, "u-admin", "office").await?;
//! let instance_id = engine.start_instance(def.process_id, "B-100", "", vars).await?;
//! for task in engine.todo_tasks("u-lead").await? {
//!   engine.pass_task(task.task_id, "ok", Variables::new()).await?;
//! }
//! ```

mod cache;
mod config;
mod engine;
mod error;
mod lifecycle;
mod resolution;
mod traversal;

pub use cache::DefinitionCache;
pub use config::EngineConfig;
pub use engine::ProcessEngine;
pub use error::{EngineError, ErrorKind};
pub use lifecycle::STARTER_VARIABLE;
pub use resolution::Resolution;
