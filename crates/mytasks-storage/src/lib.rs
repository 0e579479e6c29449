//! MyTasks Storage - persistence layer for the mytasks tracker
//!
//! This crate stores projects and their tasks in a single local database
//! file through turso (SQLite-compatible).
//!
//! # Overview
//!
//! - [`Store`] is the contract every backend implements
//! - [`SqliteStore`] is the on-disk backend, migrated on open
//! - [`MemoryStore`] follows the same rules without touching disk
//! - [`migrate`] embeds the versioned schema and adopts legacy databases
//! - [`OpContext`] carries the caller's deadline into each call
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │         Application Layer                   │
//! │  (CLI, handlers)                            │
//! └─────────────────┬───────────────────────────┘
//!                   │  Store trait
//! ┌─────────────────▼───────────────────────────┐
//! │         MyTasks Storage (this crate)        │
//! │  • SqliteStore / MemoryStore                │
//! │  • Schema migrations                        │
//! │  • Agenda loading                           │
//! └─────────────────┬───────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────┐
//! │         Turso Database                      │
//! │  • ./data/mytasks.db                        │
//! │  • WAL mode                                 │
//! │  • Tables: projects, tasks,                 │
//! │    schema_migrations                        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use mytasks_core::{Priority, Project, ProjectType, Task};
//! use mytasks_storage::{OpContext, SqliteStore, Store, StoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::open(StoreConfig::from_env()).await?;
//! let cx = OpContext::background();
//!
//! let project = store
//!     .create_project(&cx, &Project::new("Garden", ProjectType::Project))
//!     .await?;
//! let task = Task::new(project.id, "Plant tomatoes", Priority::High);
//! task.validate()?;
//! store.create_task(&cx, &task).await?;
//!
//! let open = store
//!     .list_tasks_by_project_filtered(&cx, project.id, false, 0)
//!     .await?;
//! println!("{} open tasks", open.len());
//!
//! store.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod agenda;
pub mod config;
pub mod context;
pub mod dates;
pub mod db;
pub mod error;
pub mod memory;
pub mod migrate;
pub mod store;

// Re-export commonly used types
pub use agenda::load_agenda;
pub use config::StoreConfig;
pub use context::OpContext;
pub use db::SqliteStore;
pub use error::{DbError, MigrationError, Result};
pub use memory::MemoryStore;
pub use migrate::{AppliedMigration, Migration};
pub use store::Store;
