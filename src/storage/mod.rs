//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables (prefix `swarm` by default):
//! - swarm_process_definitions(id, type, tree, name, version, ...)
//! - swarm_processes(id, type, process_definition_id, workitem, ...)
//! - swarm_expressions(id, type, parent_id, position, workitem, process_id, ...)
//! - swarm_stored_workitems(id, type, expression_id, ...)
//! - swarm_schema_info(version)

pub mod dataset;
pub mod migration;
pub mod schema;
pub mod sqlite;

pub use dataset::{Dataset, TraceHook};
pub use migration::{Migration, Migrator};
pub use sqlite::{Storage, StorageOptions, StorageStats, SetOutcome, DEFAULT_TABLE_PREFIX};
