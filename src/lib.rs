//! # Swarm Storage - Relational persistence for the swarm workflow engine
//!
//! Maps the engine's polymorphic entities onto SQLite tables and hands back
//! plain field mappings instead of rich objects.
//!
//! Swarm Storage provides:
//! - A fixed registry of logical entity types and their tables
//! - Composite `Type:id` keys for get / set / delete
//! - Versioned, reversible schema migrations tracked per table prefix
//! - Association lookup by foreign key and subtype-aware enumeration

pub mod key;
pub mod entity;
pub mod record;
pub mod storage;
pub mod config;
pub mod telemetry;


// Re-exports for convenient access
pub use key::{IntoRecordKey, RecordKey};
pub use entity::EntityType;
pub use record::{Record, Value};
pub use storage::{Dataset, Migration, Migrator, SetOutcome, Storage, StorageOptions, TraceHook};
pub use config::StorageConfig;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for storage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the backend rejected a write on a constraint (primary key,
    /// unique index, NOT NULL).
    ///
    /// Two writers racing `Storage::set` on the same new key both see "absent"
    /// and both insert; the loser gets this error and may retry as an update.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::Storage(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
