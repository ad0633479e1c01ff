//! SQLite storage facade

use std::path::Path;
use std::str::FromStr;

use rusqlite::Connection;
use tracing::debug;

use crate::config::StorageConfig;
use crate::entity::{self, EntityType};
use crate::key::IntoRecordKey;
use crate::record::{Record, Value};
use crate::Result;
use super::dataset::{Dataset, TraceHook, validate_identifier};
use super::migration::{Migration, Migrator};
use super::schema;

/// Table prefix used unless the caller picks another one
pub const DEFAULT_TABLE_PREFIX: &str = "swarm";

/// Construction options for [`Storage`]
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Every managed table is named `{table_prefix}_{base}`
    pub table_prefix: String,
    /// Do not migrate to latest on construction
    pub skip_migrations: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            skip_migrations: false,
        }
    }
}

impl StorageOptions {
    pub fn skip_migrations(mut self) -> Self {
        self.skip_migrations = true;
        self
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }
}

/// Which branch [`Storage::set`] took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Created,
    Updated,
}

/// Key-addressed persistence for the engine's entities.
///
/// One facade per connection. Every operation is a blocking call on that
/// connection; nothing is coordinated across calls.
pub struct Storage {
    conn: Connection,
    table_prefix: String,
    migrations: Vec<Migration>,
    trace: Option<TraceHook>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("table_prefix", &self.table_prefix)
            .field("migrations", &self.migrations.len())
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

impl Storage {
    /// Wrap an open connection, migrating to latest unless skipped
    pub fn new(conn: Connection, options: StorageOptions) -> Result<Self> {
        Self::with_migrations(conn, options, schema::migrations())
    }

    /// Like [`Storage::new`] with an explicit migration list
    pub fn with_migrations(conn: Connection, options: StorageOptions, migrations: Vec<Migration>) -> Result<Self> {
        validate_identifier(&options.table_prefix)?;
        // Fail on a malformed list even when migrations are skipped
        Migrator::new(&migrations, &options.table_prefix)?;

        let storage = Self {
            conn,
            table_prefix: options.table_prefix,
            migrations,
            trace: None,
        };

        if !options.skip_migrations {
            storage.migrate(None)?;
        }
        Ok(storage)
    }

    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path, options: StorageOptions) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::new(conn, options)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(options: StorageOptions) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::new(conn, options)
    }

    /// Build from a loaded config; no database path means in-memory
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let options = config.storage_options();
        match &config.database {
            Some(path) => Self::open(Path::new(path), options),
            None => Self::open_in_memory(options),
        }
    }

    /// The underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    // ========== Trace ==========

    pub fn trace(&self) -> Option<&TraceHook> {
        self.trace.as_ref()
    }

    /// Install an observer that receives every statement run through a dataset
    pub fn set_trace(&mut self, hook: TraceHook) {
        self.trace = Some(hook);
    }

    pub fn clear_trace(&mut self) {
        self.trace = None;
    }

    // ========== Migrations ==========

    /// Migrate to `version`, or to the latest migration when `None`.
    /// Returns the version the schema ends at.
    pub fn migrate(&self, version: Option<u32>) -> Result<u32> {
        let migrator = Migrator::new(&self.migrations, &self.table_prefix)?;
        migrator.run(&self.conn, version)
    }

    /// Currently applied schema version (0 on an untouched database)
    pub fn schema_version(&self) -> Result<u32> {
        Migrator::new(&self.migrations, &self.table_prefix)?.current_version(&self.conn)
    }

    /// Name of the version-tracking table
    pub fn schema_table_name(&self) -> String {
        format!("{}_schema_info", self.table_prefix)
    }

    // ========== Type Resolution ==========

    /// `{prefix}_{base}` for a registered logical type
    pub fn table_name_for_type(&self, type_name: &str) -> Result<String> {
        Ok(self.table_name(EntityType::from_str(type_name)?))
    }

    fn table_name(&self, entity_type: EntityType) -> String {
        format!("{}_{}", self.table_prefix, entity_type.table_base_name())
    }

    /// Unfiltered dataset over the type's table. Rows of every concrete
    /// subtype sharing the table are included.
    pub fn dataset_for_type(&self, type_name: &str) -> Result<Dataset<'_>> {
        self.dataset(EntityType::from_str(type_name)?)
    }

    fn dataset(&self, entity_type: EntityType) -> Result<Dataset<'_>> {
        Ok(Dataset::new(&self.conn, self.table_name(entity_type))?.with_trace(self.trace.clone()))
    }

    /// Every primary key in the type's table, in no particular order
    pub fn ids_for_type(&self, type_name: &str) -> Result<Vec<String>> {
        let ids = self
            .dataset_for_type(type_name)?
            .select_map("id")?
            .iter()
            .filter_map(Value::to_text)
            .collect();
        Ok(ids)
    }

    /// All rows of the type's table. With `include_subtypes` false, only rows
    /// whose `type` column is exactly `type_name`.
    pub fn all_of_type(&self, type_name: &str, include_subtypes: bool) -> Result<Vec<Record>> {
        let dataset = self.dataset_for_type(type_name)?;
        if include_subtypes {
            dataset.all()
        } else {
            dataset.filter("type", type_name)?.all()
        }
    }

    // ========== Associations ==========

    /// Foreign-key column for an owner of the given type: `PartyKnuckles` ->
    /// `party_knuckles_id`
    pub fn association_key_for_type(&self, type_name: &str) -> String {
        entity::association_key_for_type(type_name)
    }

    /// Rows of `type_name` whose foreign key equals `owner_id`.
    ///
    /// `type_name` may be namespaced (`Swarm::Process`). The foreign key
    /// defaults to [`Storage::association_key_for_type`] of its short name.
    pub fn load_associations(
        &self,
        owner_id: &str,
        type_name: &str,
        foreign_key: Option<&str>,
    ) -> Result<Dataset<'_>> {
        let short_name = entity::short_type_name(type_name);
        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(|| self.association_key_for_type(short_name));

        self.dataset_for_type(short_name)?.filter(&foreign_key, owner_id)
    }

    /// Point the associated row's foreign key at `owner_id`. Returns rows
    /// affected (0 when the associated row does not exist).
    pub fn add_association(
        &self,
        owner_id: &str,
        associated_id: &str,
        type_name: &str,
        foreign_key: Option<&str>,
    ) -> Result<usize> {
        let short_name = entity::short_type_name(type_name);
        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(|| self.association_key_for_type(short_name));

        self.dataset_for_type(short_name)?
            .filter("id", associated_id)?
            .update(&Record::new().with(foreign_key, owner_id))
    }

    // ========== Key Operations ==========

    /// Record at `key`, or `None` when there is no such row
    pub fn get(&self, key: impl IntoRecordKey) -> Result<Option<Record>> {
        let key = key.into_record_key()?;
        self.dataset(key.entity_type)?.filter("id", key.id)?.first()
    }

    /// Create or update the record at `key`.
    ///
    /// An existing row is rewritten from its current values with `values`
    /// laid over them; a missing row is inserted. The id always comes from
    /// the key. Existence check and write are separate statements, so a
    /// concurrent `set` on the same new key can fail with a constraint
    /// violation (see [`crate::Error::is_constraint_violation`]).
    pub fn set(&self, key: impl IntoRecordKey, values: Record) -> Result<SetOutcome> {
        let key = key.into_record_key()?;
        let existing = self.dataset(key.entity_type)?.filter("id", key.id.as_str())?.first()?;

        match existing {
            Some(existing) => {
                debug!(key = %key, "updating existing record");
                self.update_record(key.entity_type, &key.id, existing.merged(values))?;
                Ok(SetOutcome::Updated)
            }
            None => {
                debug!(key = %key, "creating record");
                self.create_record(key.entity_type, values.with("id", key.id))?;
                Ok(SetOutcome::Created)
            }
        }
    }

    /// Insert a row as given
    pub fn create_record(&self, entity_type: EntityType, values: Record) -> Result<()> {
        self.dataset(entity_type)?.insert(&values)
    }

    /// Replace the row with id `id`.
    ///
    /// Every declared column of the type is nulled first and `values` laid
    /// over that, so the row ends up holding exactly `values` plus the id.
    /// Returns rows affected.
    pub fn update_record(&self, entity_type: EntityType, id: &str, values: Record) -> Result<usize> {
        let cleared: Record = entity_type
            .columns()
            .iter()
            .map(|column| (*column, Value::Null))
            .collect();
        let row = cleared.merged(values).with("id", id);

        self.dataset(entity_type)?.filter("id", id)?.update(&row)
    }

    /// Delete the record at `key`; returns rows affected (0 if absent)
    pub fn delete(&self, key: impl IntoRecordKey) -> Result<usize> {
        let key = key.into_record_key()?;
        self.dataset(key.entity_type)?.filter("id", key.id)?.delete()
    }

    // ========== Bulk Operations ==========

    /// Empty every managed table
    pub fn truncate(&self) -> Result<()> {
        for entity_type in EntityType::all() {
            self.dataset(*entity_type)?.truncate()?;
        }
        Ok(())
    }

    /// Row count per managed table
    pub fn stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            process_definitions: self.dataset(EntityType::ProcessDefinition)?.count()?,
            processes: self.dataset(EntityType::Process)?.count()?,
            expressions: self.dataset(EntityType::Expression)?.count()?,
            stored_workitems: self.dataset(EntityType::StoredWorkitem)?.count()?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    pub process_definitions: usize,
    pub processes: usize,
    pub expressions: usize,
    pub stored_workitems: usize,
}

impl std::fmt::Display for StorageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Storage Statistics:")?;
        writeln!(f, "  Process definitions: {}", self.process_definitions)?;
        writeln!(f, "  Processes: {}", self.processes)?;
        writeln!(f, "  Expressions: {}", self.expressions)?;
        writeln!(f, "  Stored workitems: {}", self.stored_workitems)
    }
}
