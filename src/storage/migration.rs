//! Versioned schema migrations
//!
//! Migrations are numbered 1..=N without gaps. The applied version lives in a
//! single-row `{prefix}_schema_info` table; a database without that table is
//! at version 0. Each step runs in its own transaction together with the
//! version bump, so a failing step leaves the database at the last good
//! version.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::{Error, Result};
use super::dataset::validate_identifier;
use super::schema::render;

/// One reversible schema change.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    /// Forward statements, `{prefix}` templated
    pub up: &'static [&'static str],
    /// Statements undoing `up`
    pub down: &'static [&'static str],
}

impl Migration {
    pub const fn new(
        version: u32,
        name: &'static str,
        up: &'static [&'static str],
        down: &'static [&'static str],
    ) -> Self {
        Self { version, name, up, down }
    }
}

/// Applies an ordered migration list against one table prefix.
#[derive(Debug)]
pub struct Migrator<'a> {
    migrations: &'a [Migration],
    prefix: String,
    table: String,
}

impl<'a> Migrator<'a> {
    /// Build a migrator; the list must be sorted and numbered 1..=N, and
    /// the prefix a plain identifier.
    pub fn new(migrations: &'a [Migration], prefix: &str) -> Result<Self> {
        validate_identifier(prefix)?;
        for (index, migration) in migrations.iter().enumerate() {
            let expected = index as u32 + 1;
            if migration.version != expected {
                return Err(Error::Migration(format!(
                    "expected migration {} but found {} ({})",
                    expected, migration.version, migration.name
                )));
            }
        }

        Ok(Self {
            migrations,
            prefix: prefix.to_string(),
            table: format!("{}_schema_info", prefix),
        })
    }

    /// Name of the version-tracking table
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Highest known migration version (0 for an empty list)
    pub fn latest_version(&self) -> u32 {
        self.migrations.len() as u32
    }

    /// Version recorded in the tracking table, 0 when it does not exist yet
    pub fn current_version(&self, conn: &Connection) -> Result<u32> {
        if !table_exists(conn, &self.table)? {
            return Ok(0);
        }

        let version: Option<i64> = conn
            .query_row(&format!("SELECT version FROM {} LIMIT 1", self.table), [], |row| row.get(0))
            .optional()?;
        let version = version.unwrap_or(0);
        u32::try_from(version)
            .map_err(|_| Error::Migration(format!("{} holds invalid version {}", self.table, version)))
    }

    /// Migrate up or down to `target` (latest when `None`). Returns the
    /// version the database ends at.
    pub fn run(&self, conn: &Connection, target: Option<u32>) -> Result<u32> {
        let latest = self.latest_version();
        let target = target.unwrap_or(latest);
        if target > latest {
            return Err(Error::Migration(format!(
                "target version {} is beyond the latest migration {}",
                target, latest
            )));
        }

        self.ensure_tracking_table(conn)?;
        let current = self.current_version(conn)?;
        if current > latest {
            return Err(Error::Migration(format!(
                "database is at version {} but only {} migrations are known",
                current, latest
            )));
        }

        if target == current {
            debug!(table = %self.table, version = current, "schema up to date");
            return Ok(current);
        }

        info!(table = %self.table, from = current, to = target, "migrating schema");

        if target > current {
            for migration in &self.migrations[current as usize..target as usize] {
                self.apply(conn, migration.up, migration.version)?;
                debug!(version = migration.version, name = migration.name, "applied migration");
            }
        } else {
            for migration in self.migrations[target as usize..current as usize].iter().rev() {
                self.apply(conn, migration.down, migration.version - 1)?;
                debug!(version = migration.version, name = migration.name, "reverted migration");
            }
        }

        Ok(target)
    }

    fn ensure_tracking_table(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            &format!("CREATE TABLE IF NOT EXISTS {} (version INTEGER NOT NULL DEFAULT 0)", self.table),
            [],
        )?;
        let rows: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| row.get(0))?;
        if rows == 0 {
            conn.execute(&format!("INSERT INTO {} (version) VALUES (0)", self.table), [])?;
        }
        Ok(())
    }

    fn apply(&self, conn: &Connection, statements: &[&str], resulting_version: u32) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        for stmt in statements {
            tx.execute_batch(&render(stmt, &self.prefix))?;
        }
        tx.execute(&format!("UPDATE {} SET version = ?1", self.table), params![resulting_version])?;
        tx.commit()?;
        Ok(())
    }
}

/// Whether a table with this name exists
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 LIMIT 1",
            params![name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES_UP: &[&str] = &["CREATE TABLE {prefix}_notes (id TEXT PRIMARY KEY)"];
    const NOTES_DOWN: &[&str] = &["DROP TABLE {prefix}_notes"];
    const TAGS_UP: &[&str] = &["CREATE TABLE {prefix}_tags (id TEXT PRIMARY KEY)"];
    const TAGS_DOWN: &[&str] = &["DROP TABLE {prefix}_tags"];
    const BROKEN_UP: &[&str] = &["CREATE TABLE {prefix}_broken (", "nonsense"];

    fn two_steps() -> Vec<Migration> {
        vec![
            Migration::new(1, "notes", NOTES_UP, NOTES_DOWN),
            Migration::new(2, "tags", TAGS_UP, TAGS_DOWN),
        ]
    }

    #[test]
    fn test_fresh_database_is_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        let migrations = two_steps();
        let migrator = Migrator::new(&migrations, "t").unwrap();

        assert_eq!(migrator.current_version(&conn).unwrap(), 0);
        assert!(!table_exists(&conn, "t_schema_info").unwrap());
    }

    #[test]
    fn test_migrate_up_and_down() {
        let conn = Connection::open_in_memory().unwrap();
        let migrations = two_steps();
        let migrator = Migrator::new(&migrations, "t").unwrap();

        assert_eq!(migrator.run(&conn, None).unwrap(), 2);
        assert!(table_exists(&conn, "t_notes").unwrap());
        assert!(table_exists(&conn, "t_tags").unwrap());
        assert_eq!(migrator.current_version(&conn).unwrap(), 2);

        assert_eq!(migrator.run(&conn, Some(1)).unwrap(), 1);
        assert!(table_exists(&conn, "t_notes").unwrap());
        assert!(!table_exists(&conn, "t_tags").unwrap());

        assert_eq!(migrator.run(&conn, Some(0)).unwrap(), 0);
        assert!(!table_exists(&conn, "t_notes").unwrap());
        assert_eq!(migrator.current_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_rerun_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        let migrations = two_steps();
        let migrator = Migrator::new(&migrations, "t").unwrap();

        migrator.run(&conn, None).unwrap();
        // A second pass would fail on CREATE TABLE if it re-applied anything
        assert_eq!(migrator.run(&conn, None).unwrap(), 2);

        let rows: i64 = conn.query_row("SELECT COUNT(*) FROM t_schema_info", [], |r| r.get(0)).unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_prefixes_are_tracked_separately() {
        let conn = Connection::open_in_memory().unwrap();
        let migrations = two_steps();

        Migrator::new(&migrations, "a").unwrap().run(&conn, Some(1)).unwrap();
        let b = Migrator::new(&migrations, "b").unwrap();
        assert_eq!(b.current_version(&conn).unwrap(), 0);
        b.run(&conn, None).unwrap();

        assert!(table_exists(&conn, "a_notes").unwrap());
        assert!(!table_exists(&conn, "a_tags").unwrap());
        assert!(table_exists(&conn, "b_tags").unwrap());
    }

    #[test]
    fn test_rejects_gaps_and_unknown_targets() {
        let gapped = vec![
            Migration::new(1, "notes", NOTES_UP, NOTES_DOWN),
            Migration::new(3, "tags", TAGS_UP, TAGS_DOWN),
        ];
        assert!(matches!(Migrator::new(&gapped, "t"), Err(Error::Migration(_))));

        let conn = Connection::open_in_memory().unwrap();
        let migrations = two_steps();
        let migrator = Migrator::new(&migrations, "t").unwrap();
        assert!(matches!(migrator.run(&conn, Some(3)), Err(Error::Migration(_))));
    }

    #[test]
    fn test_database_ahead_of_code() {
        let conn = Connection::open_in_memory().unwrap();
        let migrations = two_steps();
        Migrator::new(&migrations, "t").unwrap().run(&conn, None).unwrap();

        let older = &migrations[..1];
        let migrator = Migrator::new(older, "t").unwrap();
        assert!(matches!(migrator.run(&conn, None), Err(Error::Migration(_))));
    }

    #[test]
    fn test_failed_step_keeps_last_good_version() {
        let conn = Connection::open_in_memory().unwrap();
        let migrations = vec![
            Migration::new(1, "notes", NOTES_UP, NOTES_DOWN),
            Migration::new(2, "broken", BROKEN_UP, &[]),
        ];
        let migrator = Migrator::new(&migrations, "t").unwrap();

        assert!(matches!(migrator.run(&conn, None), Err(Error::Storage(_))));
        assert_eq!(migrator.current_version(&conn).unwrap(), 1);
        assert!(table_exists(&conn, "t_notes").unwrap());
    }

    #[test]
    fn test_rejects_unsafe_prefix() {
        let migrations = two_steps();
        assert!(matches!(Migrator::new(&migrations, "x; DROP TABLE y"), Err(Error::InvalidColumn(_))));
        assert!(matches!(Migrator::new(&migrations, ""), Err(Error::InvalidColumn(_))));
    }

    #[test]
    fn test_out_of_range_version_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        let migrations = two_steps();
        let migrator = Migrator::new(&migrations, "t").unwrap();
        migrator.run(&conn, Some(1)).unwrap();

        for bad in [-1i64, 1 << 32] {
            conn.execute("UPDATE t_schema_info SET version = ?1", params![bad]).unwrap();
            assert!(matches!(migrator.current_version(&conn), Err(Error::Migration(_))));
            assert!(matches!(migrator.run(&conn, None), Err(Error::Migration(_))));
        }
    }
}
