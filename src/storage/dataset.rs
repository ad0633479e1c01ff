//! Dataset - a table-scoped query handle
//!
//! A `Dataset` names one table plus a conjunction of equality filters. It
//! runs nothing until a terminal method (`all`, `first`, `update`, ...) is
//! called, so callers can keep narrowing it first.

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use rusqlite::{Connection, params_from_iter};

use crate::record::{Record, Value};
use crate::{Error, Result};

/// Observer receiving every SQL statement the storage executes
pub type TraceHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Reject anything that is not a plain SQL identifier. Column and table
/// names are spliced into statements, not bound.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let ident = IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

    if ident.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidColumn(name.to_string()))
    }
}

/// Backtick-quote a validated identifier. SQLite reads an unknown
/// double-quoted name as a string literal; backticks never fall back.
fn quote(name: &str) -> String {
    format!("`{}`", name)
}

/// Table-scoped, filterable query handle
#[derive(Clone)]
pub struct Dataset<'a> {
    conn: &'a Connection,
    table: String,
    filters: Vec<(String, Value)>,
    trace: Option<TraceHook>,
}

impl fmt::Debug for Dataset<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("table", &self.table)
            .field("filters", &self.filters)
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

impl<'a> Dataset<'a> {
    /// Unfiltered dataset over `table`
    pub fn new(conn: &'a Connection, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self {
            conn,
            table,
            filters: Vec::new(),
            trace: None,
        })
    }

    pub(crate) fn with_trace(mut self, trace: Option<TraceHook>) -> Self {
        self.trace = trace;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Narrow to rows where `column` equals `value`
    pub fn filter(mut self, column: &str, value: impl Into<Value>) -> Result<Self> {
        validate_identifier(column)?;
        self.filters.push((column.to_string(), value.into()));
        Ok(self)
    }

    /// Fetch every matching row
    pub fn all(&self) -> Result<Vec<Record>> {
        let sql = format!("SELECT * FROM {}{}", quote(&self.table), self.where_clause());
        self.query_records(&sql)
    }

    /// Fetch the first matching row, if any
    pub fn first(&self) -> Result<Option<Record>> {
        let sql = format!("SELECT * FROM {}{} LIMIT 1", quote(&self.table), self.where_clause());
        Ok(self.query_records(&sql)?.into_iter().next())
    }

    /// Count matching rows
    pub fn count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}{}", quote(&self.table), self.where_clause());
        self.log_statement(&sql);
        let count: i64 = self.conn.query_row(&sql, params_from_iter(self.filter_values()), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Values of a single column across matching rows
    pub fn select_map(&self, column: &str) -> Result<Vec<Value>> {
        validate_identifier(column)?;
        let sql = format!("SELECT {} FROM {}{}", quote(column), quote(&self.table), self.where_clause());
        self.log_statement(&sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let values = stmt
            .query_map(params_from_iter(self.filter_values()), |row| row.get::<_, Value>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(values)
    }

    /// Insert one row. Filters are ignored.
    pub fn insert(&self, values: &Record) -> Result<()> {
        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote(&self.table))
        } else {
            let mut columns = Vec::with_capacity(values.len());
            for column in values.columns() {
                validate_identifier(column)?;
                columns.push(quote(column));
            }
            let placeholders = vec!["?"; values.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(&self.table),
                columns.join(", "),
                placeholders
            )
        };
        self.log_statement(&sql);

        self.conn.execute(&sql, params_from_iter(values.iter().map(|(_, v)| v)))?;
        Ok(())
    }

    /// Set the given columns on every matching row; returns rows affected.
    /// An empty record changes nothing and reports how many rows match.
    pub fn update(&self, values: &Record) -> Result<usize> {
        if values.is_empty() {
            return self.count();
        }

        let mut assignments = Vec::with_capacity(values.len());
        for column in values.columns() {
            validate_identifier(column)?;
            assignments.push(format!("{} = ?", quote(column)));
        }
        let sql = format!(
            "UPDATE {} SET {}{}",
            quote(&self.table),
            assignments.join(", "),
            self.where_clause()
        );
        self.log_statement(&sql);

        let params = values.iter().map(|(_, v)| v).chain(self.filter_values());
        let affected = self.conn.execute(&sql, params_from_iter(params))?;
        Ok(affected)
    }

    /// Delete matching rows; returns rows affected (0 is not an error)
    pub fn delete(&self) -> Result<usize> {
        let sql = format!("DELETE FROM {}{}", quote(&self.table), self.where_clause());
        self.log_statement(&sql);
        let affected = self.conn.execute(&sql, params_from_iter(self.filter_values()))?;
        Ok(affected)
    }

    /// Empty the whole table, regardless of filters
    pub fn truncate(&self) -> Result<()> {
        let sql = format!("DELETE FROM {}", quote(&self.table));
        self.log_statement(&sql);
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    fn where_clause(&self) -> String {
        if self.filters.is_empty() {
            return String::new();
        }
        let conditions: Vec<String> = self
            .filters
            .iter()
            .map(|(column, _)| format!("{} = ?", quote(column)))
            .collect();
        format!(" WHERE {}", conditions.join(" AND "))
    }

    fn filter_values(&self) -> impl Iterator<Item = &Value> {
        self.filters.iter().map(|(_, v)| v)
    }

    fn query_records(&self, sql: &str) -> Result<Vec<Record>> {
        self.log_statement(sql);

        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let records = stmt
            .query_map(params_from_iter(self.filter_values()), |row| row_to_record(row, &columns))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn log_statement(&self, sql: &str) {
        tracing::debug!(table = %self.table, sql, "executing statement");
        if let Some(trace) = &self.trace {
            trace(sql);
        }
    }
}

/// Helper to convert a row to a Record
fn row_to_record(row: &rusqlite::Row, columns: &[String]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (index, column) in columns.iter().enumerate() {
        record.insert(column.as_str(), row.get::<_, Value>(index)?);
    }
    Ok(record)
}
