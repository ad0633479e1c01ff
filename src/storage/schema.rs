//! Database schema definitions
//!
//! Statements are templates: `{prefix}` is replaced with the storage's table
//! prefix when a migration runs.

use super::migration::Migration;

/// SQL to create the process_definitions table
pub const CREATE_PROCESS_DEFINITIONS_TABLE: &str = r#"
CREATE TABLE {prefix}_process_definitions (
    id TEXT NOT NULL PRIMARY KEY,
    type TEXT NOT NULL,
    tree TEXT NOT NULL,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    created_at TIMESTAMP WITH TIME ZONE,
    updated_at TIMESTAMP WITH TIME ZONE
)
"#;

/// SQL to create the processes table
pub const CREATE_PROCESSES_TABLE: &str = r#"
CREATE TABLE {prefix}_processes (
    id TEXT NOT NULL PRIMARY KEY,
    type TEXT NOT NULL,
    process_definition_id TEXT NOT NULL,
    workitem TEXT NOT NULL,
    root_expression_id TEXT,
    parent_expression_id TEXT,
    created_at TIMESTAMP WITH TIME ZONE,
    updated_at TIMESTAMP WITH TIME ZONE
)
"#;

/// SQL to create the expressions table
pub const CREATE_EXPRESSIONS_TABLE: &str = r#"
CREATE TABLE {prefix}_expressions (
    id TEXT NOT NULL PRIMARY KEY,
    type TEXT NOT NULL,
    parent_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    workitem TEXT NOT NULL,
    process_id TEXT NOT NULL,
    applied_at TIMESTAMP WITH TIME ZONE,
    replied_at TIMESTAMP WITH TIME ZONE,
    created_at TIMESTAMP WITH TIME ZONE,
    updated_at TIMESTAMP WITH TIME ZONE
)
"#;

/// SQL to create the stored_workitems table
pub const CREATE_STORED_WORKITEMS_TABLE: &str = r#"
CREATE TABLE {prefix}_stored_workitems (
    id TEXT NOT NULL PRIMARY KEY,
    type TEXT NOT NULL,
    expression_id TEXT NOT NULL,
    created_at TIMESTAMP WITH TIME ZONE,
    updated_at TIMESTAMP WITH TIME ZONE
)
"#;

/// SQL to create indexes
pub const CREATE_PROCESS_DEFINITIONS_NAME_VERSION_INDEX: &str =
    "CREATE UNIQUE INDEX {prefix}_process_definitions_name_version_index ON {prefix}_process_definitions(name, version)";
pub const CREATE_PROCESSES_DEFINITION_INDEX: &str =
    "CREATE INDEX {prefix}_processes_process_definition_id_index ON {prefix}_processes(process_definition_id)";
pub const CREATE_EXPRESSIONS_PARENT_INDEX: &str =
    "CREATE INDEX {prefix}_expressions_parent_id_index ON {prefix}_expressions(parent_id)";
pub const CREATE_EXPRESSIONS_PROCESS_INDEX: &str =
    "CREATE INDEX {prefix}_expressions_process_id_index ON {prefix}_expressions(process_id)";
pub const CREATE_STORED_WORKITEMS_EXPRESSION_INDEX: &str =
    "CREATE INDEX {prefix}_stored_workitems_expression_id_index ON {prefix}_stored_workitems(expression_id)";

/// Dropping a table drops its indexes with it
pub const DROP_TABLES: &[&str] = &[
    "DROP TABLE IF EXISTS {prefix}_stored_workitems",
    "DROP TABLE IF EXISTS {prefix}_expressions",
    "DROP TABLE IF EXISTS {prefix}_processes",
    "DROP TABLE IF EXISTS {prefix}_process_definitions",
];

const CREATE_TABLES_UP: &[&str] = &[
    CREATE_PROCESS_DEFINITIONS_TABLE,
    CREATE_PROCESSES_TABLE,
    CREATE_EXPRESSIONS_TABLE,
    CREATE_STORED_WORKITEMS_TABLE,
    CREATE_PROCESS_DEFINITIONS_NAME_VERSION_INDEX,
    CREATE_PROCESSES_DEFINITION_INDEX,
    CREATE_EXPRESSIONS_PARENT_INDEX,
    CREATE_EXPRESSIONS_PROCESS_INDEX,
    CREATE_STORED_WORKITEMS_EXPRESSION_INDEX,
];

/// Built-in migrations, in version order
pub fn migrations() -> Vec<Migration> {
    vec![Migration::new(1, "create_tables", CREATE_TABLES_UP, DROP_TABLES)]
}

/// Substitute the table prefix into a statement template
pub fn render(statement: &str, prefix: &str) -> String {
    statement.replace("{prefix}", prefix)
}
