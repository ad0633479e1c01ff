//! Entity types - the fixed registry of logical storage types
//!
//! Every persisted entity belongs to one of four logical types, each backed
//! by exactly one table:
//! - `ProcessDefinition`: a named, versioned process tree
//! - `Process`: a running instance of a definition
//! - `Expression`: a node of a running process
//! - `StoredWorkitem`: a workitem parked on an expression
//!
//! Rows carry their concrete subtype in the `type` column, so several
//! subtypes (e.g. `Expression` and `OtherExpression`) share one table.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

/// Logical storage types known to the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    ProcessDefinition,
    Process,
    Expression,
    StoredWorkitem,
}

impl EntityType {
    /// Logical type name, as used in record keys and the `type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::ProcessDefinition => "ProcessDefinition",
            EntityType::Process => "Process",
            EntityType::Expression => "Expression",
            EntityType::StoredWorkitem => "StoredWorkitem",
        }
    }

    /// Table name without the prefix
    pub fn table_base_name(&self) -> &'static str {
        match self {
            EntityType::ProcessDefinition => "process_definitions",
            EntityType::Process => "processes",
            EntityType::Expression => "expressions",
            EntityType::StoredWorkitem => "stored_workitems",
        }
    }

    /// Declared columns of the type, excluding the `id` primary key.
    ///
    /// Must stay in step with the latest migration.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            EntityType::ProcessDefinition => &[
                "type", "tree", "name", "version", "created_at", "updated_at",
            ],
            EntityType::Process => &[
                "type",
                "process_definition_id",
                "workitem",
                "root_expression_id",
                "parent_expression_id",
                "created_at",
                "updated_at",
            ],
            EntityType::Expression => &[
                "type",
                "parent_id",
                "position",
                "workitem",
                "process_id",
                "applied_at",
                "replied_at",
                "created_at",
                "updated_at",
            ],
            EntityType::StoredWorkitem => &["type", "expression_id", "created_at", "updated_at"],
        }
    }

    /// Get all entity types
    pub fn all() -> &'static [EntityType] {
        &[
            EntityType::ProcessDefinition,
            EntityType::Process,
            EntityType::Expression,
            EntityType::StoredWorkitem,
        ]
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EntityType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnsupportedType(s.to_string()))
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strip any `::` namespace qualifier: `Swarm::Process` -> `Process`
pub fn short_type_name(type_name: &str) -> &str {
    type_name.rsplit("::").next().unwrap_or(type_name)
}

/// Lower-snake-case a type name: `PartyKnuckles` -> `party_knuckles`.
///
/// Acronym runs stay together (`HTTPRequest` -> `http_request`) and
/// namespace separators become `/`.
pub fn tokenize(type_name: &str) -> String {
    static ACRONYM: OnceLock<Regex> = OnceLock::new();
    static CAMEL: OnceLock<Regex> = OnceLock::new();

    let acronym = ACRONYM.get_or_init(|| Regex::new(r"([A-Z\d]+)([A-Z][a-z])").expect("valid regex"));
    let camel = CAMEL.get_or_init(|| Regex::new(r"([a-z\d])([A-Z])").expect("valid regex"));

    let word = type_name.replace("::", "/");
    let word = acronym.replace_all(&word, "${1}_${2}");
    let word = camel.replace_all(&word, "${1}_${2}");
    word.replace('-', "_").to_lowercase()
}

/// Foreign-key column pointing at an owner of the given type:
/// `PartyKnuckles` -> `party_knuckles_id`
pub fn association_key_for_type(type_name: &str) -> String {
    format!("{}_id", tokenize(type_name))
}
