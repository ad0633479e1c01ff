//! Record keys - the opaque handle callers use to address a stored entity
//!
//! Format: `<LogicalType>:<id>`
//!
//! Examples:
//! - `ProcessDefinition:1`
//! - `StoredWorkitem:78`
//!
//! Ids must not contain the `:` separator; keys that do are rejected rather
//! than split at an arbitrary colon.

use crate::{Error, Result};
use crate::entity::EntityType;
use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Separator between the logical type and the id
pub const KEY_SEPARATOR: char = ':';

/// Composite key addressing one row: logical type plus primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    /// Logical storage type (selects the table)
    pub entity_type: EntityType,
    /// Primary key value within that table
    pub id: String,
}

impl RecordKey {
    /// Create a new RecordKey
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }

    /// Parse a key string into a RecordKey
    ///
    /// Expected format: `<LogicalType>:<id>`
    pub fn parse(key: &str) -> Result<Self> {
        let (type_name, id) = key.split_once(KEY_SEPARATOR)
            .ok_or_else(|| Error::InvalidKey(format!("Key must contain '{}': {}", KEY_SEPARATOR, key)))?;

        if type_name.is_empty() {
            return Err(Error::InvalidKey(format!("Key has an empty type: {}", key)));
        }
        if id.is_empty() {
            return Err(Error::InvalidKey(format!("Key has an empty id: {}", key)));
        }
        if id.contains(KEY_SEPARATOR) {
            return Err(Error::InvalidKey(format!("Id must not contain '{}': {}", KEY_SEPARATOR, key)));
        }

        let entity_type = EntityType::from_str(type_name)?;

        Ok(Self {
            entity_type,
            id: id.to_string(),
        })
    }

    /// Convert to key string
    pub fn to_key_string(&self) -> String {
        format!("{}{}{}", self.entity_type.as_str(), KEY_SEPARATOR, self.id)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key_string())
    }
}

impl FromStr for RecordKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}


/// Anything the facade accepts as a key: raw strings are parsed, parsed keys
/// pass through.
pub trait IntoRecordKey {
    fn into_record_key(self) -> Result<RecordKey>;
}

impl IntoRecordKey for &str {
    fn into_record_key(self) -> Result<RecordKey> {
        RecordKey::parse(self)
    }
}

impl IntoRecordKey for &String {
    fn into_record_key(self) -> Result<RecordKey> {
        RecordKey::parse(self)
    }
}

impl IntoRecordKey for String {
    fn into_record_key(self) -> Result<RecordKey> {
        RecordKey::parse(&self)
    }
}

impl IntoRecordKey for RecordKey {
    fn into_record_key(self) -> Result<RecordKey> {
        Ok(self)
    }
}

impl IntoRecordKey for &RecordKey {
    fn into_record_key(self) -> Result<RecordKey> {
        Ok(self.clone())
    }
}

impl Serialize for RecordKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_key_string())
    }
}

impl<'de> Deserialize<'de> for RecordKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RecordKey::parse(&s).map_err(serde::de::Error::custom)
    }
}
