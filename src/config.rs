use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::storage::{StorageOptions, DEFAULT_TABLE_PREFIX};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file; in-memory when absent
    pub database: Option<String>,
    pub table_prefix: String,
    pub skip_migrations: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: None,
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            skip_migrations: false,
        }
    }
}

impl StorageConfig {
    pub fn storage_options(&self) -> StorageOptions {
        StorageOptions {
            table_prefix: self.table_prefix.clone(),
            skip_migrations: self.skip_migrations,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("swarm-storage.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".swarm").join("swarm.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<StorageConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: StorageConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &StorageConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (pass force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
