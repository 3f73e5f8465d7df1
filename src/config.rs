//! Runtime configuration loaded from TOML, environment and explicit overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::DbError;
use crate::storage::StorageEngine;

/// How `$regex` inline options and a sibling `$options` key are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegexOptionsPolicy {
    /// Options present in both places are a compile error.
    #[default]
    Strict,
    /// The key that appears later in the operator document wins.
    KeyOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub engine: StorageEngine,
    pub repository: Option<PathBuf>,
    /// Flat-file backend: number of modifications buffered before a collection is rewritten.
    pub cache_modified: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { engine: StorageEngine::Memory, repository: None, cache_modified: 0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub level: Option<String>,
    pub retention: Option<usize>,
    pub dev6: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub regex_options: RegexOptionsPolicy,
    pub slow_query_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { regex_options: RegexOptionsPolicy::Strict, slow_query_ms: 500 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MontyConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub query: QueryConfig,
}

impl MontyConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    /// Returns `DbError::Config` on malformed TOML or unknown enum values.
    pub fn from_toml_str(s: &str) -> Result<Self, DbError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Overlay `MONTYLITE_STORAGE` and `MONTYLITE_REPOSITORY` when set.
    ///
    /// # Errors
    /// Returns `DbError::Config` when `MONTYLITE_STORAGE` names an unknown engine.
    pub fn apply_env(mut self) -> Result<Self, DbError> {
        if let Ok(engine) = std::env::var("MONTYLITE_STORAGE") {
            self.storage.engine = engine.parse()?;
        }
        if let Ok(repo) = std::env::var("MONTYLITE_REPOSITORY") {
            self.storage.repository = Some(PathBuf::from(repo));
        }
        Ok(self)
    }

    /// Resolve a configuration: file (if any), then environment, then explicit repository.
    /// An explicit repository switches the engine to the flat-file backend.
    ///
    /// # Errors
    /// Propagates file and parse errors.
    pub fn resolve(file: Option<&Path>, repository: Option<&Path>) -> Result<Self, DbError> {
        let base = match file {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        let mut cfg = base.apply_env()?;
        if let Some(repo) = repository {
            cfg.storage.engine = StorageEngine::FlatFile;
            cfg.storage.repository = Some(repo.to_path_buf());
        }
        Ok(cfg)
    }
}
