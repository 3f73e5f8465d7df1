//! Storage collaborators.
//!
//! Backends hold raw documents per namespace and report duplicate `_id`s. They never
//! evaluate filters; the engine hands them finished documents.

pub mod flatfile;
pub mod memory;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::config::StorageConfig;
use crate::errors::DbError;

pub use flatfile::FlatFileStorage;
pub use memory::MemoryStorage;

/// `database.collection`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    pub db: String,
    pub collection: String,
}

fn check_name(kind: &str, name: &str) -> Result<(), DbError> {
    if name.is_empty() {
        return Err(DbError::InvalidOperation(format!("{kind} names cannot be empty")));
    }
    if let Some(bad) = name.chars().find(|c| matches!(c, '/' | '\\' | '\0' | '$')) {
        return Err(DbError::InvalidOperation(format!("{kind} name '{name}' contains invalid character '{bad}'")));
    }
    Ok(())
}

impl Namespace {
    /// # Errors
    /// Empty names, or names containing path separators, `$` or NUL.
    pub fn new(db: &str, collection: &str) -> Result<Self, DbError> {
        check_name("database", db)?;
        if db.contains('.') {
            return Err(DbError::InvalidOperation(format!("database name '{db}' cannot contain '.'")));
        }
        check_name("collection", collection)?;
        Ok(Self { db: db.to_string(), collection: collection.to_string() })
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)
    }
}

/// Raw document store used by the collection facade.
pub trait Storage: Send + Sync {
    /// Documents in insertion order, at most `max_scan` of them.
    ///
    /// # Errors
    /// Backend I/O failures.
    fn fetch(&self, ns: &Namespace, max_scan: Option<usize>) -> Result<Vec<Document>, DbError>;

    /// # Errors
    /// `DbError::DuplicateKey` when a document with an equal `_id` exists.
    fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<(), DbError>;

    /// Replace stored documents with the same `_id`.
    ///
    /// # Errors
    /// Backend I/O failures.
    fn replace(&self, ns: &Namespace, docs: Vec<Document>) -> Result<(), DbError>;

    /// Remove documents by `_id`, returning how many were removed.
    ///
    /// # Errors
    /// Backend I/O failures.
    fn delete(&self, ns: &Namespace, ids: &[Bson]) -> Result<u64, DbError>;

    /// # Errors
    /// Backend I/O failures.
    fn collection_names(&self, db: &str) -> Result<Vec<String>, DbError>;

    /// # Errors
    /// Backend I/O failures.
    fn drop_collection(&self, ns: &Namespace) -> Result<bool, DbError>;

    /// # Errors
    /// Backend I/O failures.
    fn flush(&self) -> Result<(), DbError>;
}

/// Backend selector for `[storage] engine`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngine {
    #[default]
    Memory,
    FlatFile,
}

impl StorageEngine {
    /// Build the backend described by `config`.
    ///
    /// # Errors
    /// The flat-file backend needs a repository directory it can create.
    pub fn open(config: &StorageConfig) -> Result<Arc<dyn Storage>, DbError> {
        match config.engine {
            StorageEngine::Memory => Ok(Arc::new(MemoryStorage::new())),
            StorageEngine::FlatFile => {
                let Some(repo) = &config.repository else {
                    return Err(DbError::Config("flatfile storage requires a repository directory".into()));
                };
                Ok(Arc::new(FlatFileStorage::open(repo, config.cache_modified)?))
            }
        }
    }
}

impl FromStr for StorageEngine {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "flatfile" => Ok(Self::FlatFile),
            other => Err(DbError::Config(format!("unknown storage engine '{other}'"))),
        }
    }
}

impl fmt::Display for StorageEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::FlatFile => "flatfile",
        })
    }
}
