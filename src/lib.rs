pub mod cli;
pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod query;
pub mod storage;
pub mod utils;

use std::sync::Arc;

pub use crate::collection::Collection;
pub use crate::config::MontyConfig;
pub use crate::errors::DbError;
pub use crate::query::{
    Cursor, CursorState, DeleteResult, FindOptions, InsertManyResult, InsertOneResult, UpdateOptions, UpdateResult,
};

use crate::engine::QueryOptions;
use crate::storage::{MemoryStorage, Namespace, Storage, StorageEngine};

/// Entry point: owns the storage backend selected by configuration.
#[derive(Clone)]
pub struct MontyClient {
    storage: Arc<dyn Storage>,
    config: MontyConfig,
}

impl std::fmt::Debug for MontyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MontyClient").field("config", &self.config).finish_non_exhaustive()
    }
}

impl MontyClient {
    /// Open a client on the backend named in `config`.
    ///
    /// # Errors
    /// The backend cannot be opened.
    pub fn open(config: MontyConfig) -> Result<Self, DbError> {
        let storage = StorageEngine::open(&config.storage)?;
        query::telemetry::set_slow_query_ms(config.query.slow_query_ms);
        log::info!("montylite: opened {} storage", config.storage.engine);
        Ok(Self { storage, config })
    }

    /// A client backed by a fresh in-memory registry.
    #[must_use]
    pub fn memory() -> Self {
        Self { storage: Arc::new(MemoryStorage::new()), config: MontyConfig::default() }
    }

    #[must_use]
    pub fn config(&self) -> &MontyConfig {
        &self.config
    }

    fn query_options(&self) -> QueryOptions {
        QueryOptions { regex_options: self.config.query.regex_options }
    }

    /// # Errors
    /// Empty names or names with `/`, `\`, `.`, `$` or NUL.
    pub fn database(&self, name: &str) -> Result<Database, DbError> {
        Namespace::new(name, "_")?;
        Ok(Database { name: name.to_string(), storage: self.storage.clone(), options: self.query_options() })
    }

    /// Write buffered changes.
    ///
    /// # Errors
    /// Backend I/O failures.
    pub fn close(&self) -> Result<(), DbError> {
        self.storage.flush()
    }
}

/// A named group of collections.
#[derive(Clone)]
pub struct Database {
    name: String,
    storage: Arc<dyn Storage>,
    options: QueryOptions,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Database {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collections exist once a document is written to them.
    ///
    /// # Errors
    /// Invalid collection names.
    pub fn collection(&self, name: &str) -> Result<Collection, DbError> {
        let ns = Namespace::new(&self.name, name)?;
        Ok(Collection::new(self.storage.clone(), ns, self.options))
    }

    /// # Errors
    /// Backend I/O failures.
    pub fn list_collection_names(&self) -> Result<Vec<String>, DbError> {
        self.storage.collection_names(&self.name)
    }

    /// # Errors
    /// Invalid names or backend I/O failures.
    pub fn drop_collection(&self, name: &str) -> Result<bool, DbError> {
        self.storage.drop_collection(&Namespace::new(&self.name, name)?)
    }
}
