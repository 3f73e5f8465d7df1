//! One BSON file per collection under `<repository>/<db>/<collection>.bson`.
//!
//! Collections are read lazily into a [`MemoryStorage`] and rewritten whole through a temp
//! file in the same directory, once `cache_modified` writes have accumulated and on flush.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use bson::{Bson, Document};
use parking_lot::Mutex;
use tempfile::NamedTempFile;

use super::memory::MemoryStorage;
use super::{Namespace, Storage};
use crate::errors::DbError;

const EXTENSION: &str = "bson";

pub struct FlatFileStorage {
    root: PathBuf,
    cache_modified: usize,
    memory: MemoryStorage,
    loaded: Mutex<HashSet<Namespace>>,
    /// Modifications not yet written, per namespace.
    pending: Mutex<HashMap<Namespace, usize>>,
}

impl FlatFileStorage {
    /// # Errors
    /// The repository directory cannot be created.
    pub fn open(root: &Path, cache_modified: usize) -> Result<Self, DbError> {
        std::fs::create_dir_all(root)?;
        log::info!("flatfile: repository={} cache_modified={}", root.display(), cache_modified);
        Ok(Self {
            root: root.to_path_buf(),
            cache_modified,
            memory: MemoryStorage::new(),
            loaded: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashMap::new()),
        })
    }

    fn file_of(&self, ns: &Namespace) -> PathBuf {
        self.root.join(&ns.db).join(format!("{}.{EXTENSION}", ns.collection))
    }

    fn ensure_loaded(&self, ns: &Namespace) -> Result<(), DbError> {
        let mut loaded = self.loaded.lock();
        if loaded.contains(ns) {
            return Ok(());
        }
        let path = self.file_of(ns);
        if path.exists() {
            let docs = read_documents(&path)?;
            log::debug!("flatfile: loaded {} documents from {}", docs.len(), path.display());
            self.memory.load(ns, docs);
        }
        loaded.insert(ns.clone());
        Ok(())
    }

    fn touched(&self, ns: &Namespace, count: usize) -> Result<(), DbError> {
        let due = {
            let mut pending = self.pending.lock();
            let n = pending.entry(ns.clone()).or_insert(0);
            *n += count;
            *n > self.cache_modified
        };
        if due { self.write_collection(ns) } else { Ok(()) }
    }

    fn write_collection(&self, ns: &Namespace) -> Result<(), DbError> {
        let dir = self.root.join(&ns.db);
        std::fs::create_dir_all(&dir)?;
        let docs = self.memory.fetch(ns, None)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        for doc in &docs {
            doc.to_writer(&mut tmp).map_err(|e| DbError::Io(e.to_string()))?;
        }
        tmp.flush()?;
        let path = self.file_of(ns);
        tmp.persist(&path).map_err(|e| DbError::Io(e.error.to_string()))?;
        self.pending.lock().remove(ns);
        log::debug!("flatfile: wrote {} documents to {}", docs.len(), path.display());
        Ok(())
    }
}

fn read_documents(path: &Path) -> Result<Vec<Document>, DbError> {
    let bytes = std::fs::read(path)?;
    let total = crate::utils::num::usize_to_u64(bytes.len());
    let mut cursor = Cursor::new(bytes);
    let mut docs = Vec::new();
    while cursor.position() < total {
        let doc = Document::from_reader(&mut cursor)
            .map_err(|e| DbError::Io(format!("{}: {e}", path.display())))?;
        docs.push(doc);
    }
    Ok(docs)
}

impl Storage for FlatFileStorage {
    fn fetch(&self, ns: &Namespace, max_scan: Option<usize>) -> Result<Vec<Document>, DbError> {
        self.ensure_loaded(ns)?;
        self.memory.fetch(ns, max_scan)
    }

    fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<(), DbError> {
        self.ensure_loaded(ns)?;
        self.memory.insert_one(ns, doc)?;
        self.touched(ns, 1)
    }

    fn replace(&self, ns: &Namespace, docs: Vec<Document>) -> Result<(), DbError> {
        self.ensure_loaded(ns)?;
        let n = docs.len();
        self.memory.replace(ns, docs)?;
        self.touched(ns, n)
    }

    fn delete(&self, ns: &Namespace, ids: &[Bson]) -> Result<u64, DbError> {
        self.ensure_loaded(ns)?;
        let n = self.memory.delete(ns, ids)?;
        if n > 0 {
            self.touched(ns, crate::utils::num::u64_to_usize(n).unwrap_or(usize::MAX))?;
        }
        Ok(n)
    }

    fn collection_names(&self, db: &str) -> Result<Vec<String>, DbError> {
        let mut names: HashSet<String> = self.memory.collection_names(db)?.into_iter().collect();
        let dir = self.root.join(db);
        if dir.is_dir() {
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION)
                    && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                {
                    names.insert(stem.to_string());
                }
            }
        }
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort();
        Ok(names)
    }

    fn drop_collection(&self, ns: &Namespace) -> Result<bool, DbError> {
        self.loaded.lock().insert(ns.clone());
        self.pending.lock().remove(ns);
        let in_memory = self.memory.drop_collection(ns)?;
        let path = self.file_of(ns);
        let on_disk = path.exists();
        if on_disk {
            std::fs::remove_file(&path)?;
        }
        Ok(in_memory || on_disk)
    }

    fn flush(&self) -> Result<(), DbError> {
        let dirty: Vec<Namespace> = self.pending.lock().keys().cloned().collect();
        for ns in dirty {
            if self.memory.contains(&ns) {
                self.write_collection(&ns)?;
            }
        }
        Ok(())
    }
}

impl Drop for FlatFileStorage {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("flatfile: flush on close failed: {e}");
        }
        log::debug!("flatfile: closed with {} namespaces cached", self.memory.namespaces().len());
    }
}
