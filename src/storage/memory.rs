use std::collections::{BTreeSet, HashMap};

use bson::{Bson, Document};
use parking_lot::RwLock;

use super::{Namespace, Storage};
use crate::engine::value::show;
use crate::engine::weighted::{Weighted, values_equal};
use crate::errors::DbError;

#[derive(Debug, Default)]
struct Slot {
    docs: Vec<Document>,
    /// `_id` keys; numerically equal ids collide.
    ids: BTreeSet<Weighted>,
}

/// Owned in-memory registry of collections.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: RwLock<HashMap<Namespace, Slot>>,
}

fn id_of(doc: &Document) -> Bson {
    doc.get("_id").cloned().unwrap_or(Bson::Null)
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install documents read from elsewhere, replacing whatever the namespace held.
    pub(crate) fn load(&self, ns: &Namespace, docs: Vec<Document>) {
        let ids = docs.iter().map(|d| Weighted::new(&id_of(d))).collect();
        self.slots.write().insert(ns.clone(), Slot { docs, ids });
    }

    pub(crate) fn contains(&self, ns: &Namespace) -> bool {
        self.slots.read().contains_key(ns)
    }

    pub(crate) fn namespaces(&self) -> Vec<Namespace> {
        self.slots.read().keys().cloned().collect()
    }
}

impl Storage for MemoryStorage {
    fn fetch(&self, ns: &Namespace, max_scan: Option<usize>) -> Result<Vec<Document>, DbError> {
        let slots = self.slots.read();
        let Some(slot) = slots.get(ns) else {
            return Ok(Vec::new());
        };
        let n = max_scan.unwrap_or(usize::MAX);
        Ok(slot.docs.iter().take(n).cloned().collect())
    }

    fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<(), DbError> {
        let mut slots = self.slots.write();
        let slot = slots.entry(ns.clone()).or_default();
        let id = id_of(&doc);
        if !slot.ids.insert(Weighted::new(&id)) {
            return Err(DbError::DuplicateKey { namespace: ns.to_string(), key: show(&id) });
        }
        slot.docs.push(doc);
        Ok(())
    }

    fn replace(&self, ns: &Namespace, docs: Vec<Document>) -> Result<(), DbError> {
        let mut slots = self.slots.write();
        let slot = slots.entry(ns.clone()).or_default();
        for doc in docs {
            let id = id_of(&doc);
            match slot.docs.iter().position(|d| values_equal(&id_of(d), &id)) {
                Some(pos) => slot.docs[pos] = doc,
                None => {
                    slot.ids.insert(Weighted::new(&id));
                    slot.docs.push(doc);
                }
            }
        }
        Ok(())
    }

    fn delete(&self, ns: &Namespace, ids: &[Bson]) -> Result<u64, DbError> {
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(ns) else {
            return Ok(0);
        };
        let before = slot.docs.len();
        slot.docs.retain(|d| {
            let id = id_of(d);
            !ids.iter().any(|gone| values_equal(gone, &id))
        });
        for id in ids {
            slot.ids.remove(&Weighted::new(id));
        }
        Ok(crate::utils::num::usize_to_u64(before - slot.docs.len()))
    }

    fn collection_names(&self, db: &str) -> Result<Vec<String>, DbError> {
        let mut names: Vec<String> =
            self.slots.read().keys().filter(|ns| ns.db == db).map(|ns| ns.collection.clone()).collect();
        names.sort();
        Ok(names)
    }

    fn drop_collection(&self, ns: &Namespace) -> Result<bool, DbError> {
        Ok(self.slots.write().remove(ns).is_some())
    }

    fn flush(&self) -> Result<(), DbError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn numeric_equal_ids_collide() {
        let s = MemoryStorage::new();
        let ns = Namespace::new("db", "c").unwrap();
        s.insert_one(&ns, doc! {"_id": 1}).unwrap();
        let err = s.insert_one(&ns, doc! {"_id": 1.0}).unwrap_err();
        assert_eq!(err.code(), Some(11000));
        s.insert_one(&ns, doc! {"_id": "1"}).unwrap();
        assert_eq!(s.fetch(&ns, None).unwrap().len(), 2);
    }

    #[test]
    fn replace_and_delete_by_id() {
        let s = MemoryStorage::new();
        let ns = Namespace::new("db", "c").unwrap();
        s.insert_one(&ns, doc! {"_id": 1, "v": 1}).unwrap();
        s.insert_one(&ns, doc! {"_id": 2, "v": 1}).unwrap();
        s.replace(&ns, vec![doc! {"_id": 1, "v": 2}]).unwrap();
        assert_eq!(s.fetch(&ns, Some(1)).unwrap(), vec![doc! {"_id": 1, "v": 2}]);
        assert_eq!(s.delete(&ns, &[Bson::Int32(1)]).unwrap(), 1);
        s.insert_one(&ns, doc! {"_id": 1}).unwrap();
        assert_eq!(s.collection_names("db").unwrap(), vec!["c".to_string()]);
        assert!(s.drop_collection(&ns).unwrap());
        assert!(s.fetch(&ns, None).unwrap().is_empty());
    }
}
