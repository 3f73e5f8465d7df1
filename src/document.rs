//! Checks and normalisation applied to documents before they reach storage.

use bson::oid::ObjectId;
use bson::{Bson, Document};

use crate::errors::DbError;

fn check_keys(doc: &Document, prefix: &str) -> Result<(), DbError> {
    for (k, v) in doc {
        if k.starts_with('$') {
            return Err(DbError::InvalidDocument(format!("key '{k}' in '{prefix}' must not start with '$'")));
        }
        if k.contains('.') {
            return Err(DbError::InvalidDocument(format!("key '{k}' in '{prefix}' must not contain '.'")));
        }
        let path = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
        check_value(v, &path)?;
    }
    Ok(())
}

fn check_value(v: &Bson, path: &str) -> Result<(), DbError> {
    match v {
        Bson::Document(d) => check_keys(d, path),
        Bson::Array(items) => items.iter().enumerate().try_for_each(|(i, item)| check_value(item, &format!("{path}.{i}"))),
        _ => Ok(()),
    }
}

/// Reject keys that start with `$` or contain `.`, at any depth.
///
/// # Errors
/// `DbError::InvalidDocument` naming the first offending key.
pub fn validate_for_storage(doc: &Document) -> Result<(), DbError> {
    check_keys(doc, "")
}

/// Validate `doc`, give it an `_id` if it has none and move `_id` to the front.
/// Returns the document and its id.
///
/// # Errors
/// Invalid keys, or an `_id` that is an array.
pub fn prepare_for_insert(doc: Document) -> Result<(Document, Bson), DbError> {
    validate_for_storage(&doc)?;
    let id = match doc.get("_id") {
        Some(Bson::Array(_)) => {
            return Err(DbError::InvalidDocument("The '_id' value cannot be of type array".into()));
        }
        Some(id) => id.clone(),
        None => Bson::ObjectId(ObjectId::new()),
    };
    let mut out = Document::new();
    out.insert("_id", id.clone());
    for (k, v) in doc {
        if k != "_id" {
            out.insert(k, v);
        }
    }
    Ok((out, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn id_is_generated_and_first() {
        let (d, id) = prepare_for_insert(doc! {"a": 1}).unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(d.keys().next().map(String::as_str), Some("_id"));
        let (d, _) = prepare_for_insert(doc! {"a": 1, "_id": 7}).unwrap();
        assert_eq!(d.keys().cloned().collect::<Vec<_>>(), vec!["_id".to_string(), "a".to_string()]);
    }

    #[test]
    fn bad_keys_are_rejected_at_depth() {
        assert!(matches!(validate_for_storage(&doc! {"a": {"$b": 1}}), Err(DbError::InvalidDocument(_))));
        assert!(validate_for_storage(&doc! {"a": [{"b.c": 1}]}).is_err());
        assert!(prepare_for_insert(doc! {"_id": [1]}).is_err());
    }
}
