use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// Options for `Collection::find`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindOptions {
    pub projection: Option<Document>,
    /// `{field: 1 | -1, ...}`
    pub sort: Option<Document>,
    pub skip: u64,
    /// 0 means no limit; negative values are a hard limit of the absolute value.
    pub limit: i64,
    /// Read at most this many stored documents.
    pub max_scan: Option<usize>,
    pub max_time_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOptions {
    pub upsert: bool,
    pub array_filters: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}
