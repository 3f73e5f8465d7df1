use bson::{Bson, Document};

use crate::errors::DbError;

/// Parse Extended JSON into BSON (`$oid`, `$date`, `$numberLong`, `$numberDecimal`, ...).
pub fn parse_json_value(s: &str) -> Result<Bson, DbError> {
    let value: serde_json::Value = serde_json::from_str(s)?;
    Bson::try_from(value).map_err(|e| DbError::InvalidDocument(e.to_string()))
}

pub fn parse_json_document(s: &str) -> Result<Document, DbError> {
    match parse_json_value(s)? {
        Bson::Document(d) => Ok(d),
        other => Err(DbError::InvalidDocument(format!("expected a JSON object, got {other}"))),
    }
}

/// A single object or an array of objects.
pub fn parse_json_documents(s: &str) -> Result<Vec<Document>, DbError> {
    match parse_json_value(s)? {
        Bson::Document(d) => Ok(vec![d]),
        Bson::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Bson::Document(d) => Ok(d),
                other => Err(DbError::InvalidDocument(format!("expected a JSON object, got {other}"))),
            })
            .collect(),
        other => Err(DbError::InvalidDocument(format!("expected a JSON object or array, got {other}"))),
    }
}

pub fn parse_optional_document(s: Option<&str>) -> Result<Option<Document>, DbError> {
    s.map(parse_json_document).transpose()
}

/// Relaxed Extended JSON on one line.
pub fn to_json_line(value: Bson) -> String {
    value.into_relaxed_extjson().to_string()
}
