//! Type tables and structural helpers over `bson::Bson`.

use bson::{Bson, Document};

use crate::errors::{DbError, codes};

/// BSON type code as used by `$type`.
#[must_use]
pub fn type_code(v: &Bson) -> i32 {
    match v {
        Bson::Double(_) => 1,
        Bson::String(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Binary(_) => 5,
        Bson::Undefined => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Null => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) => 13,
        Bson::Symbol(_) => 14,
        Bson::JavaScriptCodeWithScope(_) => 15,
        Bson::Int32(_) => 16,
        Bson::Timestamp(_) => 17,
        Bson::Int64(_) => 18,
        Bson::Decimal128(_) => 19,
        Bson::MinKey => -1,
        Bson::MaxKey => 127,
    }
}

/// Type name used in error messages and accepted as a `$type` alias.
#[must_use]
pub fn type_name(v: &Bson) -> &'static str {
    match v {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::Binary(_) => "binData",
        Bson::Undefined => "undefined",
        Bson::ObjectId(_) => "objectId",
        Bson::Boolean(_) => "bool",
        Bson::DateTime(_) => "date",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::DbPointer(_) => "dbPointer",
        Bson::JavaScriptCode(_) => "javascript",
        Bson::Symbol(_) => "symbol",
        Bson::JavaScriptCodeWithScope(_) => "javascriptWithScope",
        Bson::Int32(_) => "int",
        Bson::Timestamp(_) => "timestamp",
        Bson::Int64(_) => "long",
        Bson::Decimal128(_) => "decimal",
        Bson::MinKey => "minKey",
        Bson::MaxKey => "maxKey",
    }
}

/// Codes for a `$type` string alias. `"number"` covers all four numeric types.
#[must_use]
pub fn type_codes_for_alias(alias: &str) -> Option<&'static [i32]> {
    let codes: &'static [i32] = match alias {
        "double" => &[1],
        "string" => &[2],
        "object" => &[3],
        "array" => &[4],
        "binData" => &[5],
        "undefined" => &[6],
        "objectId" => &[7],
        "bool" => &[8],
        "date" => &[9],
        "null" => &[10],
        "regex" => &[11],
        "dbPointer" => &[12],
        "javascript" => &[13],
        "symbol" => &[14],
        "javascriptWithScope" => &[15],
        "int" => &[16],
        "timestamp" => &[17],
        "long" => &[18],
        "decimal" => &[19],
        "minKey" => &[-1],
        "maxKey" => &[127],
        "number" => &[1, 16, 18, 19],
        _ => return None,
    };
    Some(codes)
}

#[must_use]
pub fn is_known_type_code(code: i64) -> bool {
    matches!(code, -1 | 1..=19 | 127)
}

/// Strict structural equality: same types, same key order, same values.
/// `bson::Document`'s own `PartialEq` ignores key order, so it is not used here.
#[must_use]
pub fn values_identical(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Document(x), Bson::Document(y)) => documents_identical(x, y),
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_identical(p, q))
        }
        (Bson::Double(x), Bson::Double(y)) => x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan()),
        (Bson::JavaScriptCodeWithScope(x), Bson::JavaScriptCodeWithScope(y)) => {
            x.code == y.code && documents_identical(&x.scope, &y.scope)
        }
        _ => a == b,
    }
}

#[must_use]
pub fn documents_identical(a: &Document, b: &Document) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|((k1, v1), (k2, v2))| k1 == k2 && values_identical(v1, v2))
}

/// Render a value for an error message.
#[must_use]
pub fn show(v: &Bson) -> String {
    v.to_string()
}

/// `{_id: ...}` fragment used by per-document error messages.
#[must_use]
pub fn id_clause(doc: &Document) -> String {
    match doc.get("_id") {
        Some(id) => format!("{{_id: {id}}}"),
        None => "{}".to_string(),
    }
}

/// Reject keys that cannot be stored: `$`-prefixed or dotted, at any depth.
///
/// # Errors
/// `WriteError` with code 52 (dollar prefix) or 57 (dotted name).
pub fn check_storable(path: &str, value: &Bson) -> Result<(), DbError> {
    match value {
        Bson::Document(d) => {
            for (k, v) in d {
                let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                if k.starts_with('$') {
                    return Err(DbError::write(
                        codes::DOLLAR_PREFIXED_FIELD_NAME,
                        format!("The dollar ($) prefixed field '{k}' in '{child}' is not valid for storage."),
                    ));
                }
                if k.contains('.') {
                    return Err(DbError::write(
                        codes::DOTTED_FIELD_NAME,
                        format!("The dotted field '{k}' in '{child}' is not valid for storage."),
                    ));
                }
                check_storable(&child, v)?;
            }
            Ok(())
        }
        Bson::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_storable(&format!("{path}.{i}"), item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Truthiness used by `$exists` and projection values.
#[must_use]
pub fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(d) => *d != 0.0,
        Bson::Decimal128(d) => !crate::engine::number::Dec::from_decimal128(d).is_zero(),
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn identical_respects_key_order() {
        let a = Bson::Document(doc! {"x": 1, "y": 2});
        let b = Bson::Document(doc! {"y": 2, "x": 1});
        assert!(!values_identical(&a, &b));
        assert!(values_identical(&a, &a.clone()));
        assert!(!values_identical(&Bson::Int32(1), &Bson::Int64(1)));
    }

    #[test]
    fn storable_rejects_dollar_and_dots() {
        let err = check_storable("a", &Bson::Document(doc! {"b": {"$x": 1}})).unwrap_err();
        assert_eq!(err.code(), Some(52));
        let err = check_storable("a", &Bson::Document(doc! {"b.c": 1})).unwrap_err();
        assert_eq!(err.code(), Some(57));
        assert!(check_storable("a", &Bson::Array(vec![Bson::Int32(1)])).is_ok());
    }

    #[test]
    fn aliases_cover_numbers() {
        assert_eq!(type_codes_for_alias("number"), Some(&[1, 16, 18, 19][..]));
        assert_eq!(type_codes_for_alias("nope"), None);
    }
}
