//! Cross-type total order over BSON values.
//!
//! Every value first orders by its type weight, then by a type-specific payload. Documents
//! compare entry by entry as `(child weight, key, child value)`, arrays element by element.

use std::cmp::Ordering;

use bson::{Bson, Document};

use super::number::{Num, cmp_numbers};

pub const MIN_KEY: i32 = -1;
/// Ascending sort key of an empty array; below null.
pub const EMPTY_ARRAY_FALLBACK: i32 = 0;
pub const NULL: i32 = 1;
pub const NUMBER: i32 = 2;
pub const STRING: i32 = 3;
pub const DOCUMENT: i32 = 4;
pub const ARRAY: i32 = 5;
pub const BINARY: i32 = 6;
pub const OBJECT_ID: i32 = 7;
pub const BOOLEAN: i32 = 8;
pub const DATE: i32 = 9;
pub const TIMESTAMP: i32 = 10;
pub const REGEX: i32 = 11;
pub const CODE: i32 = 12;
pub const CODE_WITH_SCOPE: i32 = 13;
pub const DB_POINTER: i32 = 14;
pub const MAX_KEY: i32 = 127;

#[must_use]
pub fn gravity(v: &Bson) -> i32 {
    match v {
        Bson::MinKey => MIN_KEY,
        Bson::Null | Bson::Undefined => NULL,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => NUMBER,
        Bson::String(_) | Bson::Symbol(_) => STRING,
        Bson::Document(_) => DOCUMENT,
        Bson::Array(_) => ARRAY,
        Bson::Binary(_) => BINARY,
        Bson::ObjectId(_) => OBJECT_ID,
        Bson::Boolean(_) => BOOLEAN,
        Bson::DateTime(_) => DATE,
        Bson::Timestamp(_) => TIMESTAMP,
        Bson::RegularExpression(_) => REGEX,
        Bson::JavaScriptCode(_) => CODE,
        Bson::JavaScriptCodeWithScope(_) => CODE_WITH_SCOPE,
        Bson::DbPointer(_) => DB_POINTER,
        Bson::MaxKey => MAX_KEY,
    }
}

fn text(v: &Bson) -> &str {
    match v {
        Bson::String(s) | Bson::Symbol(s) => s,
        _ => "",
    }
}

/// Compare two values under the total order.
#[must_use]
pub fn cmp_values(a: &Bson, b: &Bson) -> Ordering {
    let (wa, wb) = (gravity(a), gravity(b));
    if wa != wb {
        return wa.cmp(&wb);
    }
    match (a, b) {
        (Bson::Document(x), Bson::Document(y)) => cmp_documents(x, y),
        (Bson::Array(x), Bson::Array(y)) => {
            for (p, q) in x.iter().zip(y) {
                let o = cmp_values(p, q);
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Binary(x), Bson::Binary(y)) => x
            .bytes
            .len()
            .cmp(&y.bytes.len())
            .then_with(|| u8::from(x.subtype).cmp(&u8::from(y.subtype)))
            .then_with(|| x.bytes.cmp(&y.bytes)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            x.time.cmp(&y.time).then_with(|| x.increment.cmp(&y.increment))
        }
        (Bson::RegularExpression(x), Bson::RegularExpression(y)) => x
            .pattern
            .as_str()
            .cmp(y.pattern.as_str())
            .then_with(|| x.options.as_str().cmp(y.options.as_str())),
        (Bson::JavaScriptCode(x), Bson::JavaScriptCode(y)) => x.cmp(y),
        (Bson::JavaScriptCodeWithScope(x), Bson::JavaScriptCodeWithScope(y)) => {
            x.code.cmp(&y.code).then_with(|| cmp_documents(&x.scope, &y.scope))
        }
        _ if wa == NUMBER => match (Num::from_bson(a), Num::from_bson(b)) {
            (Some(x), Some(y)) => cmp_numbers(&x, &y),
            _ => Ordering::Equal,
        },
        _ if wa == STRING => text(a).cmp(text(b)),
        // MinKey, MaxKey, Null/Undefined and DbPointer carry no payload.
        _ => Ordering::Equal,
    }
}

/// Key-order-sensitive document comparison.
#[must_use]
pub fn cmp_documents(x: &Document, y: &Document) -> Ordering {
    for ((k1, v1), (k2, v2)) in x.iter().zip(y.iter()) {
        let o = gravity(v1)
            .cmp(&gravity(v2))
            .then_with(|| k1.cmp(k2))
            .then_with(|| cmp_values(v1, v2));
        if o != Ordering::Equal {
            return o;
        }
    }
    x.len().cmp(&y.len())
}

/// Equality under the total order: numeric-aware, key-order-sensitive.
#[must_use]
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    cmp_values(a, b) == Ordering::Equal
}

/// Owned sort/identity key.
#[derive(Debug, Clone)]
pub struct Weighted {
    weight: i32,
    value: Option<Bson>,
}

impl Weighted {
    #[must_use]
    pub fn new(value: &Bson) -> Self {
        Self { weight: gravity(value), value: Some(value.clone()) }
    }

    #[must_use]
    pub fn null() -> Self {
        Self { weight: NULL, value: None }
    }

    /// Sorts below null: the ascending key of `[]`.
    #[must_use]
    pub fn empty_array() -> Self {
        Self { weight: EMPTY_ARRAY_FALLBACK, value: None }
    }

    #[must_use]
    pub fn weight(&self) -> i32 {
        self.weight
    }

    #[must_use]
    pub fn value(&self) -> Option<&Bson> {
        self.value.as_ref()
    }
}

impl Ord for Weighted {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight.cmp(&other.weight).then_with(|| match (&self.value, &other.value) {
            (Some(a), Some(b)) => cmp_values(a, b),
            _ => Ordering::Equal,
        })
    }
}

impl PartialOrd for Weighted {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Weighted {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Weighted {}
