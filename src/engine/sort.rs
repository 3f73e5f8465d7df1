//! Multi-key sort over matched documents.

use std::cmp::Ordering;

use bson::{Bson, Document};

use super::Match;
use super::field_walker::{FieldPath, FieldWalker};
use super::weighted::{Weighted, cmp_values};
use crate::errors::DbError;

/// Parsed `{field: 1 | -1, ...}` document.
#[derive(Debug, Clone, Default)]
pub struct SortSpec {
    keys: Vec<(FieldPath, bool)>,
}

impl SortSpec {
    /// # Errors
    /// Directions other than `1` and `-1`.
    pub fn parse(spec: &Document) -> Result<Self, DbError> {
        let mut keys = Vec::with_capacity(spec.len());
        for (field, direction) in spec {
            let n = match direction {
                Bson::Int32(i) => Some(i64::from(*i)),
                Bson::Int64(i) => Some(*i),
                Bson::Double(d) => crate::utils::num::f64_to_i64_exact(*d),
                _ => None,
            };
            let descending = match n {
                Some(1) => false,
                Some(-1) => true,
                _ => {
                    return Err(DbError::bad_value(format!(
                        "bad sort specification: {field} must be 1 or -1, got {direction}"
                    )));
                }
            };
            if field.is_empty() {
                return Err(DbError::bad_value("bad sort specification: empty field name"));
            }
            keys.push((FieldPath::parse(field), descending));
        }
        Ok(Self { keys })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn keys_for(&self, doc: &Document) -> Vec<Weighted> {
        self.keys.iter().map(|(path, desc)| sort_key(doc, path, *desc)).collect()
    }

    fn compare(&self, a: &[Weighted], b: &[Weighted]) -> Ordering {
        for ((_, descending), (x, y)) in self.keys.iter().zip(a.iter().zip(b)) {
            let o = x.cmp(y);
            let o = if *descending { o.reverse() } else { o };
            if o != Ordering::Equal {
                return o;
            }
        }
        Ordering::Equal
    }
}

/// The key a document sorts by for one path.
///
/// Arrays contribute their smallest element when ascending and their largest when
/// descending. A missing field sorts as null. An empty array sorts below null ascending
/// and as an array descending.
#[must_use]
pub fn sort_key(doc: &Document, path: &FieldPath, descending: bool) -> Weighted {
    let values = FieldWalker::new(doc).go(path);
    let wanted = if descending { Ordering::Greater } else { Ordering::Less };
    let null = Bson::Null;
    let mut best: Option<&Bson> = values.array_field_missing().then_some(&null);
    for hit in values.elements() {
        best = match best {
            Some(b) if cmp_values(hit.value, b) != wanted => Some(b),
            _ => Some(hit.value),
        };
    }
    match best {
        Some(v) => Weighted::new(v),
        None if !values.arrays().is_empty() => {
            if descending {
                Weighted::new(&Bson::Array(Vec::new()))
            } else {
                Weighted::empty_array()
            }
        }
        None => Weighted::null(),
    }
}

/// Stable sort: ties on one key are broken by the next key only.
#[must_use]
pub fn sort(matches: Vec<Match>, spec: &SortSpec) -> Vec<Match> {
    if spec.is_empty() {
        return matches;
    }
    let mut keyed: Vec<(Vec<Weighted>, Match)> = matches.into_iter().map(|m| (spec.keys_for(&m.doc), m)).collect();
    keyed.sort_by(|(a, _), (b, _)| spec.compare(a, b));
    keyed.into_iter().map(|(_, m)| m).collect()
}

/// Sort array elements by embedded fields, as `$push` with `$sort: {field: dir}` does.
/// Non-document elements sort as if every field were missing.
pub fn sort_values(items: &mut [Bson], spec: &SortSpec) {
    let empty = Document::new();
    let mut keyed: Vec<(Vec<Weighted>, Bson)> = items
        .iter()
        .map(|item| {
            let doc = match item {
                Bson::Document(d) => d,
                _ => &empty,
            };
            (spec.keys_for(doc), item.clone())
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| spec.compare(a, b));
    for (slot, (_, item)) in items.iter_mut().zip(keyed) {
        *slot = item;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn docs(ms: &[Match]) -> Vec<Document> {
        ms.iter().map(|m| m.doc.clone()).collect()
    }

    #[test]
    fn empty_array_before_null_when_descending() {
        let spec = SortSpec::parse(&doc! {"a": -1}).unwrap();
        let out = sort(vec![Match::bare(doc! {"a": null}), Match::bare(doc! {"a": []})], &spec);
        assert_eq!(docs(&out), vec![doc! {"a": []}, doc! {"a": null}]);
    }

    #[test]
    fn empty_array_before_null_when_ascending() {
        let spec = SortSpec::parse(&doc! {"a": 1}).unwrap();
        let out = sort(vec![Match::bare(doc! {"a": null}), Match::bare(doc! {"a": []})], &spec);
        assert_eq!(docs(&out), vec![doc! {"a": []}, doc! {"a": null}]);
    }

    #[test]
    fn arrays_use_extreme_element() {
        let asc = SortSpec::parse(&doc! {"a": 1}).unwrap();
        let input = vec![Match::bare(doc! {"a": [5, 0]}), Match::bare(doc! {"a": 3})];
        assert_eq!(docs(&sort(input.clone(), &asc)), vec![doc! {"a": [5, 0]}, doc! {"a": 3}]);
        let desc = SortSpec::parse(&doc! {"a": -1}).unwrap();
        assert_eq!(docs(&sort(input, &desc)), vec![doc! {"a": [5, 0]}, doc! {"a": 3}]);
    }

    #[test]
    fn second_key_only_breaks_ties() {
        let spec = SortSpec::parse(&doc! {"a": 1, "b": -1}).unwrap();
        let out = sort(
            vec![
                Match::bare(doc! {"a": 2, "b": 1}),
                Match::bare(doc! {"a": 1, "b": 1}),
                Match::bare(doc! {"a": 1, "b": 2}),
            ],
            &spec,
        );
        assert_eq!(docs(&out), vec![doc! {"a": 1, "b": 2}, doc! {"a": 1, "b": 1}, doc! {"a": 2, "b": 1}]);
    }

    #[test]
    fn bad_direction_is_rejected() {
        assert_eq!(SortSpec::parse(&doc! {"a": 2}).unwrap_err().code(), Some(2));
        assert!(SortSpec::parse(&doc! {"a": "asc"}).is_err());
    }
}
