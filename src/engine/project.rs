//! Projection compiler and applier.

use bson::{Bson, Document};

use super::Match;
use super::queries::{QueryFilter, QueryOptions};
use super::value::truthy;
use crate::errors::DbError;
use crate::utils::num::{f64_to_i64_exact, i64_to_usize};

#[derive(Debug, Clone)]
enum Rule {
    Include,
    Exclude,
    Slice { skip: Option<i64>, limit: i64 },
    /// `{field: {$elemMatch: ...}}`, compiled as a filter over `{field: [element]}`.
    ElemMatch { field: String, filter: QueryFilter },
    /// `field.$`: the element the query matched.
    Positional { top: String },
}

#[derive(Debug, Clone, Default)]
struct Node {
    rule: Option<Rule>,
    children: Vec<(String, Node)>,
}

impl Node {
    fn child(&self, key: &str) -> Option<&Node> {
        self.children.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    fn insert(&mut self, path: &str, rule: Rule) -> Result<(), DbError> {
        let mut node = self;
        for part in path.split('.') {
            if node.rule.is_some() {
                return Err(collision(path));
            }
            let pos = match node.children.iter().position(|(k, _)| k == part) {
                Some(p) => p,
                None => {
                    node.children.push((part.to_string(), Node::default()));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[pos].1;
        }
        if node.rule.is_some() || !node.children.is_empty() {
            return Err(collision(path));
        }
        node.rule = Some(rule);
        Ok(())
    }
}

fn collision(path: &str) -> DbError {
    DbError::bad_value(format!("Path collision at {path}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Inclusion,
    Exclusion,
}

/// A compiled projection document.
#[derive(Debug, Clone)]
pub struct Projector {
    mode: Mode,
    root: Node,
    include_id: bool,
}

fn slice_rule(arg: &Bson) -> Result<Rule, DbError> {
    let int = |v: &Bson| match v {
        Bson::Int32(i) => Ok(Some(i64::from(*i))),
        Bson::Int64(i) => Ok(Some(*i)),
        Bson::Double(d) => f64_to_i64_exact(*d)
            .map(Some)
            .ok_or_else(|| DbError::bad_value(format!("$slice only supports integral numbers, got {d}"))),
        _ => Ok(None),
    };
    match arg {
        Bson::Array(pair) if pair.len() == 2 => {
            let (Some(skip), Some(limit)) = (int(&pair[0])?, int(&pair[1])?) else {
                return Err(DbError::bad_value("$slice only supports numbers and [skip, limit] arrays"));
            };
            if limit <= 0 {
                return Err(DbError::bad_value("$slice limit must be positive"));
            }
            Ok(Rule::Slice { skip: Some(skip), limit })
        }
        Bson::Array(_) => Err(DbError::bad_value("$slice array wrong size")),
        other => int(other)?
            .map(|limit| Rule::Slice { skip: None, limit })
            .ok_or_else(|| DbError::bad_value("$slice only supports numbers and [skip, limit] arrays")),
    }
}

impl Projector {
    /// # Errors
    /// Mixed inclusion and exclusion, invalid array operators and positional
    /// projections the filter cannot satisfy.
    pub fn compile(spec: &Document, filter: &QueryFilter) -> Result<Self, DbError> {
        Self::compile_with(spec, filter, QueryOptions::default())
    }

    /// # Errors
    /// See [`Projector::compile`].
    pub fn compile_with(spec: &Document, filter: &QueryFilter, options: QueryOptions) -> Result<Self, DbError> {
        let mut root = Node::default();
        let mut include_id = true;
        let (mut includes, mut excludes) = (false, false);
        let (mut positional, mut elem_match) = (false, false);

        for (key, value) in spec {
            if key == "_id" && !matches!(value, Bson::Document(_)) {
                include_id = truthy(value);
                continue;
            }
            if let Some(field) = key.strip_suffix(".$") {
                if !truthy(value) {
                    return Err(DbError::bad_value("Cannot exclude array elements with the positional operator."));
                }
                if positional {
                    return Err(DbError::bad_value("Cannot specify more than one positional proj. per query."));
                }
                let top = field.split('.').next().unwrap_or_default().to_string();
                let referenced = filter.referenced_paths().iter().any(|p| p.top() == top);
                if !referenced {
                    return Err(DbError::bad_value(format!(
                        "Positional projection '{key}' does not match the query document."
                    )));
                }
                positional = true;
                includes = true;
                root.insert(field, Rule::Positional { top })?;
                continue;
            }
            let rule = match value {
                Bson::Document(d) => match d.keys().next().map(String::as_str) {
                    Some("$slice") => slice_rule(d.get("$slice").unwrap_or(&Bson::Null))?,
                    Some("$elemMatch") => {
                        if key.contains('.') {
                            return Err(DbError::bad_value("Cannot use $elemMatch projection on a nested field."));
                        }
                        let Some(Bson::Document(arg)) = d.get("$elemMatch") else {
                            return Err(DbError::bad_value("elemMatch: Invalid argument, object required."));
                        };
                        elem_match = true;
                        let mut condition = Document::new();
                        condition.insert("$elemMatch", arg.clone());
                        let wrapped = single(key, Bson::Document(condition));
                        Rule::ElemMatch { field: key.clone(), filter: QueryFilter::compile_with(&wrapped, options)? }
                    }
                    Some(op) if op.starts_with('$') => {
                        return Err(DbError::bad_value(format!("Unsupported projection option: {key}: {value}")));
                    }
                    _ => {
                        return Err(DbError::bad_value(format!(
                            "Nested projection documents are not supported: {key}: {value}"
                        )));
                    }
                },
                v if truthy(v) => {
                    includes = true;
                    Rule::Include
                }
                _ => {
                    excludes = true;
                    Rule::Exclude
                }
            };
            root.insert(key, rule)?;
        }

        if positional && elem_match {
            return Err(DbError::bad_value("Cannot specify positional operator and $elemMatch."));
        }
        if includes && excludes {
            return Err(DbError::bad_value("Projection cannot have a mix of inclusion and exclusion."));
        }
        let only_id_included = include_id && spec.get("_id").is_some_and(truthy) && root.children.is_empty();
        let inclusive = includes || only_id_included || (elem_match && !excludes);
        let mode = if inclusive { Mode::Inclusion } else { Mode::Exclusion };
        Ok(Self { mode, root, include_id })
    }

    /// Project one matched document.
    ///
    /// # Errors
    /// A positional projection whose matched element is missing.
    pub fn apply(&self, m: &Match) -> Result<Document, DbError> {
        match self.mode {
            Mode::Inclusion => self.include(&m.doc, &self.root, m, true),
            Mode::Exclusion => self.exclude(&m.doc, &self.root, m, true),
        }
    }

    fn include(&self, doc: &Document, node: &Node, m: &Match, top: bool) -> Result<Document, DbError> {
        let mut out = Document::new();
        for (k, v) in doc {
            let Some(child) = node.child(k) else {
                if top && k == "_id" && self.include_id {
                    out.insert(k, v.clone());
                }
                continue;
            };
            match &child.rule {
                Some(rule) => {
                    if let Some(projected) = apply_rule(rule, v, m)? {
                        out.insert(k, projected);
                    }
                }
                None => match v {
                    Bson::Document(d) => {
                        out.insert(k, self.include(d, child, m, false)?);
                    }
                    Bson::Array(items) => {
                        let mut kept = Vec::new();
                        for item in items {
                            if let Bson::Document(d) = item {
                                kept.push(Bson::Document(self.include(d, child, m, false)?));
                            }
                        }
                        out.insert(k, kept);
                    }
                    _ => {}
                },
            }
        }
        Ok(out)
    }

    fn exclude(&self, doc: &Document, node: &Node, m: &Match, top: bool) -> Result<Document, DbError> {
        let mut out = Document::new();
        for (k, v) in doc {
            let Some(child) = node.child(k) else {
                if !(top && k == "_id" && !self.include_id) {
                    out.insert(k, v.clone());
                }
                continue;
            };
            match &child.rule {
                Some(rule) => {
                    if let Some(projected) = apply_rule(rule, v, m)? {
                        out.insert(k, projected);
                    }
                }
                None => match v {
                    Bson::Document(d) => {
                        out.insert(k, self.exclude(d, child, m, false)?);
                    }
                    Bson::Array(items) => {
                        let mut kept = Vec::with_capacity(items.len());
                        for item in items {
                            kept.push(match item {
                                Bson::Document(d) => Bson::Document(self.exclude(d, child, m, false)?),
                                other => other.clone(),
                            });
                        }
                        out.insert(k, kept);
                    }
                    other => {
                        out.insert(k, other.clone());
                    }
                },
            }
        }
        Ok(out)
    }
}

fn apply_rule(rule: &Rule, v: &Bson, m: &Match) -> Result<Option<Bson>, DbError> {
    Ok(match rule {
        Rule::Include => Some(v.clone()),
        Rule::Exclude => None,
        Rule::Slice { skip, limit } => Some(match v {
            Bson::Array(items) => Bson::Array(slice(items, *skip, *limit)),
            other => other.clone(),
        }),
        Rule::ElemMatch { field, filter } => match v {
            Bson::Array(items) => items
                .iter()
                .find(|item| filter.matches(&single(field, Bson::Array(vec![(*item).clone()]))))
                .map(|item| Bson::Array(vec![item.clone()])),
            _ => None,
        },
        Rule::Positional { top } => match v {
            Bson::Array(items) => {
                let hit = m.matched_index.get(top).and_then(|i| items.get(*i));
                let Some(item) = hit else {
                    return Err(DbError::bad_value(
                        "Executor error during find command :: caused by :: positional operator '.$' element mismatch",
                    ));
                };
                Some(Bson::Array(vec![item.clone()]))
            }
            other => Some(other.clone()),
        },
    })
}

fn single(key: &str, value: Bson) -> Document {
    let mut d = Document::new();
    d.insert(key, value);
    d
}

fn slice(items: &[Bson], skip: Option<i64>, limit: i64) -> Vec<Bson> {
    let len = items.len();
    let count = |n: i64| i64_to_usize(n.unsigned_abs().try_into().unwrap_or(i64::MAX)).unwrap_or(usize::MAX);
    let (start, take) = match skip {
        None if limit >= 0 => (0, count(limit)),
        None => (len.saturating_sub(count(limit)), len),
        Some(s) if s >= 0 => (count(s).min(len), count(limit)),
        Some(s) => (len.saturating_sub(count(s)), count(limit)),
    };
    items.iter().skip(start).take(take).cloned().collect()
}

/// Compile a projection against the filter it will be used with.
///
/// # Errors
/// See [`Projector::compile`].
pub fn compile_projection(spec: &Document, filter: &QueryFilter) -> Result<Projector, DbError> {
    Projector::compile(spec, filter)
}

/// # Errors
/// See [`Projector::apply`].
pub fn apply_projection(projector: &Projector, m: &Match) -> Result<Document, DbError> {
    projector.apply(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::value::documents_identical;
    use bson::doc;

    fn project(spec: Document, filter: Document, d: Document) -> Result<Document, DbError> {
        let filter = QueryFilter::compile(&filter)?;
        let p = Projector::compile(&spec, &filter)?;
        let m = filter.evaluate(&d).ok_or_else(|| DbError::InvalidOperation("no match".into()))?;
        p.apply(&m)
    }

    #[test]
    fn inclusion_keeps_document_order() {
        let out = project(doc! {"c": 1, "a": 1}, doc! {}, doc! {"_id": 1, "a": 1, "b": 2, "c": 3}).unwrap();
        assert!(documents_identical(&out, &doc! {"_id": 1, "a": 1, "c": 3}));
        let out = project(doc! {"x": 1}, doc! {}, doc! {"x": {"c": 1, "a": 2}, "_id": 1}).unwrap();
        assert!(documents_identical(&out, &doc! {"x": {"c": 1, "a": 2}, "_id": 1}));
    }

    #[test]
    fn nested_inclusion_drops_scalars_in_arrays() {
        let out = project(doc! {"a.b": 1, "_id": 0}, doc! {}, doc! {"_id": 1, "a": [{"b": 1, "c": 2}, 5]}).unwrap();
        assert_eq!(out, doc! {"a": [{"b": 1}]});
    }

    #[test]
    fn exclusion_and_id() {
        let out = project(doc! {"b": 0, "_id": 0}, doc! {}, doc! {"_id": 1, "a": 1, "b": 2}).unwrap();
        assert_eq!(out, doc! {"a": 1});
        let out = project(doc! {"_id": 1}, doc! {}, doc! {"_id": 1, "a": 1}).unwrap();
        assert_eq!(out, doc! {"_id": 1});
    }

    #[test]
    fn mixing_is_rejected() {
        let f = QueryFilter::compile(&doc! {}).unwrap();
        assert!(Projector::compile(&doc! {"a": 1, "b": 0}, &f).is_err());
        assert!(Projector::compile(&doc! {"a": 1, "_id": 0}, &f).is_ok());
    }

    #[test]
    fn positional_uses_matched_index() {
        let out = project(doc! {"a.$": 1}, doc! {"a": {"$gt": 2}}, doc! {"_id": 1, "a": [1, 3, 5]}).unwrap();
        assert_eq!(out, doc! {"_id": 1, "a": [3]});
    }

    #[test]
    fn positional_must_match_filter() {
        let f = QueryFilter::compile(&doc! {"b": 1}).unwrap();
        assert!(Projector::compile(&doc! {"a.$": 1}, &f).is_err());
    }

    #[test]
    fn slice_keeps_other_fields_elem_match_does_not() {
        let out = project(doc! {"a": {"$slice": -2}}, doc! {}, doc! {"_id": 1, "a": [1, 2, 3], "b": 1}).unwrap();
        assert_eq!(out, doc! {"_id": 1, "a": [2, 3], "b": 1});
        let out = project(
            doc! {"a": {"$elemMatch": {"x": {"$gte": 2}}}},
            doc! {},
            doc! {"_id": 1, "a": [{"x": 1}, {"x": 2}, {"x": 3}], "b": 1},
        )
        .unwrap();
        assert_eq!(out, doc! {"_id": 1, "a": [{"x": 2}]});
    }

    #[test]
    fn slice_with_skip() {
        let out = project(doc! {"a": {"$slice": [1, 2]}, "_id": 0}, doc! {}, doc! {"a": [1, 2, 3, 4]}).unwrap();
        assert_eq!(out, doc! {"a": [2, 3]});
        let f = QueryFilter::compile(&doc! {}).unwrap();
        assert!(Projector::compile(&doc! {"a": {"$slice": [1, 0]}}, &f).is_err());
    }
}
