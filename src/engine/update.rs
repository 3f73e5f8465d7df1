//! Update compiler and applier.
//!
//! `Updator::compile` validates the whole update document (operators, argument shapes, path
//! conflicts, array-filter identifiers) before any document is read. `apply` stages every
//! operator's writes through one [`FieldWalker`] and commits them onto a copy, so a failing
//! document is left untouched.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use bson::{Bson, Document};

use super::Match;
use super::field_walker::{ArrayFilterSet, FieldPath, FieldWalker, PlainLookup, Segment};
use super::number::Num;
use super::queries::{LogicBox, QueryFilter, QueryOptions};
use super::sort::{SortSpec, sort_values};
use super::value::{documents_identical, id_clause, show, type_name, values_identical};
use super::weighted::{cmp_values, values_equal};
use crate::errors::{DbError, codes};
use crate::utils::num::i64_to_usize;

/// Named element predicates for `$[identifier]` segments.
#[derive(Debug, Clone, Default)]
pub struct ArrayFilters {
    groups: HashMap<String, QueryFilter>,
}

fn is_identifier(id: &str) -> bool {
    let mut chars = id.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase()) && chars.all(|c| c.is_ascii_alphanumeric())
}

impl ArrayFilters {
    /// # Errors
    /// Empty filters, several top-level names in one filter, invalid or duplicated identifiers.
    pub fn compile(filters: &[Document], options: QueryOptions) -> Result<Self, DbError> {
        let mut groups = HashMap::new();
        for filter in filters {
            let mut identifier: Option<String> = None;
            for key in filter.keys() {
                let top = key.split('.').next().unwrap_or_default();
                if top.starts_with('$') || top.is_empty() {
                    return Err(DbError::failure(
                        codes::FAILED_TO_PARSE,
                        "Cannot use an expression without a top-level field name in arrayFilters",
                    ));
                }
                match &identifier {
                    Some(id) if id != top => {
                        return Err(DbError::failure(
                            codes::FAILED_TO_PARSE,
                            format!("Error parsing array filter :: caused by :: Expected a single top-level field name, found '{id}' and '{top}'"),
                        ));
                    }
                    Some(_) => {}
                    None => identifier = Some(top.to_string()),
                }
            }
            let Some(id) = identifier else {
                return Err(DbError::failure(
                    codes::FAILED_TO_PARSE,
                    "Cannot use an expression without a top-level field name in arrayFilters",
                ));
            };
            if !is_identifier(&id) {
                return Err(DbError::bad_value(format!(
                    "Error parsing array filter :: caused by :: The top-level field name must be an alphanumeric string beginning with a lowercase letter, found '{id}'"
                )));
            }
            if groups.contains_key(&id) {
                return Err(DbError::failure(
                    codes::FAILED_TO_PARSE,
                    format!("Found multiple array filters with the same top-level field name {id}"),
                ));
            }
            groups.insert(id, QueryFilter::compile_with(filter, options)?);
        }
        Ok(Self { groups })
    }

    #[must_use]
    pub fn identifiers(&self) -> HashSet<&str> {
        self.groups.keys().map(String::as_str).collect()
    }
}

impl ArrayFilterSet for ArrayFilters {
    fn select(&self, identifier: &str, element: &Bson) -> Result<bool, DbError> {
        let filter = self.groups.get(identifier).ok_or_else(|| {
            DbError::bad_value(format!("No array filter found for identifier '{identifier}'"))
        })?;
        let mut wrapper = Document::new();
        wrapper.insert(identifier, element.clone());
        Ok(filter.matches(&wrapper))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateKind {
    Date,
    Timestamp,
}

#[derive(Debug, Clone)]
enum PushSort {
    Whole(bool),
    Fields(SortSpec),
}

#[derive(Debug, Clone)]
struct PushSpec {
    each: Vec<Bson>,
    position: Option<i64>,
    slice: Option<i64>,
    sort: Option<PushSort>,
}

#[derive(Debug, Clone)]
enum PullCondition {
    Equal(Bson),
    /// Operators applied to the element itself.
    Value(LogicBox),
    /// Sub-query over embedded-document elements.
    Query(QueryFilter),
}

impl PullCondition {
    fn matches(&self, item: &Bson) -> bool {
        match self {
            PullCondition::Equal(v) => values_equal(v, item),
            PullCondition::Value(b) => {
                let mut wrapper = Document::new();
                wrapper.insert("", item.clone());
                b.eval(&mut FieldWalker::new(&wrapper))
            }
            PullCondition::Query(q) => match item {
                Bson::Document(d) => q.matches(d),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
enum UpdateOp {
    Set(Bson),
    SetOnInsert(Bson),
    Unset,
    Inc(Num),
    Mul(Num),
    Min(Bson),
    Max(Bson),
    Rename(FieldPath),
    CurrentDate(DateKind),
    Push(PushSpec),
    AddToSet(Vec<Bson>),
    Pop(bool),
    Pull(PullCondition),
    PullAll(Vec<Bson>),
}

#[derive(Debug, Clone)]
struct FieldUpdate {
    operator: String,
    path: FieldPath,
    op: UpdateOp,
}

/// A compiled update document.
#[derive(Debug, Clone)]
pub struct Updator {
    ops: Vec<FieldUpdate>,
    array_filters: ArrayFilters,
}

const OPERATORS: [&str; 14] = [
    "$addToSet",
    "$currentDate",
    "$inc",
    "$max",
    "$min",
    "$mul",
    "$pop",
    "$pull",
    "$pullAll",
    "$push",
    "$rename",
    "$set",
    "$setOnInsert",
    "$unset",
];

fn parse_err(msg: impl Into<String>) -> DbError {
    DbError::failure(codes::FAILED_TO_PARSE, msg)
}

fn integral_arg(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(d) => crate::utils::num::f64_to_i64_exact(*d),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok().and_then(crate::utils::num::f64_to_i64_exact),
        _ => None,
    }
}

impl Updator {
    /// # Errors
    /// Any malformed operator, argument or path, conflicting paths, and array-filter
    /// identifiers that are missing or unused.
    pub fn compile(spec: &Document, array_filters: &[Document]) -> Result<Self, DbError> {
        Self::compile_with(spec, array_filters, QueryOptions::default())
    }

    /// # Errors
    /// See [`Updator::compile`].
    pub fn compile_with(spec: &Document, array_filters: &[Document], options: QueryOptions) -> Result<Self, DbError> {
        if spec.is_empty() {
            return Err(DbError::bad_value("update document must not be empty"));
        }
        let mut by_operator: BTreeMap<&str, &Document> = BTreeMap::new();
        for (operator, arg) in spec {
            if !operator.starts_with('$') {
                return Err(DbError::bad_value("update only works with $ operators"));
            }
            let Some(&name) = OPERATORS.iter().find(|o| **o == operator.as_str()) else {
                return Err(parse_err(format!("Unknown modifier: {operator}. Expected a valid update modifier or pipeline-style update specified as an array")));
            };
            let Bson::Document(fields) = arg else {
                return Err(parse_err(format!(
                    "Modifiers operate on fields but we found type {} instead. For example: {{$mod: {{<field>: ...}}}} not {{{operator}: {arg}}}",
                    type_name(arg)
                )));
            };
            if fields.is_empty() {
                return Err(parse_err(format!(
                    "'{operator}' is empty. You must specify a field like so: {{{operator}: {{<field>: ...}}}}"
                )));
            }
            by_operator.insert(name, fields);
        }

        let mut ops = Vec::new();
        for (operator, fields) in by_operator {
            for (field, value) in fields {
                let path = FieldPath::parse_update(field)?;
                let op = compile_op(operator, field, value, options)?;
                ops.push(FieldUpdate { operator: operator.to_string(), path, op });
            }
        }

        check_conflicts(&ops)?;

        let array_filters = ArrayFilters::compile(array_filters, options)?;
        let available = array_filters.identifiers();
        let mut used = HashSet::new();
        for update in &ops {
            for id in update.path.identifiers() {
                if !available.contains(id) {
                    return Err(DbError::bad_value(format!(
                        "No array filter found for identifier '{id}' in path '{}'",
                        update.path
                    )));
                }
                used.insert(id.to_string());
            }
        }
        let mut unused: Vec<&&str> = available.iter().filter(|id| !used.contains(**id)).collect();
        unused.sort();
        if let Some(id) = unused.first() {
            return Err(parse_err(format!("The array filter for identifier '{id}' was not used in the update {spec}")));
        }

        Ok(Self { ops, array_filters })
    }

    /// Apply to one matched document. Returns whether the document changed.
    ///
    /// # Errors
    /// Data-dependent failures; `m` is left unchanged when one occurs.
    pub fn apply(&self, m: &mut Match, inserting: bool) -> Result<bool, DbError> {
        let staged = {
            let mut walker = FieldWalker::with_matches(&m.doc, m.matched_index.clone());
            for update in &self.ops {
                self.stage(update, &mut walker, inserting)?;
            }
            walker.into_staged()
        };
        if staged.is_empty() {
            return Ok(false);
        }
        let mut updated = m.doc.clone();
        staged.commit(&mut updated)?;
        if let Some(original) = m.doc.get("_id") {
            let same = updated.get("_id").is_some_and(|now| values_identical(original, now));
            if !same {
                return Err(DbError::write(
                    codes::IMMUTABLE_FIELD,
                    "Performing an update on the path '_id' would modify the immutable field '_id'",
                ));
            }
        }
        let changed = !documents_identical(&m.doc, &updated);
        m.doc = updated;
        Ok(changed)
    }

    fn stage(&self, update: &FieldUpdate, walker: &mut FieldWalker<'_>, inserting: bool) -> Result<(), DbError> {
        let path = &update.path;
        let filters = &self.array_filters;
        let doc = walker.doc();
        let field = path.as_str();
        match &update.op {
            UpdateOp::Set(v) => walker.set(path, v, filters),
            UpdateOp::SetOnInsert(v) => {
                if inserting {
                    walker.set(path, v, filters)
                } else {
                    Ok(())
                }
            }
            UpdateOp::Unset => walker.drop(path, filters),
            UpdateOp::Inc(n) | UpdateOp::Mul(n) => {
                let is_inc = matches!(update.op, UpdateOp::Inc(_));
                walker.set_with(path, filters, |current| {
                    let Some(current) = current else {
                        let start = if is_inc { n.clone() } else { n.zero_like() };
                        return start.into_bson().map(Some);
                    };
                    let Some(base) = Num::from_bson(current) else {
                        return Err(DbError::write(
                            codes::TYPE_MISMATCH,
                            format!(
                                "Cannot apply {} to a value of non-numeric type. {} has the field '{}' of non-numeric type {}",
                                update.operator,
                                id_clause(doc),
                                last_key(path),
                                type_name(current)
                            ),
                        ));
                    };
                    let result = if is_inc { base.checked_add(n) } else { base.checked_mul(n) };
                    match result {
                        Some(r) => r.into_bson().map(Some),
                        None => Err(DbError::write(
                            codes::BAD_VALUE,
                            format!(
                                "Failed to apply {} operations to current value ({}) for document {}",
                                update.operator,
                                show(current),
                                id_clause(doc)
                            ),
                        )),
                    }
                })
            }
            UpdateOp::Min(v) | UpdateOp::Max(v) => {
                let wanted = if matches!(update.op, UpdateOp::Min(_)) { Ordering::Less } else { Ordering::Greater };
                walker.set_with(path, filters, |current| match current {
                    None => Ok(Some(v.clone())),
                    Some(cur) if cmp_values(v, cur) == wanted => Ok(Some(v.clone())),
                    Some(_) => Ok(None),
                })
            }
            UpdateOp::Rename(dest) => {
                let value = match walker.lookup_plain(path) {
                    PlainLookup::Missing => return Ok(()),
                    PlainLookup::ThroughArray(depth, v) => {
                        return Err(DbError::write(
                            codes::BAD_VALUE,
                            format!(
                                "The source field cannot be an array element, '{field}' in doc with {} = {}",
                                path.prefix_str(depth),
                                show(v)
                            ),
                        ));
                    }
                    PlainLookup::Found(v) => v.clone(),
                };
                if let PlainLookup::ThroughArray(depth, v) = walker.lookup_plain(dest) {
                    return Err(DbError::write(
                        codes::BAD_VALUE,
                        format!(
                            "The destination field cannot be an array element, '{dest}' in doc with {} = {}",
                            dest.prefix_str(depth),
                            show(v)
                        ),
                    ));
                }
                walker.drop(path, filters)?;
                walker.set(dest, &value, filters)
            }
            UpdateOp::CurrentDate(kind) => {
                let now = chrono::Utc::now();
                let value = match kind {
                    DateKind::Date => Bson::DateTime(bson::DateTime::from_millis(now.timestamp_millis())),
                    DateKind::Timestamp => Bson::Timestamp(bson::Timestamp {
                        time: u32::try_from(now.timestamp()).unwrap_or(u32::MAX),
                        increment: 1,
                    }),
                };
                walker.set(path, &value, filters)
            }
            UpdateOp::Push(spec) => walker.set_with(path, filters, |current| {
                let mut items = match current {
                    None => Vec::new(),
                    Some(Bson::Array(a)) => a.clone(),
                    Some(other) => {
                        return Err(DbError::write(
                            codes::BAD_VALUE,
                            format!(
                                "The field '{}' must be an array but is of type {} in document {}",
                                field,
                                type_name(other),
                                id_clause(doc)
                            ),
                        ));
                    }
                };
                push_into(&mut items, spec);
                Ok(Some(Bson::Array(items)))
            }),
            UpdateOp::AddToSet(values) => walker.set_with(path, filters, |current| {
                let mut items = match current {
                    None => Vec::new(),
                    Some(Bson::Array(a)) => a.clone(),
                    Some(other) => {
                        return Err(DbError::write(
                            codes::BAD_VALUE,
                            format!(
                                "Cannot apply $addToSet to non-array field. Field named '{}' has non-array type {}",
                                last_key(path),
                                type_name(other)
                            ),
                        ));
                    }
                };
                for v in values {
                    if !items.iter().any(|existing| values_equal(existing, v)) {
                        items.push(v.clone());
                    }
                }
                Ok(Some(Bson::Array(items)))
            }),
            UpdateOp::Pop(first) => walker.update_existing(path, filters, |current| match current {
                Bson::Array(a) if a.is_empty() => Ok(None),
                Bson::Array(a) => {
                    let mut items = a.clone();
                    if *first {
                        items.remove(0);
                    } else {
                        items.pop();
                    }
                    Ok(Some(Bson::Array(items)))
                }
                other => Err(DbError::write(
                    codes::TYPE_MISMATCH,
                    format!("Path '{field}' contains an element of non-array type '{}'", type_name(other)),
                )),
            }),
            UpdateOp::Pull(cond) => walker.update_existing(path, filters, |current| match current {
                Bson::Array(a) => {
                    let kept: Vec<Bson> = a.iter().filter(|item| !cond.matches(item)).cloned().collect();
                    Ok((kept.len() != a.len()).then_some(Bson::Array(kept)))
                }
                _ => Err(DbError::write(codes::BAD_VALUE, "Cannot apply $pull to a non-array value")),
            }),
            UpdateOp::PullAll(values) => walker.update_existing(path, filters, |current| match current {
                Bson::Array(a) => {
                    let kept: Vec<Bson> = a
                        .iter()
                        .filter(|item| !values.iter().any(|v| values_equal(v, item)))
                        .cloned()
                        .collect();
                    Ok((kept.len() != a.len()).then_some(Bson::Array(kept)))
                }
                _ => Err(DbError::write(codes::BAD_VALUE, "Cannot apply $pullAll to a non-array value")),
            }),
        }
    }
}

/// Convenience: compile an update with default options.
///
/// # Errors
/// See [`Updator::compile`].
pub fn compile_update(spec: &Document, array_filters: &[Document]) -> Result<Updator, DbError> {
    Updator::compile(spec, array_filters)
}

fn last_key(path: &FieldPath) -> String {
    path.segments().last().map(Segment::key).unwrap_or_default()
}

fn push_into(items: &mut Vec<Bson>, spec: &PushSpec) {
    let len = items.len();
    let at = match spec.position {
        None => len,
        Some(p) if p >= 0 => i64_to_usize(p).map_or(len, |p| p.min(len)),
        Some(p) => {
            let back = i64_to_usize(p.unsigned_abs().try_into().unwrap_or(i64::MAX)).unwrap_or(usize::MAX);
            len.saturating_sub(back)
        }
    };
    items.splice(at..at, spec.each.iter().cloned());
    match &spec.sort {
        Some(PushSort::Whole(descending)) => {
            items.sort_by(|a, b| {
                let o = cmp_values(a, b);
                if *descending { o.reverse() } else { o }
            });
        }
        Some(PushSort::Fields(sort)) => sort_values(items, sort),
        None => {}
    }
    if let Some(n) = spec.slice {
        let keep = i64_to_usize(n.unsigned_abs().try_into().unwrap_or(i64::MAX)).unwrap_or(usize::MAX);
        if n >= 0 {
            items.truncate(keep);
        } else if items.len() > keep {
            items.drain(..items.len() - keep);
        }
    }
}

fn check_conflicts(ops: &[FieldUpdate]) -> Result<(), DbError> {
    let mut touched: Vec<&FieldPath> = Vec::new();
    for update in ops {
        let mut paths = vec![&update.path];
        if let UpdateOp::Rename(dest) = &update.op {
            paths.push(dest);
        }
        for path in paths {
            if let Some(prior) = touched.iter().find(|t| t.is_prefix_of(path) || path.is_prefix_of(t)) {
                return Err(DbError::failure(
                    codes::CONFLICTING_UPDATE_OPERATORS,
                    format!("Updating the path '{path}' would create a conflict at '{prior}'"),
                ));
            }
            touched.push(path);
        }
    }
    Ok(())
}

fn numeric_arg(operator: &str, field: &str, value: &Bson) -> Result<Num, DbError> {
    Num::from_bson(value).ok_or_else(|| {
        let verb = if operator == "$inc" { "increment" } else { "multiply" };
        DbError::failure(
            codes::TYPE_MISMATCH,
            format!("Cannot {verb} with non-numeric argument: {{{field}: {value}}}"),
        )
    })
}

fn compile_op(operator: &str, field: &str, value: &Bson, options: QueryOptions) -> Result<UpdateOp, DbError> {
    Ok(match operator {
        "$set" => UpdateOp::Set(value.clone()),
        "$setOnInsert" => UpdateOp::SetOnInsert(value.clone()),
        "$unset" => UpdateOp::Unset,
        "$inc" => UpdateOp::Inc(numeric_arg(operator, field, value)?),
        "$mul" => UpdateOp::Mul(numeric_arg(operator, field, value)?),
        "$min" => UpdateOp::Min(value.clone()),
        "$max" => UpdateOp::Max(value.clone()),
        "$rename" => UpdateOp::Rename(rename_target(field, value)?),
        "$currentDate" => UpdateOp::CurrentDate(date_kind(value)?),
        "$push" => UpdateOp::Push(push_spec(value)?),
        "$addToSet" => UpdateOp::AddToSet(add_to_set_values(value)?),
        "$pop" => {
            let n = integral_arg(value)
                .ok_or_else(|| parse_err(format!("Expected a number in: {field}: {value}")))?;
            match n {
                1 => UpdateOp::Pop(false),
                -1 => UpdateOp::Pop(true),
                _ => return Err(parse_err(format!("$pop expects 1 or -1, found: {value}"))),
            }
        }
        "$pull" => UpdateOp::Pull(pull_condition(value, options)?),
        "$pullAll" => match value {
            Bson::Array(items) => UpdateOp::PullAll(items.clone()),
            other => {
                return Err(DbError::bad_value(format!(
                    "$pullAll requires an array argument but was given a {}",
                    type_name(other)
                )));
            }
        },
        other => return Err(parse_err(format!("Unknown modifier: {other}"))),
    })
}

fn rename_target(field: &str, value: &Bson) -> Result<FieldPath, DbError> {
    let Bson::String(to) = value else {
        return Err(DbError::bad_value(format!("The 'to' field for $rename must be a string: {field}: {value}")));
    };
    let source = FieldPath::parse_update(field)?;
    let dest = FieldPath::parse_update(to)?;
    if source.has_array_operator() {
        return Err(DbError::bad_value(format!("The source field for $rename may not be dynamic: {field}")));
    }
    if dest.has_array_operator() {
        return Err(DbError::bad_value(format!("The destination field for $rename may not be dynamic: {to}")));
    }
    if field == to {
        return Err(DbError::bad_value(format!("The source and target field for $rename must differ: {field}: \"{to}\"")));
    }
    if source.is_prefix_of(&dest) || dest.is_prefix_of(&source) {
        return Err(DbError::bad_value(format!(
            "The source and target field for $rename must not be on the same path: {field}: \"{to}\""
        )));
    }
    Ok(dest)
}

fn date_kind(value: &Bson) -> Result<DateKind, DbError> {
    match value {
        Bson::Boolean(_) => Ok(DateKind::Date),
        Bson::Document(d) => match d.get("$type") {
            Some(Bson::String(s)) if s == "date" => Ok(DateKind::Date),
            Some(Bson::String(s)) if s == "timestamp" => Ok(DateKind::Timestamp),
            _ => Err(DbError::bad_value(
                "The '$type' string field is required to be 'date' or 'timestamp': {$currentDate: {field : {$type: 'date'}}}",
            )),
        },
        other => Err(DbError::bad_value(format!(
            "{other} is not valid type for $currentDate. Please use a boolean ('true') or a $type expression ({{$type: 'timestamp/date'}})."
        ))),
    }
}

fn is_sort_direction(v: &Bson) -> Option<bool> {
    match integral_arg(v) {
        Some(1) => Some(false),
        Some(-1) => Some(true),
        _ => None,
    }
}

fn push_spec(value: &Bson) -> Result<PushSpec, DbError> {
    let Bson::Document(d) = value else {
        return Ok(PushSpec { each: vec![value.clone()], position: None, slice: None, sort: None });
    };
    if !d.contains_key("$each") {
        return Ok(PushSpec { each: vec![value.clone()], position: None, slice: None, sort: None });
    }
    let mut spec = PushSpec { each: Vec::new(), position: None, slice: None, sort: None };
    for (k, v) in d {
        match k.as_str() {
            "$each" => match v {
                Bson::Array(items) => spec.each.clone_from(items),
                other => {
                    return Err(DbError::bad_value(format!(
                        "The argument to $each in $push must be an array but it was of type: {}",
                        type_name(other)
                    )));
                }
            },
            "$slice" => {
                spec.slice = Some(integral_arg(v).ok_or_else(|| {
                    DbError::bad_value(format!(
                        "The value for $slice must be an integer value but was given type: {}",
                        type_name(v)
                    ))
                })?);
            }
            "$position" => {
                spec.position = Some(integral_arg(v).ok_or_else(|| {
                    DbError::bad_value(format!(
                        "The value for $position must be an integer value, not of type: {}",
                        type_name(v)
                    ))
                })?);
            }
            "$sort" => {
                spec.sort = Some(match v {
                    Bson::Document(fields) => {
                        if fields.is_empty() {
                            return Err(DbError::bad_value(
                                "The $sort pattern is empty when it should be a set of fields.",
                            ));
                        }
                        PushSort::Fields(SortSpec::parse(fields).map_err(|_| {
                            DbError::bad_value("The $sort element value must be either 1 or -1")
                        })?)
                    }
                    other => PushSort::Whole(is_sort_direction(other).ok_or_else(|| {
                        DbError::bad_value("The $sort is invalid: use 1/-1 to sort the whole element, or {field:1/-1} to sort embedded fields")
                    })?),
                });
            }
            other => return Err(DbError::bad_value(format!("Unrecognized clause in $push: {other}"))),
        }
    }
    Ok(spec)
}

fn add_to_set_values(value: &Bson) -> Result<Vec<Bson>, DbError> {
    let Bson::Document(d) = value else {
        return Ok(vec![value.clone()]);
    };
    match d.get("$each") {
        None => Ok(vec![value.clone()]),
        Some(_) if d.len() > 1 => Err(DbError::bad_value(format!(
            "Found unexpected fields after $each in $addToSet: {d}"
        ))),
        Some(Bson::Array(items)) => Ok(items.clone()),
        Some(other) => Err(DbError::bad_value(format!(
            "The argument to $each in $addToSet must be an array but it was of type {}",
            type_name(other)
        ))),
    }
}

fn pull_condition(value: &Bson, options: QueryOptions) -> Result<PullCondition, DbError> {
    match value {
        Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => {
            let mut wrapper = Document::new();
            wrapper.insert("", value.clone());
            let filter = QueryFilter::compile_with(&wrapper, options)?;
            Ok(PullCondition::Value(filter.root().clone()))
        }
        Bson::Document(d) => Ok(PullCondition::Query(QueryFilter::compile_with(d, options)?)),
        Bson::RegularExpression(_) => {
            let mut wrapper = Document::new();
            wrapper.insert("", value.clone());
            Ok(PullCondition::Value(QueryFilter::compile_with(&wrapper, options)?.root().clone()))
        }
        other => Ok(PullCondition::Equal(other.clone())),
    }
}
