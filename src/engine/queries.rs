//! Query compiler and evaluator.
//!
//! A filter document compiles once into a [`LogicBox`] tree. Field leaves hold the path and an
//! ordered list of [`Predicate`]s; evaluation reads the path through a [`FieldWalker`] and
//! records the array index of positive hits for positional updates and projections.

use std::cmp::Ordering;

use bson::spec::BinarySubtype;
use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};

use super::Match;
use super::field_walker::{FieldPath, FieldValues, FieldWalker, Hit, NoArrayFilters};
use super::number::{Num, mod_matches};
use super::value::{is_known_type_code, truthy, type_code, type_codes_for_alias, type_name};
use super::weighted::{cmp_values, gravity, values_equal};
use crate::config::RegexOptionsPolicy;
use crate::errors::{DbError, codes};

/// Knobs that change how filters compile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub regex_options: RegexOptionsPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    fn holds(self, o: Ordering) -> bool {
        match self {
            CmpOp::Gt => o == Ordering::Greater,
            CmpOp::Gte => o != Ordering::Less,
            CmpOp::Lt => o == Ordering::Less,
            CmpOp::Lte => o != Ordering::Greater,
        }
    }
}

/// Compiled regular expression plus the literal it came from.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    source: String,
    options: String,
}

impl Pattern {
    /// # Errors
    /// Unsupported flags or an invalid pattern.
    pub fn new(source: &str, options: &str) -> Result<Self, DbError> {
        let mut b = RegexBuilder::new(source);
        for flag in options.chars() {
            match flag {
                'i' => {
                    b.case_insensitive(true);
                }
                'm' => {
                    b.multi_line(true);
                }
                's' => {
                    b.dot_matches_new_line(true);
                }
                'x' => {
                    b.ignore_whitespace(true);
                }
                'u' => {}
                other => {
                    return Err(DbError::bad_value(format!("invalid flag in regex options: {other}")));
                }
            }
        }
        let regex = b
            .build()
            .map_err(|e| DbError::bad_value(format!("Regular expression is invalid: {e}")))?;
        Ok(Self { regex, source: source.to_string(), options: options.to_string() })
    }

    fn from_bson_regex(re: &bson::Regex) -> Result<Self, DbError> {
        Self::new(re.pattern.as_str(), re.options.as_str())
    }

    /// Strings and generic binary holding UTF-8 are searched; stored regexes match when
    /// pattern and flags are identical.
    #[must_use]
    pub fn matches(&self, v: &Bson) -> bool {
        match v {
            Bson::String(s) | Bson::Symbol(s) => self.regex.is_match(s),
            Bson::Binary(b) if b.subtype == BinarySubtype::Generic => {
                std::str::from_utf8(&b.bytes).is_ok_and(|s| self.regex.is_match(s))
            }
            Bson::RegularExpression(re) => {
                re.pattern.as_str() == self.source && re.options.as_str() == self.options
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Member {
    Value(Bson),
    Pattern(Pattern),
}

impl Member {
    fn hit(&self, v: &Bson) -> bool {
        match self {
            Member::Value(q) => gravity(q) == gravity(v) && values_equal(q, v),
            Member::Pattern(p) => p.matches(v),
        }
    }
}

#[derive(Debug, Clone)]
enum Test {
    Eq(Bson),
    Ne(Bson),
    Cmp(CmpOp, Bson),
    In(Vec<Member>),
    Nin(Vec<Member>),
    Exists(bool),
    Type(Vec<i32>),
    All(Vec<Member>),
    Size(i64),
    Mod(Num, Num),
    Regex(Pattern),
}

/// One operator on a field, kept next to the literal it was compiled from.
#[derive(Debug, Clone)]
pub struct Predicate {
    operator: String,
    literal: Bson,
    test: Test,
}

/// `None`: the predicate fails. `Some(index)`: it holds, optionally at an array position.
type Outcome = Option<Option<usize>>;

fn null_outcome(values: &FieldValues<'_>) -> Outcome {
    values.null_or_missing().then(|| values.null_index())
}

fn equals(values: &FieldValues<'_>, q: &Bson) -> Outcome {
    if matches!(q, Bson::Null) {
        return null_outcome(values);
    }
    let w = gravity(q);
    values.iter_full().find(|h| gravity(h.value) == w && values_equal(h.value, q)).map(|h| h.index)
}

fn in_members(values: &FieldValues<'_>, members: &[Member]) -> Outcome {
    if members.iter().any(|m| matches!(m, Member::Value(Bson::Null))) && values.null_or_missing() {
        return Some(values.null_index());
    }
    values.iter_full().find(|h| members.iter().any(|m| m.hit(h.value))).map(|h| h.index)
}

fn compare(values: &FieldValues<'_>, op: CmpOp, q: &Bson) -> Outcome {
    if matches!(q, Bson::Null) {
        return match op {
            CmpOp::Gte | CmpOp::Lte => null_outcome(values),
            CmpOp::Gt | CmpOp::Lt => None,
        };
    }
    let q_nan = Num::from_bson(q).is_some_and(|n| n.is_nan());
    let extreme = |v: &Bson| matches!(v, Bson::MinKey | Bson::MaxKey);
    values
        .iter_full()
        .find(|h: &&Hit<'_>| {
            let v = h.value;
            if gravity(v) != gravity(q) && !extreme(q) && !extreme(v) {
                return false;
            }
            let o = cmp_values(v, q);
            if q_nan {
                return matches!(op, CmpOp::Gte | CmpOp::Lte) && o == Ordering::Equal;
            }
            op.holds(o)
        })
        .map(|h| h.index)
}

impl Predicate {
    #[must_use]
    pub fn operator(&self) -> &str {
        &self.operator
    }

    #[must_use]
    pub fn literal(&self) -> &Bson {
        &self.literal
    }

    fn test(&self, values: &FieldValues<'_>) -> Outcome {
        match &self.test {
            Test::Eq(q) => equals(values, q),
            Test::Ne(q) => equals(values, q).is_none().then_some(None),
            Test::Cmp(op, q) => compare(values, *op, q),
            Test::In(members) => in_members(values, members),
            Test::Nin(members) => in_members(values, members).is_none().then_some(None),
            Test::Exists(want) => (values.exists() == *want).then_some(None),
            Test::Type(codes) => {
                let elem = values.elements().iter().find(|h| codes.contains(&type_code(h.value)));
                match elem {
                    Some(h) => Some(h.index),
                    None => (codes.contains(&4) && !values.arrays().is_empty()).then_some(None),
                }
            }
            Test::All(members) => {
                if members.is_empty() {
                    return None;
                }
                let mut last = None;
                for m in members {
                    let hit = match m {
                        Member::Value(q) => equals(values, q),
                        Member::Pattern(p) => values.elements().iter().find(|h| p.matches(h.value)).map(|h| h.index),
                    };
                    last = Some(hit?);
                }
                last
            }
            Test::Size(n) => values
                .arrays()
                .iter()
                .find(|h| matches!(h.value, Bson::Array(a) if i64::try_from(a.len()).is_ok_and(|l| l == *n)))
                .map(|_| None),
            Test::Mod(d, r) => values
                .elements()
                .iter()
                .find(|h| Num::from_bson(h.value).is_some_and(|v| mod_matches(&v, d, r)))
                .map(|h| h.index),
            Test::Regex(p) => values.elements().iter().find(|h| p.matches(h.value)).map(|h| h.index),
        }
    }
}

/// How `$elemMatch` tests each array element.
#[derive(Debug, Clone)]
pub enum ElemMatcher {
    /// Sub-query over embedded-document elements.
    Query(Box<LogicBox>),
    /// Operators applied to the element itself, compiled against the empty path.
    Value(Box<LogicBox>),
}

impl ElemMatcher {
    fn matches_element(&self, item: &Bson) -> bool {
        match self {
            ElemMatcher::Query(q) => match item {
                Bson::Document(d) => q.eval(&mut FieldWalker::new(d)),
                _ => false,
            },
            ElemMatcher::Value(v) => {
                let mut wrapper = Document::new();
                wrapper.insert("", item.clone());
                v.eval(&mut FieldWalker::new(&wrapper))
            }
        }
    }
}

/// Compiled boolean expression node.
#[derive(Debug, Clone)]
pub enum LogicBox {
    Field { path: FieldPath, predicates: Vec<Predicate> },
    And(Vec<LogicBox>),
    Or(Vec<LogicBox>),
    Nor(Vec<LogicBox>),
    Not(Box<LogicBox>),
    ElemMatch { path: FieldPath, matcher: ElemMatcher },
}

impl LogicBox {
    /// Evaluate against the walker's document, recording positional matches on success.
    pub fn eval(&self, walker: &mut FieldWalker<'_>) -> bool {
        match self {
            LogicBox::Field { path, predicates } => {
                let values = walker.go(path);
                let mut index = None;
                for p in predicates {
                    match p.test(&values) {
                        None => return false,
                        Some(Some(i)) => index = Some(i),
                        Some(None) => {}
                    }
                }
                if let Some(i) = index {
                    walker.record_match(path, i);
                }
                true
            }
            LogicBox::And(children) => children.iter().all(|c| c.eval(walker)),
            LogicBox::Or(children) => children.iter().any(|c| c.eval(walker)),
            LogicBox::Nor(children) => {
                let saved = walker.matched_index().clone();
                let hit = children.iter().any(|c| c.eval(walker));
                walker.restore_matches(saved);
                !hit
            }
            LogicBox::Not(inner) => {
                let saved = walker.matched_index().clone();
                let hit = inner.eval(walker);
                walker.restore_matches(saved);
                !hit
            }
            LogicBox::ElemMatch { path, matcher } => {
                let values = walker.go(path);
                for arr in values.arrays() {
                    let Bson::Array(items) = arr.value else { continue };
                    if let Some(i) = items.iter().position(|item| matcher.matches_element(item)) {
                        walker.record_match(path, arr.index.unwrap_or(i));
                        return true;
                    }
                }
                false
            }
        }
    }

    fn collect_paths<'s>(&'s self, out: &mut Vec<&'s FieldPath>) {
        match self {
            LogicBox::Field { path, .. } | LogicBox::ElemMatch { path, .. } => out.push(path),
            LogicBox::And(c) | LogicBox::Or(c) | LogicBox::Nor(c) => {
                c.iter().for_each(|b| b.collect_paths(out));
            }
            LogicBox::Not(inner) => inner.collect_paths(out),
        }
    }
}

/// A compiled filter document.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    root: LogicBox,
    spec: Document,
}

impl QueryFilter {
    /// # Errors
    /// Malformed filters, with MongoDB's error codes and messages.
    pub fn compile(spec: &Document) -> Result<Self, DbError> {
        Self::compile_with(spec, QueryOptions::default())
    }

    /// # Errors
    /// Malformed filters.
    pub fn compile_with(spec: &Document, options: QueryOptions) -> Result<Self, DbError> {
        let root = Compiler { options }.top_level(spec)?;
        Ok(Self { root, spec: spec.clone() })
    }

    #[must_use]
    pub fn spec(&self) -> &Document {
        &self.spec
    }

    #[must_use]
    pub fn root(&self) -> &LogicBox {
        &self.root
    }

    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.root.eval(&mut FieldWalker::new(doc))
    }

    /// Match `doc`, keeping the positional bookkeeping for later update/projection.
    #[must_use]
    pub fn evaluate(&self, doc: &Document) -> Option<Match> {
        let mut walker = FieldWalker::new(doc);
        if self.root.eval(&mut walker) {
            Some(Match { doc: doc.clone(), matched_index: walker.into_matches() })
        } else {
            None
        }
    }

    /// Paths the filter reads from.
    #[must_use]
    pub fn referenced_paths(&self) -> Vec<&FieldPath> {
        let mut out = Vec::new();
        self.root.collect_paths(&mut out);
        out
    }

    /// Base document for an upsert: the filter's top-level equality conditions.
    ///
    /// # Errors
    /// Conflicting equality paths.
    pub fn upsert_seed(&self) -> Result<Document, DbError> {
        let mut pairs = Vec::new();
        collect_equalities(&self.spec, &mut pairs);
        let mut seed = Document::new();
        for (path, value) in pairs {
            let staged = {
                let mut walker = FieldWalker::new(&seed);
                walker.set(&FieldPath::parse_update(&path)?, &value, &NoArrayFilters)?;
                walker.into_staged()
            };
            staged.commit(&mut seed)?;
        }
        Ok(seed)
    }
}

fn is_operator_doc(v: &Bson) -> Option<&Document> {
    match v {
        Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => Some(d),
        _ => None,
    }
}

fn collect_equalities(spec: &Document, out: &mut Vec<(String, Bson)>) {
    for (k, v) in spec {
        if k == "$and" {
            if let Bson::Array(items) = v {
                for item in items {
                    if let Bson::Document(d) = item {
                        collect_equalities(d, out);
                    }
                }
            }
            continue;
        }
        if k.starts_with('$') {
            continue;
        }
        match is_operator_doc(v) {
            Some(ops) => {
                if let Some(eq) = ops.get("$eq") {
                    out.push((k.clone(), eq.clone()));
                }
            }
            None if matches!(v, Bson::RegularExpression(_)) => {}
            None => out.push((k.clone(), v.clone())),
        }
    }
}

/// Convenience: compile a filter with default options.
///
/// # Errors
/// Malformed filters.
pub fn compile_filter(spec: &Document) -> Result<QueryFilter, DbError> {
    QueryFilter::compile(spec)
}

fn failure(msg: impl Into<String>) -> DbError {
    DbError::bad_value(msg)
}

fn integral(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(d) => crate::utils::num::f64_to_i64_exact(*d),
        Bson::Decimal128(d) => {
            let text = d.to_string();
            text.parse::<f64>().ok().and_then(crate::utils::num::f64_to_i64_exact)
        }
        _ => None,
    }
}

struct Compiler {
    options: QueryOptions,
}

const TOP_LEVEL_UNSUPPORTED: [&str; 4] = ["$where", "$expr", "$text", "$jsonSchema"];

impl Compiler {
    fn top_level(&self, spec: &Document) -> Result<LogicBox, DbError> {
        let mut children = Vec::new();
        for (key, value) in spec {
            match key.as_str() {
                "$and" | "$or" | "$nor" => {
                    let list = self.clause_list(key, value)?;
                    children.push(match key.as_str() {
                        "$and" => LogicBox::And(list),
                        "$or" => LogicBox::Or(list),
                        _ => LogicBox::Nor(list),
                    });
                }
                "$comment" => {}
                k if TOP_LEVEL_UNSUPPORTED.contains(&k) => {
                    return Err(failure(format!("{k} is not supported")));
                }
                k if k.starts_with('$') => {
                    return Err(failure(format!("unknown top level operator: {k}")));
                }
                _ => children.push(self.field(FieldPath::parse(key), value)?),
            }
        }
        Ok(LogicBox::And(children))
    }

    fn clause_list(&self, op: &str, value: &Bson) -> Result<Vec<LogicBox>, DbError> {
        let Bson::Array(items) = value else {
            return Err(failure(format!("{op} must be an array")));
        };
        if items.is_empty() {
            return Err(failure("$and/$or/$nor must be a nonempty array"));
        }
        items
            .iter()
            .map(|item| match item {
                Bson::Document(d) => self.top_level(d),
                _ => Err(failure("$or/$and/$nor entries need to be full objects")),
            })
            .collect()
    }

    fn field(&self, path: FieldPath, value: &Bson) -> Result<LogicBox, DbError> {
        if let Some(ops) = is_operator_doc(value) {
            return self.operators(path, ops);
        }
        let test = match value {
            Bson::RegularExpression(re) => Test::Regex(Pattern::from_bson_regex(re)?),
            other => Test::Eq(other.clone()),
        };
        let predicate = Predicate { operator: "$eq".into(), literal: value.clone(), test };
        Ok(LogicBox::Field { path, predicates: vec![predicate] })
    }

    fn operators(&self, path: FieldPath, ops: &Document) -> Result<LogicBox, DbError> {
        let mut predicates = Vec::new();
        let mut extra = Vec::new();
        let mut regex: Option<(usize, String, String)> = None;
        let mut options: Option<(usize, String)> = None;

        for (pos, (op, arg)) in ops.iter().enumerate() {
            let test = match op.as_str() {
                "$eq" => Test::Eq(arg.clone()),
                "$ne" => Test::Ne(arg.clone()),
                "$gt" => Test::Cmp(CmpOp::Gt, arg.clone()),
                "$gte" => Test::Cmp(CmpOp::Gte, arg.clone()),
                "$lt" => Test::Cmp(CmpOp::Lt, arg.clone()),
                "$lte" => Test::Cmp(CmpOp::Lte, arg.clone()),
                "$in" => Test::In(members(op, arg)?),
                "$nin" => Test::Nin(members(op, arg)?),
                "$exists" => Test::Exists(truthy(arg)),
                "$type" => Test::Type(type_codes(arg)?),
                "$size" => Test::Size(size_arg(arg)?),
                "$mod" => mod_arg(arg)?,
                "$all" => match self.all(&path, arg)? {
                    AllMode::Literal(list) => Test::All(list),
                    AllMode::ElemMatch(boxes) => {
                        extra.extend(boxes);
                        continue;
                    }
                },
                "$regex" => {
                    let (source, inline) = match arg {
                        Bson::String(s) => (s.clone(), String::new()),
                        Bson::RegularExpression(re) => {
                            (re.pattern.as_str().to_string(), re.options.as_str().to_string())
                        }
                        _ => return Err(failure("$regex has to be a string")),
                    };
                    regex = Some((pos, source, inline));
                    continue;
                }
                "$options" => {
                    let Bson::String(s) = arg else {
                        return Err(failure("$options has to be a string"));
                    };
                    options = Some((pos, s.clone()));
                    continue;
                }
                "$not" => {
                    extra.push(LogicBox::Not(Box::new(self.negated(&path, arg)?)));
                    continue;
                }
                "$elemMatch" => {
                    extra.push(self.elem_match(&path, arg)?);
                    continue;
                }
                other => return Err(failure(format!("unknown operator: {other}"))),
            };
            predicates.push(Predicate { operator: op.clone(), literal: arg.clone(), test });
        }

        match (regex, options) {
            (None, Some(_)) => return Err(failure("$options needs a $regex")),
            (Some((rpos, source, inline)), opts) => {
                let flags = match opts {
                    None => inline,
                    Some((_, o)) if inline.is_empty() => o,
                    Some((_, o)) if o.is_empty() => inline,
                    Some((opos, o)) => match self.options.regex_options {
                        RegexOptionsPolicy::Strict => {
                            return Err(failure("options set in both $regex and $options"));
                        }
                        RegexOptionsPolicy::KeyOrder => {
                            if opos > rpos { o } else { inline }
                        }
                    },
                };
                let pattern = Pattern::new(&source, &flags)?;
                predicates.push(Predicate {
                    operator: "$regex".into(),
                    literal: Bson::String(source),
                    test: Test::Regex(pattern),
                });
            }
            (None, None) => {}
        }

        let leaf = LogicBox::Field { path, predicates };
        if extra.is_empty() {
            Ok(leaf)
        } else {
            extra.insert(0, leaf);
            Ok(LogicBox::And(extra))
        }
    }

    fn negated(&self, path: &FieldPath, arg: &Bson) -> Result<LogicBox, DbError> {
        match arg {
            Bson::RegularExpression(re) => Ok(LogicBox::Field {
                path: path.clone(),
                predicates: vec![Predicate {
                    operator: "$regex".into(),
                    literal: arg.clone(),
                    test: Test::Regex(Pattern::from_bson_regex(re)?),
                }],
            }),
            Bson::Document(d) => {
                if d.is_empty() {
                    return Err(failure("$not cannot be empty"));
                }
                if d.contains_key("$not") {
                    return Err(failure("$not cannot have a $not"));
                }
                match is_operator_doc(arg) {
                    Some(ops) => self.operators(path.clone(), ops),
                    None => Err(failure(format!(
                        "unknown operator: {}",
                        d.keys().next().map_or("", String::as_str)
                    ))),
                }
            }
            _ => Err(failure("$not needs a regex or a document")),
        }
    }

    fn elem_match(&self, path: &FieldPath, arg: &Bson) -> Result<LogicBox, DbError> {
        let Bson::Document(spec) = arg else {
            return Err(failure("$elemMatch needs an Object"));
        };
        let value_mode = spec
            .keys()
            .next()
            .is_some_and(|k| k.starts_with('$') && !matches!(k.as_str(), "$and" | "$or" | "$nor"));
        let matcher = if value_mode {
            ElemMatcher::Value(Box::new(self.operators(FieldPath::parse(""), spec)?))
        } else {
            ElemMatcher::Query(Box::new(self.top_level(spec)?))
        };
        Ok(LogicBox::ElemMatch { path: path.clone(), matcher })
    }

    fn all(&self, path: &FieldPath, arg: &Bson) -> Result<AllMode, DbError> {
        let Bson::Array(items) = arg else {
            return Err(failure("$all needs an array"));
        };
        let is_elem = |v: &Bson| {
            matches!(v, Bson::Document(d) if d.keys().next().is_some_and(|k| k == "$elemMatch"))
        };
        if items.first().is_some_and(is_elem) {
            let mut boxes = Vec::new();
            for item in items {
                let Bson::Document(d) = item else {
                    return Err(failure("$all/$elemMatch has to be consistent"));
                };
                if !is_elem(item) || d.len() != 1 {
                    return Err(failure("$all/$elemMatch has to be consistent"));
                }
                if let Some(spec) = d.get("$elemMatch") {
                    boxes.push(self.elem_match(path, spec)?);
                }
            }
            return Ok(AllMode::ElemMatch(boxes));
        }
        let mut list = Vec::new();
        for item in items {
            if is_elem(item) {
                return Err(failure("$all/$elemMatch has to be consistent"));
            }
            if is_operator_doc(item).is_some() {
                return Err(failure("no $ expressions in $all"));
            }
            list.push(match item {
                Bson::RegularExpression(re) => Member::Pattern(Pattern::from_bson_regex(re)?),
                other => Member::Value(other.clone()),
            });
        }
        Ok(AllMode::Literal(list))
    }
}

enum AllMode {
    Literal(Vec<Member>),
    ElemMatch(Vec<LogicBox>),
}

fn members(op: &str, arg: &Bson) -> Result<Vec<Member>, DbError> {
    let Bson::Array(items) = arg else {
        return Err(failure(format!("{op} needs an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::RegularExpression(re) => Ok(Member::Pattern(Pattern::from_bson_regex(re)?)),
            v if is_operator_doc(v).is_some() => Err(failure("cannot nest $ under $in")),
            v => Ok(Member::Value(v.clone())),
        })
        .collect()
}

fn type_code_of(v: &Bson) -> Result<Vec<i32>, DbError> {
    match v {
        Bson::String(alias) => type_codes_for_alias(alias)
            .map(<[i32]>::to_vec)
            .ok_or_else(|| failure(format!("Unknown type name alias: {alias}"))),
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => {
            let code = integral(v).ok_or_else(|| failure(format!("Invalid numerical type code: {v}")))?;
            if !is_known_type_code(code) {
                return Err(failure(format!("Invalid numerical type code: {code}")));
            }
            Ok(vec![i32::try_from(code).unwrap_or_default()])
        }
        other => Err(DbError::failure(
            codes::TYPE_MISMATCH,
            format!("type must be represented as a number or a string, not {}", type_name(other)),
        )),
    }
}

fn type_codes(arg: &Bson) -> Result<Vec<i32>, DbError> {
    match arg {
        Bson::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(type_code_of(item)?);
            }
            Ok(out)
        }
        other => type_code_of(other),
    }
}

fn size_arg(arg: &Bson) -> Result<i64, DbError> {
    if Num::from_bson(arg).is_none() {
        return Err(failure("$size needs a number"));
    }
    let n = integral(arg).ok_or_else(|| failure("$size must be a whole number"))?;
    if n < 0 {
        return Err(failure("$size may not be negative"));
    }
    Ok(n)
}

fn mod_arg(arg: &Bson) -> Result<Test, DbError> {
    let Bson::Array(items) = arg else {
        return Err(failure("malformed mod, needs to be an array"));
    };
    if items.len() < 2 {
        return Err(failure("malformed mod, not enough elements"));
    }
    if items.len() > 2 {
        return Err(failure("malformed mod, too many elements"));
    }
    let divisor = Num::from_bson(&items[0]).ok_or_else(|| failure("malformed mod, divisor not a number"))?;
    let remainder =
        Num::from_bson(&items[1]).ok_or_else(|| failure("malformed mod, remainder not a number"))?;
    let zero = match &divisor {
        Num::Decimal(d) => d.is_zero(),
        other => other.truncated().is_none_or(|d| d == 0),
    };
    if zero {
        return Err(failure("divisor cannot be 0"));
    }
    Ok(Test::Mod(divisor, remainder))
}
