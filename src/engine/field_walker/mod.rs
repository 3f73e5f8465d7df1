//! Document traversal for reads and staged writes.
//!
//! Reads broadcast through arrays of embedded documents and report what they found as
//! [`FieldValues`]. Writes resolve concrete targets, stage new values and apply them together
//! in [`StagedChanges::commit`], which refuses overlapping paths before touching anything.

mod path;
mod tree;
mod values;

use std::collections::HashMap;

use bson::{Bson, Document};

pub use path::{FieldPath, Segment};
pub use tree::{FieldNode, FieldTree, Step};
pub use values::{FieldValues, Hit};

use crate::engine::value::{check_storable, show};
use crate::errors::{DbError, codes};

/// Array index matched by the query, per top-level field.
pub type MatchedIndex = HashMap<String, usize>;

/// Element selection for `$[identifier]` path segments.
pub trait ArrayFilterSet {
    /// # Errors
    /// Unknown identifiers.
    fn select(&self, identifier: &str, element: &Bson) -> Result<bool, DbError>;
}

/// No array filters supplied.
pub struct NoArrayFilters;

impl ArrayFilterSet for NoArrayFilters {
    fn select(&self, identifier: &str, _element: &Bson) -> Result<bool, DbError> {
        Err(DbError::bad_value(format!("No array filter found for identifier '{identifier}'")))
    }
}

#[derive(Debug, Clone)]
enum Action {
    Set(Bson),
    Unset,
}

#[derive(Debug, Clone)]
struct StagedWrite {
    steps: Vec<Step>,
    action: Action,
}

fn render(steps: &[Step]) -> String {
    steps.iter().map(ToString::to_string).collect::<Vec<_>>().join(".")
}

/// Outcome of a non-broadcasting lookup, used by `$rename`.
#[derive(Debug, Clone, Copy)]
pub enum PlainLookup<'a> {
    Found(&'a Bson),
    Missing,
    /// An array sits at this many segments into the path.
    ThroughArray(usize, &'a Bson),
}

pub struct FieldWalker<'a> {
    doc: &'a Document,
    matched: MatchedIndex,
    staged: Vec<StagedWrite>,
}

impl<'a> FieldWalker<'a> {
    #[must_use]
    pub fn new(doc: &'a Document) -> Self {
        Self::with_matches(doc, MatchedIndex::new())
    }

    #[must_use]
    pub fn with_matches(doc: &'a Document, matched: MatchedIndex) -> Self {
        Self { doc, matched, staged: Vec::new() }
    }

    #[must_use]
    pub fn doc(&self) -> &'a Document {
        self.doc
    }

    /// Read `path`. Each call builds and drops its own tree.
    #[must_use]
    pub fn go(&self, path: &FieldPath) -> FieldValues<'a> {
        FieldTree::new(self.doc).read(path)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> FieldValues<'a> {
        self.go(&FieldPath::parse(path))
    }

    pub fn record_match(&mut self, path: &FieldPath, index: usize) {
        self.matched.insert(path.top(), index);
    }

    #[must_use]
    pub fn matched_index(&self) -> &MatchedIndex {
        &self.matched
    }

    pub(crate) fn restore_matches(&mut self, matched: MatchedIndex) {
        self.matched = matched;
    }

    #[must_use]
    pub fn into_matches(self) -> MatchedIndex {
        self.matched
    }

    /// Walk without broadcasting, stopping at the first array met before the last segment.
    #[must_use]
    pub fn lookup_plain(&self, path: &FieldPath) -> PlainLookup<'a> {
        let mut cur: Option<&'a Bson> = None;
        let last = path.len().saturating_sub(1);
        for (i, seg) in path.segments().iter().enumerate() {
            let doc = match cur {
                None if i == 0 => self.doc,
                Some(Bson::Document(d)) => d,
                Some(v @ Bson::Array(_)) => return PlainLookup::ThroughArray(i, v),
                _ => return PlainLookup::Missing,
            };
            match doc.get(seg.key()) {
                Some(v @ Bson::Array(_)) if i < last => return PlainLookup::ThroughArray(i + 1, v),
                Some(v) => cur = Some(v),
                None => return PlainLookup::Missing,
            }
        }
        cur.map_or(PlainLookup::Missing, PlainLookup::Found)
    }

    /// Stage `value` at every target of `path`, creating missing containers.
    ///
    /// # Errors
    /// Unresolvable targets or values with keys that cannot be stored.
    pub fn set(&mut self, path: &FieldPath, value: &Bson, filters: &dyn ArrayFilterSet) -> Result<(), DbError> {
        self.set_with(path, filters, |_| Ok(Some(value.clone())))
    }

    /// Stage a value computed from each target's current value. Returning `None` leaves the target alone.
    ///
    /// # Errors
    /// Resolution errors and whatever `evaluator` returns.
    pub fn set_with<F>(&mut self, path: &FieldPath, filters: &dyn ArrayFilterSet, mut evaluator: F) -> Result<(), DbError>
    where
        F: FnMut(Option<&Bson>) -> Result<Option<Bson>, DbError>,
    {
        let mut tree = FieldTree::new(self.doc);
        for id in tree.resolve(path, &self.matched, filters, true)? {
            if let Some(value) = evaluator(tree.node(id).value)? {
                let steps = tree.steps(id);
                check_storable(&render(&steps), &value)?;
                self.staged.push(StagedWrite { steps, action: Action::Set(value) });
            }
        }
        Ok(())
    }

    /// Like [`FieldWalker::set_with`] but only visits targets that already exist.
    ///
    /// # Errors
    /// Resolution errors and whatever `evaluator` returns.
    pub fn update_existing<F>(&mut self, path: &FieldPath, filters: &dyn ArrayFilterSet, mut evaluator: F) -> Result<(), DbError>
    where
        F: FnMut(&Bson) -> Result<Option<Bson>, DbError>,
    {
        let mut tree = FieldTree::new(self.doc);
        for id in tree.resolve(path, &self.matched, filters, false)? {
            let Some(current) = tree.node(id).value else { continue };
            if let Some(value) = evaluator(current)? {
                let steps = tree.steps(id);
                check_storable(&render(&steps), &value)?;
                self.staged.push(StagedWrite { steps, action: Action::Set(value) });
            }
        }
        Ok(())
    }

    /// Stage removal of every existing target of `path`. Array elements become null.
    ///
    /// # Errors
    /// Resolution errors.
    pub fn drop(&mut self, path: &FieldPath, filters: &dyn ArrayFilterSet) -> Result<(), DbError> {
        let mut tree = FieldTree::new(self.doc);
        for id in tree.resolve(path, &self.matched, filters, false)? {
            if tree.node(id).exists {
                self.staged.push(StagedWrite { steps: tree.steps(id), action: Action::Unset });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn into_staged(self) -> StagedChanges {
        StagedChanges { writes: self.staged }
    }
}

/// Writes collected by a [`FieldWalker`], applied all at once.
#[derive(Debug, Clone, Default)]
pub struct StagedChanges {
    writes: Vec<StagedWrite>,
}

impl StagedChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Apply every staged write to `doc`.
    ///
    /// # Errors
    /// Code 40 when one staged path is a prefix of another (nothing is applied), code 28 when a
    /// target cannot be reached.
    pub fn commit(self, doc: &mut Document) -> Result<(), DbError> {
        for (i, a) in self.writes.iter().enumerate() {
            for b in &self.writes[i + 1..] {
                let (short, long) = if a.steps.len() <= b.steps.len() { (a, b) } else { (b, a) };
                if long.steps.starts_with(&short.steps) {
                    return Err(DbError::write(
                        codes::CONFLICTING_UPDATE_OPERATORS,
                        format!(
                            "Updating the path '{}' would create a conflict at '{}'",
                            render(&b.steps),
                            render(&short.steps)
                        ),
                    ));
                }
            }
        }
        for write in self.writes {
            match write.action {
                Action::Set(value) => set_in_document(doc, &write.steps, value)?,
                Action::Unset => unset_in_document(doc, &write.steps),
            }
        }
        Ok(())
    }
}

fn empty_container(next: &Step) -> Bson {
    match next {
        Step::Key(_) => Bson::Document(Document::new()),
        Step::Index(_) => Bson::Array(Vec::new()),
    }
}

fn not_viable(step: &Step, at: &Bson) -> DbError {
    DbError::write(
        codes::PATH_NOT_VIABLE,
        format!("Cannot create field '{step}' in element {}", show(at)),
    )
}

fn set_in_document(doc: &mut Document, steps: &[Step], value: Bson) -> Result<(), DbError> {
    let Some((first, rest)) = steps.split_first() else {
        return Ok(());
    };
    let key = first.to_string();
    let Some(next) = rest.first() else {
        doc.insert(key, value);
        return Ok(());
    };
    if !doc.contains_key(&key) {
        doc.insert(key.clone(), empty_container(next));
    }
    match doc.get_mut(&key) {
        Some(child) => set_in_value(child, rest, value),
        None => Ok(()),
    }
}

fn set_in_value(target: &mut Bson, steps: &[Step], value: Bson) -> Result<(), DbError> {
    let Some((first, rest)) = steps.split_first() else {
        *target = value;
        return Ok(());
    };
    match (target, first) {
        (Bson::Document(d), _) => set_in_document(d, steps, value),
        (Bson::Array(items), Step::Index(i)) => {
            if items.len() <= *i {
                items.resize(*i + 1, Bson::Null);
            }
            if let Some(next) = rest.first() {
                if matches!(items[*i], Bson::Null) {
                    items[*i] = empty_container(next);
                }
            }
            set_in_value(&mut items[*i], rest, value)
        }
        (other, step) => Err(not_viable(step, other)),
    }
}

fn unset_in_document(doc: &mut Document, steps: &[Step]) {
    let Some((first, rest)) = steps.split_first() else { return };
    let key = first.to_string();
    if rest.is_empty() {
        doc.remove(&key);
    } else if let Some(child) = doc.get_mut(&key) {
        unset_in_value(child, rest);
    }
}

fn unset_in_value(target: &mut Bson, steps: &[Step]) {
    match (target, steps.first()) {
        (Bson::Document(d), Some(_)) => unset_in_document(d, steps),
        (Bson::Array(items), Some(Step::Index(i))) => {
            if let Some(item) = items.get_mut(*i) {
                if steps.len() == 1 {
                    *item = Bson::Null;
                } else {
                    unset_in_value(item, &steps[1..]);
                }
            }
        }
        _ => {}
    }
}
