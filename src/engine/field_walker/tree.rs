//! Per-call traversal arena.
//!
//! A `FieldTree` is built for one path against one document and dropped afterwards. Nodes live
//! in a `Vec` and point at their parent by index, so a target node can be turned back into the
//! concrete steps a staged write needs.

use bson::{Bson, Document};

use super::path::{FieldPath, Segment};
use super::values::FieldValues;
use super::{ArrayFilterSet, MatchedIndex};
use crate::errors::{DbError, codes};
use crate::engine::value::show;

pub type NodeId = usize;
const ROOT: NodeId = 0;

/// One concrete step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Key(k) => f.write_str(k),
            Step::Index(i) => write!(f, "{i}"),
        }
    }
}

#[derive(Debug)]
pub struct FieldNode<'a> {
    pub step: Option<Step>,
    pub value: Option<&'a Bson>,
    pub exists: bool,
    /// Index in the first array crossed on the way down.
    pub outer_index: Option<usize>,
    pub parent: Option<NodeId>,
}

enum Container<'a> {
    Doc(&'a Document),
    Array(&'a [Bson]),
    Scalar(&'a Bson),
    Missing,
}

pub struct FieldTree<'a> {
    root: &'a Document,
    nodes: Vec<FieldNode<'a>>,
}

impl<'a> FieldTree<'a> {
    #[must_use]
    pub fn new(root: &'a Document) -> Self {
        let node = FieldNode { step: None, value: None, exists: true, outer_index: None, parent: None };
        Self { root, nodes: vec![node] }
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &FieldNode<'a> {
        &self.nodes[id]
    }

    fn container(&self, id: NodeId) -> Container<'a> {
        if id == ROOT {
            return Container::Doc(self.root);
        }
        match self.nodes[id].value {
            Some(Bson::Document(d)) => Container::Doc(d),
            Some(Bson::Array(a)) => Container::Array(a),
            Some(v) => Container::Scalar(v),
            None => Container::Missing,
        }
    }

    fn add(&mut self, parent: NodeId, step: Step, value: Option<&'a Bson>, outer: Option<usize>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(FieldNode {
            step: Some(step),
            value,
            exists: value.is_some(),
            outer_index: outer,
            parent: Some(parent),
        });
        id
    }

    /// Read traversal with array broadcasting.
    pub fn read(&mut self, path: &FieldPath) -> FieldValues<'a> {
        let mut values = FieldValues::default();
        let mut frontier = vec![ROOT];
        for seg in path.segments() {
            let key = seg.key();
            let mut next = Vec::new();
            for &node in &frontier {
                let outer = self.nodes[node].outer_index;
                match self.container(node) {
                    Container::Doc(d) => match d.get(&key) {
                        Some(v) => next.push(self.add(node, Step::Key(key.clone()), Some(v), outer)),
                        None => values.plain_missing = true,
                    },
                    Container::Array(items) => {
                        let (mut docs, mut hits) = (0usize, 0usize);
                        for (i, item) in items.iter().enumerate() {
                            let Bson::Document(d) = item else { continue };
                            docs += 1;
                            if let Some(v) = d.get(&key) {
                                hits += 1;
                                next.push(self.add(node, Step::Key(key.clone()), Some(v), outer.or(Some(i))));
                            }
                        }
                        if let Segment::Digits(_, idx) = seg {
                            match items.get(*idx) {
                                Some(v) => next.push(self.add(node, Step::Index(*idx), Some(v), outer.or(Some(*idx)))),
                                None if hits == 0 => values.array_status_normal = true,
                                None => {}
                            }
                        } else if docs == 0 {
                            values.array_status_normal = true;
                        } else if hits < docs {
                            values.array_field_missing = true;
                        }
                    }
                    Container::Scalar(_) | Container::Missing => values.plain_missing = true,
                }
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
        for id in frontier {
            if id == ROOT {
                continue;
            }
            if let Some(v) = self.nodes[id].value {
                values.push_leaf(v, self.nodes[id].outer_index);
            }
        }
        values
    }

    /// Write-side resolution: concrete target nodes for `path`, materializing missing
    /// intermediates when `create` is set.
    ///
    /// # Errors
    /// Positional operators without a match, array operators on non-arrays and paths that
    /// would have to traverse a scalar (when creating).
    pub fn resolve(
        &mut self,
        path: &FieldPath,
        matched: &MatchedIndex,
        filters: &dyn ArrayFilterSet,
        create: bool,
    ) -> Result<Vec<NodeId>, DbError> {
        let mut frontier = vec![ROOT];
        for (depth, seg) in path.segments().iter().enumerate() {
            let mut next = Vec::new();
            for &node in &frontier {
                let outer = self.nodes[node].outer_index;
                match self.container(node) {
                    Container::Doc(d) => match seg {
                        Segment::Field(k) | Segment::Digits(k, _) => {
                            let v = d.get(k);
                            if v.is_some() || create {
                                next.push(self.add(node, Step::Key(k.clone()), v, outer));
                            }
                        }
                        Segment::Positional => return Err(positional_not_found()),
                        Segment::AllElements | Segment::Filtered(_) => {
                            return Err(DbError::write(
                                codes::BAD_VALUE,
                                format!(
                                    "Cannot apply array updates to non-array element {}: {}",
                                    path.prefix_str(depth),
                                    show(&Bson::Document(d.clone()))
                                ),
                            ));
                        }
                    },
                    Container::Array(items) => match seg {
                        Segment::Digits(_, i) => {
                            let v = items.get(*i);
                            if v.is_some() || create {
                                next.push(self.add(node, Step::Index(*i), v, outer.or(Some(*i))));
                            }
                        }
                        Segment::Field(k) => {
                            if create {
                                return Err(not_viable(k, path, depth, self.nodes[node].value));
                            }
                        }
                        Segment::Positional => {
                            let i = *matched.get(&path.top()).ok_or_else(positional_not_found)?;
                            next.push(self.add(node, Step::Index(i), items.get(i), outer.or(Some(i))));
                        }
                        Segment::AllElements => {
                            for (i, item) in items.iter().enumerate() {
                                next.push(self.add(node, Step::Index(i), Some(item), outer.or(Some(i))));
                            }
                        }
                        Segment::Filtered(id) => {
                            for (i, item) in items.iter().enumerate() {
                                if filters.select(id, item)? {
                                    next.push(self.add(node, Step::Index(i), Some(item), outer.or(Some(i))));
                                }
                            }
                        }
                    },
                    Container::Scalar(v) => {
                        if create {
                            return Err(not_viable(&seg.key(), path, depth, Some(v)));
                        }
                    }
                    Container::Missing => match seg {
                        Segment::Field(k) => next.push(self.add(node, Step::Key(k.clone()), None, outer)),
                        Segment::Digits(_, i) => next.push(self.add(node, Step::Index(*i), None, outer)),
                        Segment::Positional => return Err(positional_not_found()),
                        Segment::AllElements | Segment::Filtered(_) => {
                            return Err(DbError::write(
                                codes::BAD_VALUE,
                                format!(
                                    "The path '{}' must exist in the document in order to apply array updates.",
                                    path.prefix_str(depth)
                                ),
                            ));
                        }
                    },
                }
            }
            frontier = next;
        }
        Ok(frontier)
    }

    /// Steps from the root down to `id`.
    #[must_use]
    pub fn steps(&self, id: NodeId) -> Vec<Step> {
        let mut out = Vec::new();
        let mut cur = Some(id);
        while let Some(n) = cur {
            if let Some(step) = &self.nodes[n].step {
                out.push(step.clone());
            }
            cur = self.nodes[n].parent;
        }
        out.reverse();
        out
    }
}

fn positional_not_found() -> DbError {
    DbError::write(
        codes::BAD_VALUE,
        "The positional operator did not find the match needed from the query.",
    )
}

fn not_viable(key: &str, path: &FieldPath, depth: usize, container: Option<&Bson>) -> DbError {
    let parent = path.prefix_str(depth);
    let shown = container.map(show).unwrap_or_default();
    let last = parent.rsplit('.').next().unwrap_or_default().to_string();
    DbError::write(
        codes::PATH_NOT_VIABLE,
        format!("Cannot create field '{key}' in element {{{last}: {shown}}}"),
    )
}
