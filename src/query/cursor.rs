use std::collections::VecDeque;
use std::sync::Arc;

use bson::Document;

use super::exec::{self, QueryPlan};
use crate::errors::DbError;
use crate::storage::{Namespace, Storage};

/// Where a cursor is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Options may still change; nothing has been read.
    Unstarted,
    /// The pipeline ran and results remain buffered.
    Queried,
    /// Every result has been returned.
    Exhausted,
    /// Closed by the caller or by a failed pipeline.
    Killed,
}

/// Lazily executed query. The pipeline runs in full on the first pull.
pub struct Cursor {
    storage: Arc<dyn Storage>,
    ns: Namespace,
    plan: QueryPlan,
    state: CursorState,
    buffer: VecDeque<Document>,
    retrieved: usize,
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("ns", &self.ns)
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .field("retrieved", &self.retrieved)
            .finish_non_exhaustive()
    }
}

impl Cursor {
    pub(crate) fn new(storage: Arc<dyn Storage>, ns: Namespace, plan: QueryPlan) -> Self {
        Self { storage, ns, plan, state: CursorState::Unstarted, buffer: VecDeque::new(), retrieved: 0 }
    }

    #[must_use]
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Documents handed out so far.
    #[must_use]
    pub fn retrieved(&self) -> usize {
        self.retrieved
    }

    /// False once the cursor is exhausted or killed.
    #[must_use]
    pub fn alive(&self) -> bool {
        matches!(self.state, CursorState::Unstarted | CursorState::Queried)
    }

    fn unstarted(&self, what: &str) -> Result<(), DbError> {
        if self.state == CursorState::Unstarted {
            Ok(())
        } else {
            Err(DbError::InvalidOperation(format!("cannot set {what} after executing query")))
        }
    }

    /// # Errors
    /// Invalid sort specs, or the query already ran.
    pub fn sort(mut self, spec: &Document) -> Result<Self, DbError> {
        self.unstarted("sort")?;
        self.plan.set_sort(spec)?;
        Ok(self)
    }

    /// # Errors
    /// Invalid projections, or the query already ran.
    pub fn projection(mut self, spec: &Document) -> Result<Self, DbError> {
        self.unstarted("projection")?;
        self.plan.set_projection(spec)?;
        Ok(self)
    }

    /// # Errors
    /// The query already ran.
    pub fn skip(mut self, n: u64) -> Result<Self, DbError> {
        self.unstarted("skip")?;
        self.plan.set_skip(n);
        Ok(self)
    }

    /// # Errors
    /// The query already ran.
    pub fn limit(mut self, n: i64) -> Result<Self, DbError> {
        self.unstarted("limit")?;
        self.plan.set_limit(n);
        Ok(self)
    }

    /// # Errors
    /// The query already ran.
    pub fn max_time_ms(mut self, ms: u64) -> Result<Self, DbError> {
        self.unstarted("max_time_ms")?;
        self.plan.set_max_time_ms(ms);
        Ok(self)
    }

    /// Next result, running the pipeline first if needed.
    ///
    /// # Errors
    /// Pipeline failures (the cursor is killed), or pulling from a closed cursor.
    pub fn next_document(&mut self) -> Result<Option<Document>, DbError> {
        match self.state {
            CursorState::Killed => return Err(DbError::InvalidOperation("cursor is closed".into())),
            CursorState::Exhausted => return Ok(None),
            CursorState::Unstarted => {
                match exec::find(self.storage.as_ref(), &self.ns, &self.plan) {
                    Ok(docs) => self.buffer = docs.into(),
                    Err(e) => {
                        self.state = CursorState::Killed;
                        return Err(e);
                    }
                }
                self.state = CursorState::Queried;
            }
            CursorState::Queried => {}
        }
        match self.buffer.pop_front() {
            Some(doc) => {
                self.retrieved += 1;
                if self.buffer.is_empty() {
                    self.state = CursorState::Exhausted;
                }
                Ok(Some(doc))
            }
            None => {
                self.state = CursorState::Exhausted;
                Ok(None)
            }
        }
    }

    /// Drain the remaining results.
    ///
    /// # Errors
    /// See [`Cursor::next_document`].
    pub fn to_vec(mut self) -> Result<Vec<Document>, DbError> {
        let mut out = Vec::new();
        while let Some(doc) = self.next_document()? {
            out.push(doc);
        }
        Ok(out)
    }

    /// Forget buffered results so the next pull runs the query again.
    pub fn rewind(&mut self) {
        self.buffer.clear();
        self.retrieved = 0;
        self.state = CursorState::Unstarted;
    }

    pub fn close(&mut self) {
        self.buffer.clear();
        self.state = CursorState::Killed;
    }
}

impl Iterator for Cursor {
    type Item = Result<Document, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == CursorState::Killed {
            return None;
        }
        self.next_document().transpose()
    }
}
