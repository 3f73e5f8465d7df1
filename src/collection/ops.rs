use bson::{Bson, Document};

use super::core::Collection;
use crate::engine::{QueryFilter, Updator};
use crate::errors::DbError;
use crate::query::{
    self, Cursor, DeleteResult, FindOptions, InsertManyResult, InsertOneResult, QueryPlan, UpdateOptions,
    UpdateResult,
};
use crate::utils::devlog::OpTimer;
use crate::utils::num::usize_to_u64;

impl Collection {
    fn filter(&self, filter: &Document) -> Result<QueryFilter, DbError> {
        QueryFilter::compile_with(filter, self.options)
    }

    /// Compile `filter` under a fresh timer for `op`.
    fn timed_filter(&self, op: &'static str, filter: &Document) -> Result<(QueryFilter, OpTimer), DbError> {
        let mut timer = OpTimer::start(op, &self.ns);
        let filter = self.filter(filter)?;
        timer.phase("compile");
        Ok((filter, timer))
    }

    /// # Errors
    /// Invalid documents and duplicate `_id`s.
    pub fn insert_one(&self, doc: Document) -> Result<InsertOneResult, DbError> {
        let inserted_id = query::insert(self.storage.as_ref(), &self.ns, doc)?;
        Ok(InsertOneResult { inserted_id })
    }

    /// Insert a batch. Ordered batches stop at the first failure; unordered batches try every
    /// document and report the first failure.
    ///
    /// # Errors
    /// `DbError::BulkWrite` with the number inserted and the failing index.
    pub fn insert_many(&self, docs: Vec<Document>, ordered: bool) -> Result<InsertManyResult, DbError> {
        let mut result = InsertManyResult::default();
        let mut first_failure: Option<(usize, DbError)> = None;
        for (index, doc) in docs.into_iter().enumerate() {
            match query::insert(self.storage.as_ref(), &self.ns, doc) {
                Ok(id) => result.inserted_ids.push(id),
                Err(e) => {
                    if first_failure.is_none() {
                        first_failure = Some((index, e));
                    }
                    if ordered {
                        break;
                    }
                }
            }
        }
        match first_failure {
            None => Ok(result),
            Some((index, source)) => Err(DbError::BulkWrite {
                n_inserted: usize_to_u64(result.inserted_ids.len()),
                n_modified: 0,
                index,
                source: Box::new(source),
            }),
        }
    }

    /// Compile a query; it runs when the cursor is first pulled.
    ///
    /// # Errors
    /// Malformed filter, sort or projection.
    pub fn find(&self, filter: &Document, opts: FindOptions) -> Result<Cursor, DbError> {
        let plan = QueryPlan::compile(filter, &opts, self.options)?;
        Ok(Cursor::new(self.storage.clone(), self.ns.clone(), plan))
    }

    /// # Errors
    /// See [`Collection::find`].
    pub fn find_one(&self, filter: &Document, projection: Option<Document>) -> Result<Option<Document>, DbError> {
        let opts = FindOptions { projection, limit: -1, ..FindOptions::default() };
        self.find(filter, opts)?.next_document()
    }

    /// # Errors
    /// Malformed filter or storage failures.
    pub fn count_documents(&self, filter: &Document) -> Result<u64, DbError> {
        let (filter, timer) = self.timed_filter("count", filter)?;
        query::count(self.storage.as_ref(), &self.ns, &filter, timer)
    }

    /// # Errors
    /// Malformed filter or storage failures.
    pub fn distinct(&self, key: &str, filter: &Document) -> Result<Vec<Bson>, DbError> {
        let (filter, timer) = self.timed_filter("distinct", filter)?;
        query::distinct(self.storage.as_ref(), &self.ns, key, &filter, timer)
    }

    fn update(&self, filter: &Document, update: &Document, opts: &UpdateOptions, many: bool) -> Result<UpdateResult, DbError> {
        let (filter, mut timer) = self.timed_filter(if many { "update_many" } else { "update_one" }, filter)?;
        let updator = Updator::compile_with(update, &opts.array_filters, self.options)?;
        timer.phase("compile");
        query::update(self.storage.as_ref(), &self.ns, &filter, &updator, opts.upsert, many, timer)
    }

    /// # Errors
    /// Compile errors, update failures on the matched document, duplicate keys on upsert.
    pub fn update_one(&self, filter: &Document, update: &Document, opts: UpdateOptions) -> Result<UpdateResult, DbError> {
        self.update(filter, update, &opts, false)
    }

    /// # Errors
    /// Compile errors; a failure on one document stops the batch and is returned as
    /// `DbError::BulkWrite` after the earlier documents are stored.
    pub fn update_many(&self, filter: &Document, update: &Document, opts: UpdateOptions) -> Result<UpdateResult, DbError> {
        self.update(filter, update, &opts, true)
    }

    /// # Errors
    /// Malformed filter or storage failures.
    pub fn delete_one(&self, filter: &Document) -> Result<DeleteResult, DbError> {
        let (filter, timer) = self.timed_filter("delete_one", filter)?;
        query::delete(self.storage.as_ref(), &self.ns, &filter, false, timer)
    }

    /// # Errors
    /// Malformed filter or storage failures.
    pub fn delete_many(&self, filter: &Document) -> Result<DeleteResult, DbError> {
        let (filter, timer) = self.timed_filter("delete_many", filter)?;
        query::delete(self.storage.as_ref(), &self.ns, &filter, true, timer)
    }

    /// # Errors
    /// Storage failures.
    pub fn drop(&self) -> Result<bool, DbError> {
        self.storage.drop_collection(&self.ns)
    }
}
