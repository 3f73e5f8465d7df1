use std::time::{Duration, Instant};

use bson::{Bson, Document};

use super::telemetry;
use super::types::{DeleteResult, FindOptions, UpdateResult};
use crate::document::prepare_for_insert;
use crate::engine::field_walker::FieldWalker;
use crate::engine::value::show;
use crate::engine::weighted::values_equal;
use crate::engine::{Match, Projector, QueryFilter, QueryOptions, SortSpec, Updator, sort};
use crate::errors::DbError;
use crate::storage::{Namespace, Storage};
use crate::utils::devlog::OpTimer;
use crate::utils::num::{u64_to_usize, usize_to_u64};

/// Everything `find` needs, compiled before any document is read.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub(crate) filter: QueryFilter,
    sort: Option<SortSpec>,
    projection: Option<Document>,
    projector: Option<Projector>,
    skip: u64,
    limit: i64,
    max_scan: Option<usize>,
    max_time_ms: Option<u64>,
    options: QueryOptions,
}

impl QueryPlan {
    /// # Errors
    /// Malformed filter, sort or projection.
    pub fn compile(filter: &Document, opts: &FindOptions, options: QueryOptions) -> Result<Self, DbError> {
        let filter = QueryFilter::compile_with(filter, options)?;
        let sort = opts.sort.as_ref().map(SortSpec::parse).transpose()?;
        let projector = match &opts.projection {
            Some(spec) => Some(Projector::compile_with(spec, &filter, options)?),
            None => None,
        };
        Ok(Self {
            filter,
            sort,
            projection: opts.projection.clone(),
            projector,
            skip: opts.skip,
            limit: opts.limit,
            max_scan: opts.max_scan,
            max_time_ms: opts.max_time_ms,
            options,
        })
    }

    pub(crate) fn set_sort(&mut self, spec: &Document) -> Result<(), DbError> {
        self.sort = Some(SortSpec::parse(spec)?);
        Ok(())
    }

    pub(crate) fn set_projection(&mut self, spec: &Document) -> Result<(), DbError> {
        self.projector = Some(Projector::compile_with(spec, &self.filter, self.options)?);
        self.projection = Some(spec.clone());
        Ok(())
    }

    pub(crate) fn set_skip(&mut self, skip: u64) {
        self.skip = skip;
    }

    pub(crate) fn set_limit(&mut self, limit: i64) {
        self.limit = limit;
    }

    pub(crate) fn set_max_time_ms(&mut self, ms: u64) {
        self.max_time_ms = Some(ms);
    }

    #[must_use]
    pub fn projection(&self) -> Option<&Document> {
        self.projection.as_ref()
    }
}

struct Deadline(Option<Instant>);

impl Deadline {
    fn new(ms: Option<u64>) -> Self {
        Self(ms.map(|ms| Instant::now() + Duration::from_millis(ms)))
    }

    fn check(&self, ns: &Namespace) -> Result<(), DbError> {
        match self.0 {
            Some(at) if Instant::now() >= at => {
                telemetry::log_timeout(&ns.to_string());
                Err(DbError::ExecutionTimeout)
            }
            _ => Ok(()),
        }
    }
}

/// fetch, filter, sort, skip, limit, project.
///
/// # Errors
/// Storage failures, an expired deadline and positional projection mismatches.
pub(crate) fn find(storage: &dyn Storage, ns: &Namespace, plan: &QueryPlan) -> Result<Vec<Document>, DbError> {
    let start = Instant::now();
    let mut timer = OpTimer::start("find", ns);
    let deadline = Deadline::new(plan.max_time_ms);
    let raw = storage.fetch(ns, plan.max_scan)?;
    let scanned = raw.len();
    let mut matches = Vec::new();
    for doc in &raw {
        deadline.check(ns)?;
        if let Some(m) = plan.filter.evaluate(doc) {
            matches.push(m);
        }
    }
    timer.phase("scan");
    if let Some(spec) = &plan.sort {
        deadline.check(ns)?;
        matches = sort(matches, spec);
        timer.phase("sort");
    }
    let skip = u64_to_usize(plan.skip).unwrap_or(usize::MAX);
    let limit = match plan.limit {
        0 => usize::MAX,
        n => u64_to_usize(n.unsigned_abs()).unwrap_or(usize::MAX),
    };
    let mut out = Vec::new();
    for m in matches.into_iter().skip(skip).take(limit) {
        out.push(match &plan.projector {
            Some(p) => p.apply(&m)?,
            None => m.doc,
        });
    }
    timer.phase("project");
    telemetry::log_query(&ns.to_string(), &plan.filter.spec().to_string(), start.elapsed().as_millis(), out.len(), plan.skip, plan.limit);
    timer.finish(out.len());
    log::debug!("find {ns}: scanned={scanned} returned={}", out.len());
    Ok(out)
}

fn matching(storage: &dyn Storage, ns: &Namespace, filter: &QueryFilter) -> Result<Vec<Match>, DbError> {
    Ok(storage.fetch(ns, None)?.iter().filter_map(|d| filter.evaluate(d)).collect())
}

/// # Errors
/// Storage failures.
pub(crate) fn count(storage: &dyn Storage, ns: &Namespace, filter: &QueryFilter, mut timer: OpTimer) -> Result<u64, DbError> {
    let n = storage.fetch(ns, None)?.iter().filter(|d| filter.matches(d)).count();
    timer.phase("scan");
    timer.finish(n);
    Ok(usize_to_u64(n))
}

/// Distinct values at `key` over matching documents, arrays unwound one level.
///
/// # Errors
/// Storage failures.
pub(crate) fn distinct(
    storage: &dyn Storage,
    ns: &Namespace,
    key: &str,
    filter: &QueryFilter,
    mut timer: OpTimer,
) -> Result<Vec<Bson>, DbError> {
    let mut out: Vec<Bson> = Vec::new();
    for doc in storage.fetch(ns, None)? {
        if !filter.matches(&doc) {
            continue;
        }
        let walker = FieldWalker::new(&doc);
        for hit in walker.get(key).elements() {
            if !out.iter().any(|seen| values_equal(seen, hit.value)) {
                out.push(hit.value.clone());
            }
        }
    }
    timer.phase("scan");
    timer.finish(out.len());
    Ok(out)
}

/// Validate, assign `_id` and store one document.
///
/// # Errors
/// Invalid documents and duplicate keys.
pub(crate) fn insert(storage: &dyn Storage, ns: &Namespace, doc: Document) -> Result<Bson, DbError> {
    let (doc, id) = prepare_for_insert(doc)?;
    storage.insert_one(ns, doc)?;
    telemetry::log_audit("insert", &ns.to_string(), &show(&id));
    Ok(id)
}

/// Apply `updator` to the first (or every) matching document, upserting when nothing matched.
///
/// When one document fails, documents already modified are kept. With `many` the failure is
/// reported as `DbError::BulkWrite` carrying the modified count and the position of the failing
/// document among the matches.
///
/// # Errors
/// Evaluate-time update failures, storage failures.
pub(crate) fn update(
    storage: &dyn Storage,
    ns: &Namespace,
    filter: &QueryFilter,
    updator: &Updator,
    upsert: bool,
    many: bool,
    mut timer: OpTimer,
) -> Result<UpdateResult, DbError> {
    let mut result = UpdateResult::default();
    let mut changed: Vec<Document> = Vec::new();
    let mut failure = None;
    let matched = matching(storage, ns, filter)?;
    timer.phase("scan");
    for (index, mut m) in matched.into_iter().enumerate() {
        result.matched_count += 1;
        match updator.apply(&mut m, false) {
            Ok(true) => {
                result.modified_count += 1;
                changed.push(m.doc);
            }
            Ok(false) => {}
            Err(e) => {
                failure = Some((index, e));
                break;
            }
        }
        if !many {
            break;
        }
    }
    timer.phase("apply");
    for doc in &changed {
        telemetry::log_audit("update", &ns.to_string(), &doc.get("_id").map(show).unwrap_or_default());
    }
    if !changed.is_empty() {
        storage.replace(ns, changed)?;
    }
    timer.phase("write");
    if let Some((index, e)) = failure {
        log::warn!("update on {ns} stopped at match {index}: {e}");
        return Err(if many {
            DbError::BulkWrite { n_inserted: 0, n_modified: result.modified_count, index, source: Box::new(e) }
        } else {
            e
        });
    }
    if result.matched_count == 0 && upsert {
        let mut seeded = Match::bare(filter.upsert_seed()?);
        updator.apply(&mut seeded, true)?;
        result.upserted_id = Some(insert(storage, ns, seeded.doc)?);
        timer.phase("upsert");
    }
    timer.finish(u64_to_usize(result.modified_count).unwrap_or(usize::MAX));
    Ok(result)
}

/// # Errors
/// Storage failures.
pub(crate) fn delete(
    storage: &dyn Storage,
    ns: &Namespace,
    filter: &QueryFilter,
    many: bool,
    mut timer: OpTimer,
) -> Result<DeleteResult, DbError> {
    let mut ids = Vec::new();
    for doc in storage.fetch(ns, None)? {
        if filter.matches(&doc) {
            ids.push(doc.get("_id").cloned().unwrap_or(Bson::Null));
            if !many {
                break;
            }
        }
    }
    timer.phase("scan");
    let deleted_count = if ids.is_empty() { 0 } else { storage.delete(ns, &ids)? };
    timer.phase("write");
    for id in &ids {
        telemetry::log_audit("delete", &ns.to_string(), &show(id));
    }
    timer.finish(u64_to_usize(deleted_count).unwrap_or(usize::MAX));
    Ok(DeleteResult { deleted_count })
}
