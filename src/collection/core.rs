use std::sync::Arc;

use crate::engine::QueryOptions;
use crate::storage::{Namespace, Storage};

/// Handle on one collection. Cheap to clone; all state lives in the storage backend.
#[derive(Clone)]
pub struct Collection {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) ns: Namespace,
    pub(crate) options: QueryOptions,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("ns", &self.ns).finish_non_exhaustive()
    }
}

impl Collection {
    pub(crate) fn new(storage: Arc<dyn Storage>, ns: Namespace, options: QueryOptions) -> Self {
        Self { storage, ns, options }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.ns.collection
    }

    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }
}
