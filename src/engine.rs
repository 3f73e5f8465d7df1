//! Document matching and mutation engine.
//!
//! Everything here runs in memory against `bson::Document` values: field-path traversal,
//! filter compilation and evaluation, update application, projection and sort.

pub mod field_walker;
pub mod number;
pub mod project;
pub mod queries;
pub mod sort;
pub mod update;
pub mod value;
pub mod weighted;

use bson::Document;

pub use field_walker::{FieldPath, FieldWalker, MatchedIndex};
pub use project::{Projector, apply_projection, compile_projection};
pub use queries::{QueryFilter, QueryOptions, compile_filter};
pub use sort::{SortSpec, sort};
pub use update::{ArrayFilters, Updator, compile_update};
pub use weighted::Weighted;

/// A document that satisfied a filter, with the array positions the match went through.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub doc: Document,
    pub matched_index: MatchedIndex,
}

impl Match {
    /// A match with no positional information, as for upserted documents.
    #[must_use]
    pub fn bare(doc: Document) -> Self {
        Self { doc, matched_index: MatchedIndex::new() }
    }
}
