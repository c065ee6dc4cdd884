//! # Person Search Shared
//!
//! This crate defines shared data structures used across the person search workspace.
//! It includes the `Person` record kept in the primary store, the `PersonDocument` form
//! that is indexed, the queued `IndexOperation`, and the backend-neutral query and
//! result types used by the search layer.

pub mod types;

pub use types::index_operation::{IndexOperation, OperationKind};
pub use types::person::{Address, GeoPoint, Person};
pub use types::person_document::PersonDocument;
pub use types::search_query::{
    Aggregation, HistogramInterval, QueryClause, SearchRequest, WeightedField,
};
pub use types::search_result::{AggregationResult, Bucket, SearchHit, SearchResponse};
