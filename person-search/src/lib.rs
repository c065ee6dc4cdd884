//! # Person Search
//!
//! Keeps a primary person store and a full-text search index consistent, and turns
//! user search parameters into aggregated queries.
//!
//! ## Architecture
//!
//! Writes follow a store-first, index-later flow:
//!
//! 1. **Sync service**: persists each change in the primary store
//! 2. **Batch indexer**: buffers the matching index operations and ships them in bulk
//! 3. **Search gateway**: builds queries, attaches the aggregation plan and submits them
//! 4. **Bulk loader**: drives large imports through the sync service
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`indexer`]: Buffered bulk delivery to the search index
//! - [`sync`]: Store and index synchronization
//! - [`query`]: Query builders and the search gateway
//! - [`bulk_load`]: Bulk import with progress reporting
//! - [`errors`]: Error types

pub mod bulk_load;
pub mod config;
pub mod errors;
pub mod indexer;
pub mod query;
pub mod sync;

pub use bulk_load::{BulkLoader, LoadProgress, LoadReport};
pub use config::{Dependencies, Settings};
pub use errors::SyncError;
pub use indexer::{BatchIndexer, BatchIndexerConfig, IndexerState};
pub use query::{build_advanced_query, build_simple_query, SearchGateway};
pub use sync::IndexSyncService;
