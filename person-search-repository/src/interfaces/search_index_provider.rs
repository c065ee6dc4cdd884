//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch, etc.).

use async_trait::async_trait;
use person_search_shared::{IndexOperation, SearchRequest, SearchResponse};

use crate::errors::SearchIndexError;
use crate::types::BatchOperationSummary;

/// Abstracts the underlying search index implementation (OpenSearch, Elasticsearch, etc.).
///
/// Implementations are injected into the batch indexer and the search gateway to enable
/// dependency injection and easy testing with mock implementations.
///
/// The backend is assumed to be eventually consistent: nothing written through `bulk` is
/// required to be visible to `search` immediately.
///
/// # Index Initialization
///
/// Implementations should call `ensure_index_exists` during application startup to ensure
/// the search index and any aliases are properly configured before performing document operations.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Ensure the search index and any required aliases exist, creating them if necessary.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index is ready for use
    /// * `Err(SearchIndexError)` - If initialization fails
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError>;

    /// Submit a batch of upsert and delete operations in a single request.
    ///
    /// Operations are applied in order. Deleting a document that does not exist is a
    /// success.
    ///
    /// # Arguments
    ///
    /// * `operations` - The operations to submit, in insertion order
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-item outcome; individual items may have failed
    /// * `Err(SearchIndexError)` - If the request failed as a whole
    async fn bulk(
        &self,
        operations: &[IndexOperation],
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Execute a query with its pagination window and aggregation plan in one round trip.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResponse)` - The page of hits, the total match count and the aggregations
    /// * `Err(SearchIndexError::QueryError)` - If the backend rejected the query
    /// * `Err(SearchIndexError)` - If the backend could not be reached or answered garbage
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchIndexError>;
}
