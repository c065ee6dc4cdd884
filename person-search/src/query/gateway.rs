//! Submission of structured searches to the search backend.

use std::sync::Arc;

use person_search_repository::{SearchIndexError, SearchIndexProvider};
use person_search_shared::{Aggregation, QueryClause, SearchRequest, SearchResponse};
use tracing::{debug, instrument};

use super::{build_advanced_query, build_simple_query, default_aggregations};

/// Validates queries, attaches the aggregation plan and submits them.
pub struct SearchGateway {
    provider: Arc<dyn SearchIndexProvider>,
    aggregations: Vec<Aggregation>,
}

impl SearchGateway {
    /// Create a gateway attaching [`default_aggregations`] to every search.
    pub fn new(provider: Arc<dyn SearchIndexProvider>) -> Self {
        Self::with_aggregations(provider, default_aggregations())
    }

    pub fn with_aggregations(
        provider: Arc<dyn SearchIndexProvider>,
        aggregations: Vec<Aggregation>,
    ) -> Self {
        Self {
            provider,
            aggregations,
        }
    }

    /// Run `query` and return one page of hits with the aggregation results.
    ///
    /// `total` in the response counts every match, not just the returned page. A query
    /// that fails validation is rejected with a query error before reaching the backend.
    #[instrument(skip(self, query))]
    pub async fn search(
        &self,
        query: QueryClause,
        from: usize,
        size: usize,
    ) -> Result<SearchResponse, SearchIndexError> {
        let request = SearchRequest::new(query)
            .with_page(from, size)
            .with_aggregations(self.aggregations.clone());
        request.validate().map_err(SearchIndexError::query)?;

        let response = self.provider.search(&request).await?;
        debug!(
            total = response.total,
            hits = response.len(),
            took_ms = response.took_ms,
            "Search completed"
        );
        Ok(response)
    }

    /// Free-text search over the full-text and name fields.
    pub async fn search_text(
        &self,
        text: Option<&str>,
        from: usize,
        size: usize,
    ) -> Result<SearchResponse, SearchIndexError> {
        self.search(build_simple_query(text), from, size).await
    }

    /// Prefix search on name, country and city.
    pub async fn advanced_search(
        &self,
        name: Option<&str>,
        country: Option<&str>,
        city: Option<&str>,
        from: usize,
        size: usize,
    ) -> Result<SearchResponse, SearchIndexError> {
        self.search(build_advanced_query(name, country, city), from, size)
            .await
    }
}
