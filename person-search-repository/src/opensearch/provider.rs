//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsAliasParts},
    BulkOperation, BulkParts, OpenSearch, SearchParts,
};
use person_search_shared::{IndexOperation, SearchRequest, SearchResponse};
use serde_json::Value;
use tracing::{debug, error, info, trace};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};
use crate::opensearch::query_dsl::render_search_body;
use crate::opensearch::response::{parse_bulk_response, parse_search_response};
use crate::types::BatchOperationSummary;

/// OpenSearch provider implementation.
///
/// Provides bulk indexing and aggregated full-text search using OpenSearch as the backend.
///
/// # Example
///
/// ```ignore
/// use person_search_repository::opensearch::{IndexConfig, OpenSearchProvider};
/// use person_search_shared::IndexOperation;
///
/// let config = IndexConfig::new("persons", 0);
/// let provider = OpenSearchProvider::new("http://localhost:9200", config).await?;
/// provider.ensure_index_exists().await?;
/// provider.bulk(&[IndexOperation::delete("42")]).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index configuration containing alias and version
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            alias = %index_config.alias,
            version = index_config.version,
            "Created OpenSearch provider"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Convert queued operations into bulk body lines.
    fn bulk_body(operations: &[IndexOperation]) -> Vec<BulkOperation<Value>> {
        operations
            .iter()
            .map(|operation| -> BulkOperation<Value> {
                match operation {
                    IndexOperation::Upsert {
                        reference,
                        document,
                    } => BulkOperation::index(document.clone())
                        .id(reference.as_str())
                        .into(),
                    IndexOperation::Delete { reference } => {
                        BulkOperation::delete(reference.as_str()).into()
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    /// Create the versioned index with its mappings and alias unless the alias already
    /// resolves to an index.
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        let alias = self.index_config.alias.as_str();

        let exists = self
            .client
            .indices()
            .exists_alias(IndicesExistsAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if exists.status_code().is_success() {
            debug!(alias = %alias, "Search index alias already exists");
            return Ok(());
        }

        let index_name = self.index_config.versioned_index_name();
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&index_name))
            .body(get_index_settings(alias))
            .send()
            .await
            .map_err(|e| SearchIndexError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Index creation failed");
            return Err(SearchIndexError::index_creation(format!(
                "Index creation failed with status {}: {}",
                status, error_body
            )));
        }

        info!(index = %index_name, alias = %alias, "Created search index");
        Ok(())
    }

    /// Submit every operation in a single `_bulk` request.
    ///
    /// An HTTP-level failure fails the whole batch; item-level failures are reported in
    /// the returned summary.
    async fn bulk(
        &self,
        operations: &[IndexOperation],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if operations.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(&self.index_config.alias))
            .body(Self::bulk_body(operations))
            .send()
            .await
            .map_err(|e| SearchIndexError::bulk_index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchIndexError::bulk_index(format!(
                "Bulk request failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = parse_bulk_response(operations, &body)?;
        debug!(
            total = summary.total,
            failed = summary.failed,
            "Bulk request executed"
        );
        Ok(summary)
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchIndexError> {
        let body = render_search_body(request);
        debug!(query = %body["query"], "OpenSearch query");

        let response = self
            .client
            .search(SearchParts::Index(&[self.index_config.alias.as_str()]))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Search request failed");
            return Err(SearchIndexError::query(format!(
                "Search failed with status {}: {}",
                status, error_body
            )));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        trace!(response = %raw, "OpenSearch response");

        let parsed = parse_search_response(request, &raw)?;
        debug!(total = parsed.total, hits = parsed.len(), "OpenSearch response");
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bulk_body_preserves_order() {
        let ops = vec![
            IndexOperation::upsert("1", json!({ "name": "Joe" })),
            IndexOperation::delete("1"),
            IndexOperation::upsert("1", json!({ "name": "Joe Bar" })),
        ];

        let body = OpenSearchProvider::bulk_body(&ops);

        assert_eq!(body.len(), 3);
    }

    #[test]
    fn test_bulk_body_empty() {
        assert!(OpenSearchProvider::bulk_body(&[]).is_empty());
    }
}
