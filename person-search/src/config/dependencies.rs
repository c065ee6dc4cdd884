//! Dependency initialization and wiring for the person search core.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::bulk_load::{BulkLoader, BulkLoaderConfig};
use crate::config::{ConnectionMode, Settings};
use crate::indexer::BatchIndexer;
use crate::query::SearchGateway;
use crate::sync::IndexSyncService;
use crate::SyncError;
use person_search_repository::opensearch::IndexConfig;
use person_search_repository::{
    InMemoryPersonStore, OpenSearchProvider, PersonStore, PostgresPersonStore,
    PostgresStoreConfig, SearchIndexError, SearchIndexProvider,
};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The batch indexer; close it before exiting to flush the tail.
    pub indexer: Arc<BatchIndexer>,
    pub sync_service: Arc<IndexSyncService>,
    pub gateway: SearchGateway,
    pub loader: BulkLoader,
}

impl Dependencies {
    /// Initialize all dependencies from `settings`.
    ///
    /// Connects to OpenSearch (retrying in retry mode), makes sure the index and its alias
    /// exist, opens the primary store and applies its migrations, then starts the indexer.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(SyncError)` - If initialization fails (OpenSearch only in fail-fast mode)
    pub async fn new(settings: &Settings) -> Result<Self, SyncError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            index_alias = %settings.index_alias,
            index_version = settings.index_version,
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            persistent_store = settings.database_url.is_some(),
            "Initializing dependencies"
        );

        let index_config = IndexConfig::new(settings.index_alias.clone(), settings.index_version);

        // Building the client does no I/O; only a malformed URL fails here, and retrying
        // would not fix it.
        let search_provider = OpenSearchProvider::new(&settings.opensearch_url, index_config)
            .await
            .map_err(|e| SyncError::config(format!("Invalid OpenSearch setup: {}", e)))?;

        // Ensure index and alias exist (validate and create if not exists). This is the
        // first round trip, so it is what waits for the backend in retry mode.
        retry_until_ready(
            settings.connection_mode,
            settings.retry_interval,
            &settings.opensearch_url,
            || search_provider.ensure_index_exists(),
        )
        .await?;

        info!("OpenSearch connection established");

        let store = Self::open_store(settings).await?;
        let provider: Arc<dyn SearchIndexProvider> = Arc::new(search_provider);

        let indexer = Arc::new(BatchIndexer::new(
            Arc::clone(&provider),
            settings.indexer.clone(),
        ));
        let sync_service = Arc::new(IndexSyncService::new(store, Arc::clone(&indexer)));
        let gateway = SearchGateway::new(provider);
        let loader = BulkLoader::with_config(
            Arc::clone(&sync_service),
            BulkLoaderConfig {
                concurrency: settings.load_concurrency,
            },
        );

        Ok(Self {
            indexer,
            sync_service,
            gateway,
            loader,
        })
    }

    /// Open the primary store: PostgreSQL when a URL is configured, memory otherwise.
    async fn open_store(settings: &Settings) -> Result<Arc<dyn PersonStore>, SyncError> {
        let Some(ref database_url) = settings.database_url else {
            warn!("DATABASE_URL not set, persons are kept in memory only");
            return Ok(Arc::new(InMemoryPersonStore::new()));
        };

        let mut config = PostgresStoreConfig::new(database_url.clone());
        if let Some(max_connections) = settings.database_max_connections {
            config = config.with_max_connections(max_connections);
        }

        let store = PostgresPersonStore::connect(&config).await?;
        store.migrate().await?;
        info!("PostgreSQL person store ready");

        Ok(Arc::new(store))
    }
}

/// Run `attempt` until it succeeds, sleeping `retry_interval` between failures in retry
/// mode. In fail-fast mode the first failure is returned.
async fn retry_until_ready<F, Fut>(
    mode: ConnectionMode,
    retry_interval: Duration,
    url: &str,
    mut attempt: F,
) -> Result<(), SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), SearchIndexError>>,
{
    loop {
        match attempt().await {
            Ok(()) => return Ok(()),
            Err(e) => match mode {
                ConnectionMode::FailFast => {
                    return Err(SyncError::config(format!(
                        "Failed to prepare OpenSearch index: {}",
                        e
                    )));
                }
                ConnectionMode::Retry => {
                    warn!(
                        opensearch_url = %url,
                        error = %e,
                        retry_interval_secs = retry_interval.as_secs(),
                        "OpenSearch not ready, retrying..."
                    );
                    sleep(retry_interval).await;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failing_twice(attempts: &AtomicUsize) -> Result<(), SearchIndexError> {
        if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(SearchIndexError::connection("connection refused"))
        } else {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_mode_waits_for_backend() {
        let attempts = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let result = retry_until_ready(
            ConnectionMode::Retry,
            Duration::from_secs(15),
            "http://localhost:9200",
            || std::future::ready(failing_twice(&attempts)),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_fail_fast_returns_first_error() {
        let attempts = AtomicUsize::new(0);

        let result = retry_until_ready(
            ConnectionMode::FailFast,
            Duration::from_secs(15),
            "http://localhost:9200",
            || std::future::ready(failing_twice(&attempts)),
        )
        .await;

        assert!(matches!(result, Err(SyncError::ConfigError(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_url_is_not_retried() {
        let vars: HashMap<&str, &str> = [
            ("OPENSEARCH_URL", "not a url"),
            ("OPENSEARCH_CONNECTION_MODE", "retry"),
        ]
        .into_iter()
        .collect();
        let settings =
            Settings::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        let result =
            tokio::time::timeout(Duration::from_secs(5), Dependencies::new(&settings)).await;

        assert!(matches!(result, Ok(Err(SyncError::ConfigError(_)))));
    }
}
