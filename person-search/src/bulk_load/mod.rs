//! Bulk import of persons through the sync service.
//!
//! Progress lives in an explicit [`LoadProgress`] handle owned by the caller, so a
//! reporter task can watch a load while it runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{future, Stream, StreamExt};
use person_search_shared::Person;
use tracing::{info, instrument, warn};

use crate::sync::IndexSyncService;

/// Default number of saves in flight at once.
pub const DEFAULT_LOAD_CONCURRENCY: usize = 8;

/// Configuration for the bulk loader.
#[derive(Debug, Clone)]
pub struct BulkLoaderConfig {
    /// Maximum number of concurrent saves. Each holds one store transaction.
    pub concurrency: usize,
}

impl Default for BulkLoaderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_LOAD_CONCURRENCY,
        }
    }
}

/// Counters of a running or finished load.
#[derive(Debug)]
pub struct LoadProgress {
    loaded: AtomicU64,
    skipped: AtomicU64,
    started: Instant,
}

impl Default for LoadProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadProgress {
    /// Start a new progress clock.
    pub fn new() -> Self {
        Self {
            loaded: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_loaded(&self) {
        self.loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn loaded(&self) -> u64 {
        self.loaded.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Current totals and the overall rate since the clock started.
    pub fn snapshot(&self) -> LoadReport {
        let took = self.started.elapsed();
        let count = self.loaded();
        let secs = took.as_secs_f64();
        LoadReport {
            count,
            skipped: self.skipped(),
            took,
            rate_per_second: if secs > 0.0 { count as f64 / secs } else { 0.0 },
        }
    }
}

/// Point-in-time view of a load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadReport {
    /// Persons saved.
    pub count: u64,
    /// Persons whose save failed.
    pub skipped: u64,
    pub took: Duration,
    pub rate_per_second: f64,
}

/// Saves a stream of persons with bounded concurrency.
pub struct BulkLoader {
    service: Arc<IndexSyncService>,
    config: BulkLoaderConfig,
}

impl BulkLoader {
    pub fn new(service: Arc<IndexSyncService>) -> Self {
        Self::with_config(service, BulkLoaderConfig::default())
    }

    pub fn with_config(service: Arc<IndexSyncService>, config: BulkLoaderConfig) -> Self {
        Self { service, config }
    }

    /// Save every person of `persons`, recording each outcome in `progress`.
    ///
    /// A failed save is logged and counted as skipped; the load goes on. Index updates
    /// are only enqueued here: close or flush the indexer to ship the tail.
    #[instrument(skip_all)]
    pub async fn load<S>(&self, persons: S, progress: &LoadProgress) -> LoadReport
    where
        S: Stream<Item = Person>,
    {
        let service = &self.service;

        persons
            .map(|person| async move {
                let result = service.save(&person).await;
                (person, result)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .for_each(|(person, result)| {
                match result {
                    Ok(_) => progress.record_loaded(),
                    Err(e) => {
                        warn!(
                            name = ?person.name,
                            error = %e,
                            "Failed to save person, skipping"
                        );
                        progress.record_skipped();
                    }
                }
                future::ready(())
            })
            .await;

        let report = progress.snapshot();
        info!(
            count = report.count,
            skipped = report.skipped,
            took_ms = report.took.as_millis() as u64,
            rate_per_second = format!("{:.2}", report.rate_per_second),
            "Bulk load finished"
        );
        report
    }
}
