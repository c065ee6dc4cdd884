//! Buffered bulk indexer.
//!
//! Index operations are appended to an in-memory buffer and shipped to the search backend
//! in a single bulk request, either when the buffer reaches the configured size or when
//! the flush interval has elapsed since the last flush.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use person_search_repository::{BatchOperationSummary, SearchIndexError, SearchIndexProvider};
use person_search_shared::IndexOperation;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn};

use super::listener::{BulkListener, TracingBulkListener};
use super::BatchIndexerConfig;

/// Observable state of the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerState {
    /// Nothing buffered and no request in flight.
    Idle,
    /// Operations are buffered and waiting for the next flush.
    Accumulating,
    /// A bulk request is in flight.
    Flushing,
}

/// Cumulative counters since the indexer was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerStats {
    /// Number of bulk requests submitted.
    pub batches: u64,
    /// Number of operations the backend accepted.
    pub operations_succeeded: u64,
    /// Number of operations rejected by the backend or lost with a failed request.
    pub operations_failed: u64,
    /// Number of bulk requests that failed as a whole.
    pub failed_batches: u64,
}

struct BatchBuffer {
    operations: Vec<IndexOperation>,
    last_flush: Instant,
}

#[derive(Default)]
struct Counters {
    batches: AtomicU64,
    operations_succeeded: AtomicU64,
    operations_failed: AtomicU64,
    failed_batches: AtomicU64,
}

struct Inner {
    provider: Arc<dyn SearchIndexProvider>,
    listener: Arc<dyn BulkListener>,
    config: BatchIndexerConfig,
    buffer: Mutex<BatchBuffer>,
    flush_requested: Notify,
    /// Held for the whole duration of a flush so at most one runs at a time.
    flush_guard: tokio::sync::Mutex<()>,
    flushing: AtomicBool,
    closed: AtomicBool,
    last_execution_id: AtomicU64,
    counters: Counters,
}

/// Buffers index operations and flushes them to the search backend in bulk.
///
/// `enqueue` never touches the network: it appends under a short lock and, when the
/// buffer reaches `bulk_actions`, wakes the background worker. The worker also flushes
/// once `flush_interval` has elapsed since the previous flush.
///
/// Delivery is at-most-once. A batch that fails is reported to the [`BulkListener`] and
/// dropped; nothing is retried or re-enqueued.
///
/// The worker runs on a spawned tokio task, so the indexer must be created from within a
/// tokio runtime.
pub struct BatchIndexer {
    inner: Arc<Inner>,
    shutdown_tx: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BatchIndexer {
    /// Create an indexer that logs bulk executions through `tracing`.
    pub fn new(provider: Arc<dyn SearchIndexProvider>, config: BatchIndexerConfig) -> Self {
        Self::with_listener(provider, config, Arc::new(TracingBulkListener))
    }

    /// Create an indexer reporting bulk executions to `listener`.
    pub fn with_listener(
        provider: Arc<dyn SearchIndexProvider>,
        config: BatchIndexerConfig,
        listener: Arc<dyn BulkListener>,
    ) -> Self {
        let inner = Arc::new(Inner {
            provider,
            listener,
            buffer: Mutex::new(BatchBuffer {
                operations: Vec::with_capacity(config.bulk_actions),
                last_flush: Instant::now(),
            }),
            config,
            flush_requested: Notify::new(),
            flush_guard: tokio::sync::Mutex::new(()),
            flushing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            last_execution_id: AtomicU64::new(0),
            counters: Counters::default(),
        });

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let worker = tokio::spawn(run_worker(Arc::clone(&inner), shutdown_rx));

        info!(
            bulk_actions = inner.config.bulk_actions,
            flush_interval_ms = inner.config.flush_interval.as_millis() as u64,
            "Batch indexer started"
        );

        Self {
            inner,
            shutdown_tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Append an operation to the buffer.
    ///
    /// Never blocks on I/O and never fails. Reaching the size threshold wakes the worker.
    pub fn enqueue(&self, operation: IndexOperation) {
        if self.inner.closed.load(Ordering::SeqCst) {
            warn!(
                kind = %operation.kind(),
                reference = %operation.reference(),
                "Indexer is closed, operation buffered until the next explicit flush"
            );
        }

        let buffered = {
            let mut buffer = self.inner.lock_buffer();
            buffer.operations.push(operation);
            buffer.operations.len()
        };

        if buffered >= self.inner.config.bulk_actions {
            self.inner.flush_requested.notify_one();
        }
    }

    /// Flush the buffer now.
    ///
    /// Waits for an in-flight flush to finish first, then submits everything buffered at
    /// that point. Returns the backend's summary, or the error of a failed request (which
    /// has already been reported to the listener).
    pub async fn flush(&self) -> Result<BatchOperationSummary, SearchIndexError> {
        self.inner.flush().await
    }

    /// Stop the worker and flush whatever is still buffered.
    ///
    /// Calling `close` again only flushes.
    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<BatchOperationSummary, SearchIndexError> {
        self.inner.closed.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "Batch indexer worker ended abnormally");
            }
        }

        let summary = self.inner.flush().await;
        let stats = self.stats();
        info!(
            batches = stats.batches,
            succeeded = stats.operations_succeeded,
            failed = stats.operations_failed,
            "Batch indexer closed"
        );
        summary
    }

    /// Number of operations waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.inner.lock_buffer().operations.len()
    }

    pub fn state(&self) -> IndexerState {
        if self.inner.flushing.load(Ordering::SeqCst) {
            IndexerState::Flushing
        } else if self.pending() > 0 {
            IndexerState::Accumulating
        } else {
            IndexerState::Idle
        }
    }

    pub fn stats(&self) -> IndexerStats {
        let counters = &self.inner.counters;
        IndexerStats {
            batches: counters.batches.load(Ordering::Relaxed),
            operations_succeeded: counters.operations_succeeded.load(Ordering::Relaxed),
            operations_failed: counters.operations_failed.load(Ordering::Relaxed),
            failed_batches: counters.failed_batches.load(Ordering::Relaxed),
        }
    }
}

impl Drop for BatchIndexer {
    fn drop(&mut self) {
        // Stops the worker; anything still buffered is lost unless `close` was called.
        let _ = self.shutdown_tx.send(());
    }
}

impl Inner {
    fn lock_buffer(&self) -> MutexGuard<'_, BatchBuffer> {
        // The buffer is only ever pushed to or swapped out, so it is consistent even if a
        // holder panicked.
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_deadline(&self) -> Instant {
        self.lock_buffer().last_flush + self.config.flush_interval
    }

    async fn flush(&self) -> Result<BatchOperationSummary, SearchIndexError> {
        let _guard = self.flush_guard.lock().await;

        let operations = {
            let mut buffer = self.lock_buffer();
            buffer.last_flush = Instant::now();
            std::mem::take(&mut buffer.operations)
        };

        if operations.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let execution_id = self.last_execution_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut in_flight = InFlight::start(self, execution_id, &operations);

        self.listener.before_bulk(execution_id, &operations);
        let result = self.provider.bulk(&operations).await;
        in_flight.finish();
        self.counters.batches.fetch_add(1, Ordering::Relaxed);

        match &result {
            Ok(summary) => {
                self.counters
                    .operations_succeeded
                    .fetch_add(summary.succeeded as u64, Ordering::Relaxed);
                // Items the backend never reported on count as failed too
                let failed = operations.len().saturating_sub(summary.succeeded);
                self.counters
                    .operations_failed
                    .fetch_add(failed as u64, Ordering::Relaxed);
                self.listener.after_bulk(execution_id, &operations, summary);
            }
            Err(e) => {
                self.counters.failed_batches.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .operations_failed
                    .fetch_add(operations.len() as u64, Ordering::Relaxed);
                self.listener
                    .after_bulk_failure(execution_id, &operations, e);
            }
        }

        drop(in_flight);
        result
    }
}

/// Marks a bulk request as in flight for as long as it lives.
///
/// If the flush future is dropped before the backend answered, the drained operations are
/// lost: they are reported to the listener as a failed batch and counted as such.
struct InFlight<'a> {
    inner: &'a Inner,
    execution_id: u64,
    operations: &'a [IndexOperation],
    answered: bool,
}

impl<'a> InFlight<'a> {
    fn start(inner: &'a Inner, execution_id: u64, operations: &'a [IndexOperation]) -> Self {
        inner.flushing.store(true, Ordering::SeqCst);
        Self {
            inner,
            execution_id,
            operations,
            answered: false,
        }
    }

    fn finish(&mut self) {
        self.answered = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.answered {
            let counters = &self.inner.counters;
            counters.batches.fetch_add(1, Ordering::Relaxed);
            counters.failed_batches.fetch_add(1, Ordering::Relaxed);
            counters
                .operations_failed
                .fetch_add(self.operations.len() as u64, Ordering::Relaxed);
            self.inner.listener.after_bulk_failure(
                self.execution_id,
                self.operations,
                &SearchIndexError::bulk_index("flush cancelled before the backend answered"),
            );
        }
        self.inner.flushing.store(false, Ordering::SeqCst);
    }
}

/// Background loop racing the size signal against the interval deadline.
async fn run_worker(inner: Arc<Inner>, mut shutdown_rx: broadcast::Receiver<()>) {
    debug!("Batch indexer worker running");

    loop {
        let deadline = inner.next_deadline();

        tokio::select! {
            _ = shutdown_rx.recv() => {
                break;
            }
            _ = inner.flush_requested.notified() => {
                let _ = inner.flush().await;
            }
            _ = sleep_until(deadline) => {
                // An explicit flush may have moved the deadline while we slept
                if Instant::now() >= inner.next_deadline() {
                    let _ = inner.flush().await;
                }
            }
        }
    }

    debug!("Batch indexer worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use person_search_shared::{SearchRequest, SearchResponse};
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Mock search provider recording every bulk request.
    ///
    /// The first request can be held open until the test releases it.
    struct MockSearchProvider {
        batches: Mutex<Vec<Vec<IndexOperation>>>,
        fail: AtomicBool,
        started: Mutex<Option<oneshot::Sender<()>>>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl MockSearchProvider {
        fn new() -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                started: Mutex::new(None),
                gate: Mutex::new(None),
            }
        }

        /// Hold the first bulk request until the returned sender fires.
        fn gated() -> (Self, oneshot::Receiver<()>, oneshot::Sender<()>) {
            let provider = Self::new();
            let (started_tx, started_rx) = oneshot::channel();
            let (release_tx, release_rx) = oneshot::channel();
            *provider.started.lock().unwrap() = Some(started_tx);
            *provider.gate.lock().unwrap() = Some(release_rx);
            (provider, started_rx, release_tx)
        }

        fn batches(&self) -> Vec<Vec<IndexOperation>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockSearchProvider {
        async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn bulk(
            &self,
            operations: &[IndexOperation],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            let started = self.started.lock().unwrap().take();
            if let Some(started) = started {
                let _ = started.send(());
            }
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }

            self.batches.lock().unwrap().push(operations.to_vec());
            if self.fail.load(Ordering::SeqCst) {
                return Err(SearchIndexError::bulk_index("backend unavailable"));
            }
            Ok(BatchOperationSummary::all_succeeded(operations))
        }

        async fn search(
            &self,
            _request: &SearchRequest,
        ) -> Result<SearchResponse, SearchIndexError> {
            Ok(SearchResponse::empty())
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl BulkListener for RecordingListener {
        fn before_bulk(&self, execution_id: u64, operations: &[IndexOperation]) {
            self.events
                .lock()
                .unwrap()
                .push(format!("before:{}:{}", execution_id, operations.len()));
        }

        fn after_bulk(
            &self,
            execution_id: u64,
            _operations: &[IndexOperation],
            summary: &BatchOperationSummary,
        ) {
            self.events
                .lock()
                .unwrap()
                .push(format!("after:{}:{}", execution_id, summary.succeeded));
        }

        fn after_bulk_failure(
            &self,
            execution_id: u64,
            operations: &[IndexOperation],
            _error: &SearchIndexError,
        ) {
            self.events
                .lock()
                .unwrap()
                .push(format!("failure:{}:{}", execution_id, operations.len()));
        }
    }

    fn upsert(id: i64) -> IndexOperation {
        IndexOperation::upsert(
            id.to_string(),
            json!({ "id": id, "name": format!("Person {}", id) }),
        )
    }

    fn quiet_config() -> BatchIndexerConfig {
        BatchIndexerConfig::new(10_000, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_flush_sends_one_batch() {
        let provider = Arc::new(MockSearchProvider::new());
        let indexer = BatchIndexer::new(provider.clone(), quiet_config());

        for id in 1..=5 {
            indexer.enqueue(upsert(id));
        }
        assert_eq!(indexer.pending(), 5);
        assert_eq!(indexer.state(), IndexerState::Accumulating);

        let summary = indexer.flush().await.unwrap();

        assert_eq!(summary.total, 5);
        let batches = provider.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 5);
        assert_eq!(batches[0][0], upsert(1));
        assert_eq!(indexer.pending(), 0);
        assert_eq!(indexer.state(), IndexerState::Idle);
    }

    #[tokio::test]
    async fn test_flush_of_empty_buffer_sends_nothing() {
        let provider = Arc::new(MockSearchProvider::new());
        let indexer = BatchIndexer::new(provider.clone(), quiet_config());

        let summary = indexer.flush().await.unwrap();

        assert_eq!(summary.total, 0);
        assert!(provider.batches().is_empty());
        assert_eq!(indexer.stats(), IndexerStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_triggers_flush_before_interval() {
        let provider = Arc::new(MockSearchProvider::new());
        let indexer = BatchIndexer::new(
            provider.clone(),
            BatchIndexerConfig::new(3, Duration::from_secs(5)),
        );
        let start = Instant::now();

        indexer.enqueue(upsert(1));
        indexer.enqueue(upsert(2));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(provider.batches().is_empty());

        indexer.enqueue(upsert(3));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let batches = provider.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_triggers_flush() {
        let provider = Arc::new(MockSearchProvider::new());
        let indexer = BatchIndexer::new(
            provider.clone(),
            BatchIndexerConfig::new(100, Duration::from_secs(5)),
        );

        indexer.enqueue(upsert(1));
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(provider.batches().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.batches().len(), 1);
        assert_eq!(indexer.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enqueue_during_flush_loses_nothing() {
        let (provider, started, release) = MockSearchProvider::gated();
        let provider = Arc::new(provider);
        let indexer = Arc::new(BatchIndexer::new(provider.clone(), quiet_config()));

        for id in 0..10 {
            indexer.enqueue(upsert(id));
        }
        let in_flight = {
            let indexer = Arc::clone(&indexer);
            tokio::spawn(async move { indexer.flush().await })
        };
        started.await.unwrap();
        assert_eq!(indexer.state(), IndexerState::Flushing);

        let handles: Vec<_> = (10..110)
            .map(|id| {
                let indexer = Arc::clone(&indexer);
                tokio::spawn(async move { indexer.enqueue(upsert(id)) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(indexer.pending(), 100);

        release.send(()).unwrap();
        let first = in_flight.await.unwrap().unwrap();
        let second = indexer.flush().await.unwrap();

        assert_eq!(first.total, 10);
        assert_eq!(second.total, 100);

        let references: Vec<String> = provider
            .batches()
            .iter()
            .flatten()
            .map(|op| op.reference().to_string())
            .collect();
        let unique: HashSet<&String> = references.iter().collect();
        assert_eq!(references.len(), 110);
        assert_eq!(unique.len(), 110);
    }

    #[tokio::test]
    async fn test_failed_batch_is_reported_and_dropped() {
        let provider = Arc::new(MockSearchProvider::new());
        provider.fail.store(true, Ordering::SeqCst);
        let listener = Arc::new(RecordingListener::default());
        let indexer =
            BatchIndexer::with_listener(provider.clone(), quiet_config(), listener.clone());

        indexer.enqueue(upsert(1));
        indexer.enqueue(IndexOperation::delete("2"));
        assert!(indexer.flush().await.is_err());

        // Not retried, not re-enqueued
        assert_eq!(indexer.pending(), 0);
        assert!(indexer.flush().await.is_ok());
        assert_eq!(provider.batches().len(), 1);

        let stats = indexer.stats();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.operations_failed, 2);
        assert_eq!(
            *listener.events.lock().unwrap(),
            vec!["before:1:2".to_string(), "failure:1:2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_listener_sees_increasing_execution_ids() {
        let provider = Arc::new(MockSearchProvider::new());
        let listener = Arc::new(RecordingListener::default());
        let indexer =
            BatchIndexer::with_listener(provider.clone(), quiet_config(), listener.clone());

        indexer.enqueue(upsert(1));
        indexer.flush().await.unwrap();
        indexer.enqueue(upsert(2));
        indexer.enqueue(upsert(3));
        indexer.flush().await.unwrap();

        assert_eq!(
            *listener.events.lock().unwrap(),
            vec![
                "before:1:1".to_string(),
                "after:1:1".to_string(),
                "before:2:2".to_string(),
                "after:2:2".to_string(),
            ]
        );
        assert_eq!(indexer.stats().operations_succeeded, 3);
    }

    #[tokio::test]
    async fn test_cancelled_flush_resets_state_and_reports_loss() {
        let (provider, _started, _release) = MockSearchProvider::gated();
        let provider = Arc::new(provider);
        let listener = Arc::new(RecordingListener::default());
        let indexer =
            BatchIndexer::with_listener(provider.clone(), quiet_config(), listener.clone());

        indexer.enqueue(upsert(1));
        let result = tokio::time::timeout(Duration::from_millis(50), indexer.flush()).await;

        assert!(result.is_err());
        assert_eq!(indexer.state(), IndexerState::Idle);
        assert_eq!(indexer.pending(), 0);
        let stats = indexer.stats();
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.operations_failed, 1);
        assert_eq!(
            *listener.events.lock().unwrap(),
            vec!["before:1:1".to_string(), "failure:1:1".to_string()]
        );

        // The next flush is not blocked by the abandoned one
        indexer.enqueue(upsert(2));
        assert_eq!(indexer.flush().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_close_flushes_remaining_operations() {
        let provider = Arc::new(MockSearchProvider::new());
        let indexer = BatchIndexer::new(provider.clone(), quiet_config());

        indexer.enqueue(upsert(1));
        indexer.enqueue(upsert(2));
        let summary = indexer.close().await.unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(provider.batches().len(), 1);
        assert_eq!(indexer.state(), IndexerState::Idle);

        // Still accepted after close, shipped by the next explicit flush
        indexer.enqueue(upsert(3));
        assert_eq!(indexer.pending(), 1);
        assert_eq!(indexer.close().await.unwrap().total, 1);
    }
}
