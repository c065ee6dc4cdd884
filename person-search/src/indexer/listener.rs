//! Diagnostic hooks around each bulk request.

use person_search_repository::{BatchOperationSummary, SearchIndexError};
use person_search_shared::IndexOperation;
use tracing::{debug, error, warn};

/// Observer of bulk executions.
///
/// Hooks are called from the flushing task and must not block. They cannot influence the
/// flush: a failed batch is reported here and then dropped.
pub trait BulkListener: Send + Sync {
    /// Called right before a batch is submitted.
    fn before_bulk(&self, execution_id: u64, operations: &[IndexOperation]);

    /// Called when the backend answered. Individual items may still have failed.
    fn after_bulk(
        &self,
        execution_id: u64,
        operations: &[IndexOperation],
        summary: &BatchOperationSummary,
    );

    /// Called when the whole request failed.
    fn after_bulk_failure(
        &self,
        execution_id: u64,
        operations: &[IndexOperation],
        error: &SearchIndexError,
    );
}

/// Listener that logs every execution through `tracing`.
///
/// Failed and dropped items are logged one by one, at warning level or above, with their
/// kind and reference so they can be reconciled by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBulkListener;

impl BulkListener for TracingBulkListener {
    fn before_bulk(&self, execution_id: u64, operations: &[IndexOperation]) {
        debug!(
            execution_id = execution_id,
            count = operations.len(),
            "Submitting bulk request"
        );
    }

    fn after_bulk(
        &self,
        execution_id: u64,
        _operations: &[IndexOperation],
        summary: &BatchOperationSummary,
    ) {
        if summary.has_failures() {
            warn!(
                execution_id = execution_id,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Bulk request completed with some failures"
            );
            for result in summary.failures() {
                if let Some(ref err) = result.error {
                    error!(
                        execution_id = execution_id,
                        kind = %result.kind,
                        reference = %result.reference,
                        error = %err,
                        "Failed to apply index operation"
                    );
                }
            }
        } else {
            debug!(
                execution_id = execution_id,
                count = summary.succeeded,
                "Bulk request succeeded"
            );
        }
    }

    fn after_bulk_failure(
        &self,
        execution_id: u64,
        operations: &[IndexOperation],
        error: &SearchIndexError,
    ) {
        error!(
            execution_id = execution_id,
            count = operations.len(),
            error = %error,
            "Bulk request failed, operations dropped"
        );
        for operation in operations {
            warn!(
                execution_id = execution_id,
                kind = %operation.kind(),
                reference = %operation.reference(),
                "Dropped index operation"
            );
        }
    }
}
