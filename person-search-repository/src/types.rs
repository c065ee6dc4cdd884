//! Result types for bulk index operations.

use person_search_shared::{IndexOperation, OperationKind};

use crate::errors::SearchIndexError;

/// Result of a batch operation for a single item.
///
/// This struct represents the outcome of a single operation within a bulk request. It
/// indicates whether the operation succeeded and includes error details if it failed.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The document id the operation targeted.
    pub reference: String,
    /// Whether the operation was an upsert or a delete.
    pub kind: OperationKind,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<SearchIndexError>,
}

impl BatchOperationResult {
    pub fn succeeded(operation: &IndexOperation) -> Self {
        Self {
            reference: operation.reference().to_string(),
            kind: operation.kind(),
            success: true,
            error: None,
        }
    }

    pub fn failed(operation: &IndexOperation, error: SearchIndexError) -> Self {
        Self {
            reference: operation.reference().to_string(),
            kind: operation.kind(),
            success: false,
            error: Some(error),
        }
    }
}

/// Summary of a bulk request containing aggregate statistics and individual results.
///
/// A bulk request can partially fail; this summary lets callers report each failed item
/// with enough context (kind and reference) for manual reconciliation.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item, in submission order.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from per-item results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// A summary where every operation succeeded.
    pub fn all_succeeded(operations: &[IndexOperation]) -> Self {
        Self::from_results(
            operations
                .iter()
                .map(BatchOperationResult::succeeded)
                .collect(),
        )
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Iterate over the failed items.
    pub fn failures(&self) -> impl Iterator<Item = &BatchOperationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}
