//! Error types for the person search core.

use person_search_repository::{SearchIndexError, StoreError};
use thiserror::Error;

/// Errors surfaced by the sync service, the search gateway and the loader binary.
///
/// Primary store failures always propagate. Index write failures never do: they are
/// absorbed by the batch indexer and reported to its listener, so `Index` only carries
/// query-side and startup failures.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Error from the primary store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error from the search index.
    #[error("Search index error: {0}")]
    Index(#[from] SearchIndexError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error reading input records.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the error came from the primary store.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
