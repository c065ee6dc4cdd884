//! Batched delivery of index operations to the search backend.

mod batch_indexer;
mod listener;

use std::time::Duration;

pub use batch_indexer::{BatchIndexer, IndexerState, IndexerStats};
pub use listener::{BulkListener, TracingBulkListener};

/// Default number of buffered operations that triggers a flush.
pub const DEFAULT_BULK_ACTIONS: usize = 10_000;

/// Default maximum time between two flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for the batch indexer.
#[derive(Debug, Clone)]
pub struct BatchIndexerConfig {
    /// Number of buffered operations that triggers an immediate flush.
    pub bulk_actions: usize,
    /// Maximum time an operation waits in the buffer before being flushed.
    pub flush_interval: Duration,
}

impl Default for BatchIndexerConfig {
    fn default() -> Self {
        Self {
            bulk_actions: DEFAULT_BULK_ACTIONS,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl BatchIndexerConfig {
    /// Create a configuration.
    ///
    /// A zero threshold is raised to one and a zero interval to one millisecond.
    pub fn new(bulk_actions: usize, flush_interval: Duration) -> Self {
        Self {
            bulk_actions: bulk_actions.max(1),
            flush_interval: flush_interval.max(Duration::from_millis(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BatchIndexerConfig::default();
        assert_eq!(config.bulk_actions, 10_000);
        assert_eq!(config.flush_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_new_clamps_zero_values() {
        let config = BatchIndexerConfig::new(0, Duration::ZERO);
        assert_eq!(config.bulk_actions, 1);
        assert_eq!(config.flush_interval, Duration::from_millis(1));
    }
}
