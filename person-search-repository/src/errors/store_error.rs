//! Primary store error types.

use thiserror::Error;

/// Errors raised by the primary store while reading or writing persons.
///
/// These are always propagated to the caller of the sync service.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    /// The record cannot be written or read back as a person.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The transaction could not be used (e.g. its state was poisoned).
    #[error("Transaction error: {0}")]
    TransactionError(String),
}

impl StoreError {
    /// Create an invalid record error.
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a transaction error.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::TransactionError(msg.into())
    }
}
