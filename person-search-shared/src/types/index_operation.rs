//! Queued index operations.

use serde_json::Value;

use super::person_document::PersonDocument;

/// Kind of an index operation, used for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Upsert,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Upsert => write!(f, "upsert"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// A unit of work for the search index.
///
/// Operations are immutable once built. They are submitted in insertion order and are
/// never coalesced: two upserts for the same reference both reach the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOperation {
    /// Index (create or replace) the document stored under `reference`.
    Upsert { reference: String, document: Value },
    /// Remove the document stored under `reference`.
    Delete { reference: String },
}

impl IndexOperation {
    /// Build an upsert operation from an already serialized document.
    pub fn upsert(reference: impl Into<String>, document: Value) -> Self {
        Self::Upsert {
            reference: reference.into(),
            document,
        }
    }

    /// Serialize `document` and build the upsert operation for it.
    ///
    /// Returns `None` when the underlying person has no id yet, and an error when the
    /// document cannot be serialized.
    pub fn from_document(document: &PersonDocument) -> Result<Option<Self>, serde_json::Error> {
        let Some(reference) = document.document_id() else {
            return Ok(None);
        };
        let payload = serde_json::to_value(document)?;
        Ok(Some(Self::upsert(reference, payload)))
    }

    /// Build a delete operation.
    pub fn delete(reference: impl Into<String>) -> Self {
        Self::Delete {
            reference: reference.into(),
        }
    }

    /// The document id this operation targets.
    pub fn reference(&self) -> &str {
        match self {
            IndexOperation::Upsert { reference, .. } | IndexOperation::Delete { reference } => {
                reference
            }
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            IndexOperation::Upsert { .. } => OperationKind::Upsert,
            IndexOperation::Delete { .. } => OperationKind::Delete,
        }
    }
}
