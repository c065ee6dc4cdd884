//! Error types for the person search repository.
//!
//! `SearchIndexError` covers every search backend operation and `StoreError` covers the
//! primary store.

mod search_index_error;
mod store_error;

pub use search_index_error::SearchIndexError;
pub use store_error::StoreError;
