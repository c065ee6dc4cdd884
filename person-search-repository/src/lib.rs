//! # Person Search Repository
//!
//! This crate provides traits and implementations for the two external collaborators of
//! the sync core: the primary person store and the search index. It includes definitions
//! for errors and interfaces, a PostgreSQL store, an in-memory store and a concrete
//! search index implementation for OpenSearch.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod postgres;
pub mod types;

pub use config::PostgresStoreConfig;
pub use errors::{SearchIndexError, StoreError};
pub use interfaces::{PersonStore, PersonTransaction, SearchIndexProvider};
pub use memory::InMemoryPersonStore;
pub use opensearch::{IndexConfig, OpenSearchProvider};
pub use postgres::PostgresPersonStore;
pub use types::{BatchOperationResult, BatchOperationSummary};
