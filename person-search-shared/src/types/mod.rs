//! This module defines the core data structures used across the person search workspace.

pub mod index_operation;
pub mod person;
pub mod person_document;
pub mod search_query;
pub mod search_result;

pub use index_operation::IndexOperation;
pub use person::{Address, GeoPoint, Person};
pub use person_document::PersonDocument;
