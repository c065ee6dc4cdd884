//! Interface definitions for the external collaborators of the sync core.
//!
//! This module defines the abstract `SearchIndexProvider` and `PersonStore` traits that
//! allow for dependency injection and swappable backend implementations.

mod person_store;
mod search_index_provider;

pub use person_store::{PersonStore, PersonTransaction};
pub use search_index_provider::SearchIndexProvider;
