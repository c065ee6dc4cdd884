//! In-memory implementation of the primary store, used by tests and local runs.

mod person_store;

pub use person_store::InMemoryPersonStore;
