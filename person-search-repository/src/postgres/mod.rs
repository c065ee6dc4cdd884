//! PostgreSQL implementation of the primary store.
//!
//! The schema lives in the crate's `migrations/` directory and is applied with
//! [`PostgresPersonStore::migrate`].

mod person_store;

pub use person_store::PostgresPersonStore;
