//! Primary store trait definitions.
//!
//! The primary store is transactional. Every unit of work opens its own transaction with
//! [`PersonStore::begin`] and finishes it with [`PersonTransaction::commit`]. A transaction
//! that is dropped without being committed is rolled back and its resources are released,
//! so an early return or a `?` never leaks a transaction.

use async_trait::async_trait;
use person_search_shared::Person;

use crate::errors::StoreError;

/// Entry point to the primary store.
#[async_trait]
pub trait PersonStore: Send + Sync {
    /// Open a new transaction. Transactions are never shared between callers.
    async fn begin(&self) -> Result<Box<dyn PersonTransaction>, StoreError>;
}

/// An open primary-store transaction.
#[async_trait]
pub trait PersonTransaction: Send {
    /// Read a person by id.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Person))` - If the person exists
    /// * `Ok(None)` - If no person has this id
    async fn get(&mut self, id: i64) -> Result<Option<Person>, StoreError>;

    /// Insert or update a person.
    ///
    /// A person without an id is inserted and receives a generated id. A person with an id
    /// replaces the stored row with that id, or is inserted under it.
    ///
    /// # Returns
    ///
    /// The persisted form, carrying the store-assigned id.
    async fn save(&mut self, person: &Person) -> Result<Person, StoreError>;

    /// Delete a persisted person.
    async fn delete(&mut self, person: &Person) -> Result<(), StoreError>;

    /// Commit the transaction, consuming it.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
