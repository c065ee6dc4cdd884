//! In-memory implementation of the person store.
//!
//! Writes are staged per transaction and applied on commit; dropping a transaction
//! discards its staged writes. Ids are allocated from a shared sequence at save time, so
//! a rolled-back insert burns its id the way a database sequence would.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use person_search_shared::Person;

use crate::errors::StoreError;
use crate::interfaces::{PersonStore, PersonTransaction};

#[derive(Debug, Default)]
struct MemoryState {
    rows: BTreeMap<i64, Person>,
    last_id: i64,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MemoryState>,
    open_transactions: AtomicUsize,
    fail_deletes: AtomicBool,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::transaction("in-memory store state is poisoned"))
    }
}

/// A person store kept entirely in process memory.
///
/// Cloning the store yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPersonStore {
    shared: Arc<Shared>,
}

impl InMemoryPersonStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed persons.
    pub fn len(&self) -> usize {
        self.shared.lock().map(|s| s.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of transactions currently open (begun and neither committed nor dropped).
    pub fn open_transactions(&self) -> usize {
        self.shared.open_transactions.load(Ordering::SeqCst)
    }

    /// Make every subsequent delete fail, for exercising error paths.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.shared.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PersonStore for InMemoryPersonStore {
    async fn begin(&self) -> Result<Box<dyn PersonTransaction>, StoreError> {
        self.shared.open_transactions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            staged: BTreeMap::new(),
        }))
    }
}

/// Staged writes of one transaction. `None` marks a deletion.
struct InMemoryTransaction {
    shared: Arc<Shared>,
    staged: BTreeMap<i64, Option<Person>>,
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        self.shared.open_transactions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PersonTransaction for InMemoryTransaction {
    async fn get(&mut self, id: i64) -> Result<Option<Person>, StoreError> {
        if let Some(staged) = self.staged.get(&id) {
            return Ok(staged.clone());
        }
        Ok(self.shared.lock()?.rows.get(&id).cloned())
    }

    async fn save(&mut self, person: &Person) -> Result<Person, StoreError> {
        let id = {
            let mut state = self.shared.lock()?;
            match person.id {
                Some(id) => {
                    state.last_id = state.last_id.max(id);
                    id
                }
                None => {
                    state.last_id += 1;
                    state.last_id
                }
            }
        };

        let mut persisted = person.clone();
        persisted.id = Some(id);
        self.staged.insert(id, Some(persisted.clone()));
        Ok(persisted)
    }

    async fn delete(&mut self, person: &Person) -> Result<(), StoreError> {
        if self.shared.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::transaction("delete rejected by in-memory store"));
        }
        let id = person
            .id
            .ok_or_else(|| StoreError::invalid_record("cannot delete a person without id"))?;
        self.staged.insert(id, None);
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let staged = std::mem::take(&mut self.staged);
        let mut state = self.shared.lock()?;
        for (id, person) in staged {
            match person {
                Some(person) => {
                    state.rows.insert(id, person);
                }
                None => {
                    state.rows.remove(&id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_assigns_ids_and_commit_publishes() {
        let store = InMemoryPersonStore::new();

        let mut tx = store.begin().await.unwrap();
        let first = tx.save(&Person::named("Joe Smith")).await.unwrap();
        let second = tx.save(&Person::named("France Gall")).await.unwrap();
        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));

        // Not visible outside the transaction before commit
        assert!(store.is_empty());
        tx.commit().await.unwrap();
        assert_eq!(store.len(), 2);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get(1).await.unwrap(), Some(first));
        assert_eq!(tx.get(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_drop_rolls_back_and_releases() {
        let store = InMemoryPersonStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.save(&Person::named("Ghost")).await.unwrap();
            assert_eq!(store.open_transactions(), 1);
        }
        assert_eq!(store.open_transactions(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_staged() {
        let store = InMemoryPersonStore::new();
        let mut tx = store.begin().await.unwrap();
        let joe = tx.save(&Person::named("Joe")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.delete(&joe).await.unwrap();
        assert_eq!(tx.get(1).await.unwrap(), None);
        assert_eq!(store.len(), 1);
        tx.commit().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_id_advances_sequence() {
        let store = InMemoryPersonStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut person = Person::named("Explicit");
        person.id = Some(10);
        tx.save(&person).await.unwrap();
        let next = tx.save(&Person::named("Next")).await.unwrap();
        assert_eq!(next.id, Some(11));
    }

    #[tokio::test]
    async fn test_fail_deletes() {
        let store = InMemoryPersonStore::new();
        store.set_fail_deletes(true);
        let mut tx = store.begin().await.unwrap();
        let joe = tx.save(&Person::named("Joe")).await.unwrap();
        assert!(matches!(
            tx.delete(&joe).await,
            Err(StoreError::TransactionError(_))
        ));
    }
}
