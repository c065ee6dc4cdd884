//! Keeps the primary store and the search index in sync.
//!
//! Every write is made durable in the primary store first; the matching index operation
//! is then handed to the [`BatchIndexer`] and reaches the index on its next flush. Index
//! failures never fail a write.

use std::sync::Arc;

use person_search_repository::{PersonStore, SearchIndexError};
use person_search_shared::{IndexOperation, Person, PersonDocument};
use tracing::{debug, instrument, warn};

use crate::errors::SyncError;
use crate::indexer::BatchIndexer;

/// Per-person save, upsert, delete and lookup across the store and the index.
///
/// Each call runs in its own store transaction, released on every exit path: a
/// transaction that is dropped without commit is rolled back.
pub struct IndexSyncService {
    store: Arc<dyn PersonStore>,
    indexer: Arc<BatchIndexer>,
}

impl IndexSyncService {
    pub fn new(store: Arc<dyn PersonStore>, indexer: Arc<BatchIndexer>) -> Self {
        Self { store, indexer }
    }

    pub fn indexer(&self) -> &Arc<BatchIndexer> {
        &self.indexer
    }

    /// Look a person up by id. No index interaction.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<Person>, SyncError> {
        let mut tx = self.store.begin().await?;
        let person = tx.get(id).await?;
        tx.commit().await?;
        Ok(person)
    }

    /// Persist `person` and schedule its index update.
    ///
    /// Returns the persisted form, with the generated id for a new person. The index
    /// update is only enqueued once the transaction has committed, so a rolled-back write
    /// never reaches the index.
    #[instrument(skip(self, person), fields(person_id = ?person.id))]
    pub async fn save(&self, person: &Person) -> Result<Person, SyncError> {
        let mut tx = self.store.begin().await?;
        let persisted = tx.save(person).await?;
        tx.commit().await?;

        self.enqueue_upsert(&persisted);
        debug!(person_id = ?persisted.id, "Person saved");
        Ok(persisted)
    }

    /// Merge `partial` onto the stored person `id` and save the result.
    ///
    /// Fields set on `partial` win; unset fields keep their stored value. The merged record
    /// always keeps `id`. When no person `id` exists, `partial` is saved as-is.
    #[instrument(skip(self, partial))]
    pub async fn upsert(&self, id: i64, partial: &Person) -> Result<Person, SyncError> {
        match self.get(id).await? {
            Some(mut existing) => {
                existing.merge_from(partial);
                existing.id = Some(id);
                self.save(&existing).await
            }
            None => {
                debug!(person_id = id, "No stored person to merge onto, saving as new");
                self.save(partial).await
            }
        }
    }

    /// Delete person `id` from the store and schedule its removal from the index.
    ///
    /// Returns `Ok(false)` without touching the index when the person does not exist. The
    /// index delete is enqueued even when the store delete fails; the store error is then
    /// returned and the transaction rolled back.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<bool, SyncError> {
        let mut tx = self.store.begin().await?;

        let Some(person) = tx.get(id).await? else {
            tx.commit().await?;
            debug!(person_id = id, "Nothing to delete");
            return Ok(false);
        };

        let deleted = tx.delete(&person).await;
        self.indexer.enqueue(IndexOperation::delete(id.to_string()));

        if let Err(e) = deleted {
            warn!(person_id = id, error = %e, "Store delete failed");
            return Err(e.into());
        }

        tx.commit().await?;
        Ok(true)
    }

    fn enqueue_upsert(&self, person: &Person) {
        let document = PersonDocument::from_person(person);
        match IndexOperation::from_document(&document) {
            Ok(Some(operation)) => self.indexer.enqueue(operation),
            Ok(None) => {
                warn!("Persisted person has no id, index update skipped");
            }
            Err(e) => {
                let error = SearchIndexError::from(e);
                warn!(
                    person_id = ?person.id,
                    error = %error,
                    "Failed to build index document, index update skipped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::BatchIndexerConfig;
    use async_trait::async_trait;
    use person_search_repository::{
        BatchOperationSummary, InMemoryPersonStore, SearchIndexProvider,
    };
    use person_search_shared::{Address, OperationKind, SearchRequest, SearchResponse};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock search provider that records submitted operations.
    struct MockSearchProvider {
        operations: Mutex<Vec<IndexOperation>>,
    }

    impl MockSearchProvider {
        fn new() -> Self {
            Self {
                operations: Mutex::new(Vec::new()),
            }
        }

        fn operations(&self) -> Vec<IndexOperation> {
            self.operations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockSearchProvider {
        async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn bulk(
            &self,
            operations: &[IndexOperation],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            self.operations
                .lock()
                .unwrap()
                .extend(operations.iter().cloned());
            Ok(BatchOperationSummary::all_succeeded(operations))
        }

        async fn search(
            &self,
            _request: &SearchRequest,
        ) -> Result<SearchResponse, SearchIndexError> {
            Ok(SearchResponse::empty())
        }
    }

    fn service() -> (IndexSyncService, InMemoryPersonStore, Arc<MockSearchProvider>) {
        let store = InMemoryPersonStore::new();
        let provider = Arc::new(MockSearchProvider::new());
        let indexer = Arc::new(BatchIndexer::new(
            provider.clone(),
            BatchIndexerConfig::new(10_000, Duration::from_secs(3600)),
        ));
        (
            IndexSyncService::new(Arc::new(store.clone()), indexer),
            store,
            provider,
        )
    }

    #[tokio::test]
    async fn test_save_enqueues_upsert_with_document() {
        let (service, _store, provider) = service();

        let saved = service.save(&Person::named("Joe Smith")).await.unwrap();
        assert_eq!(saved.id, Some(1));
        assert_eq!(service.indexer().pending(), 1);

        service.indexer().flush().await.unwrap();
        let operations = provider.operations();
        assert_eq!(operations.len(), 1);
        match &operations[0] {
            IndexOperation::Upsert {
                reference,
                document,
            } => {
                assert_eq!(reference, "1");
                assert_eq!(document["name"], "Joe Smith");
                assert_eq!(document["fulltext"], "Joe Smith");
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_missing_enqueues_nothing() {
        let (service, store, _provider) = service();

        assert!(!service.delete(42).await.unwrap());
        assert_eq!(service.indexer().pending(), 0);
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_delete_existing() {
        let (service, store, _provider) = service();
        let saved = service.save(&Person::named("Joe")).await.unwrap();
        service.indexer().flush().await.unwrap();

        assert!(service.delete(saved.id.unwrap()).await.unwrap());

        assert!(store.is_empty());
        assert_eq!(service.indexer().pending(), 1);
        assert_eq!(service.get(saved.id.unwrap()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_failure_still_enqueues_index_delete() {
        let (service, store, provider) = service();
        let saved = service.save(&Person::named("Joe")).await.unwrap();
        service.indexer().flush().await.unwrap();
        store.set_fail_deletes(true);

        let result = service.delete(saved.id.unwrap()).await;

        assert!(matches!(result, Err(SyncError::Store(_))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.open_transactions(), 0);

        service.indexer().flush().await.unwrap();
        let last = provider.operations().pop().unwrap();
        assert_eq!(last.kind(), OperationKind::Delete);
        assert_eq!(last.reference(), "1");
    }

    #[tokio::test]
    async fn test_upsert_merges_onto_existing() {
        let (service, _store, _provider) = service();
        let existing = Person {
            name: Some("Joe Smith".to_string()),
            children: Some(2),
            address: Some(Address {
                country: Some("France".to_string()),
                city: Some("Paris".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let saved = service.save(&existing).await.unwrap();
        let id = saved.id.unwrap();

        let merged = service
            .upsert(id, &Person::named("Joe Bar"))
            .await
            .unwrap();

        assert_eq!(merged.id, Some(id));
        assert_eq!(merged.name.as_deref(), Some("Joe Bar"));
        assert_eq!(merged.children, Some(2));
        let address = merged.address.unwrap();
        assert_eq!(address.country.as_deref(), Some("France"));
        assert_eq!(address.city.as_deref(), Some("Paris"));
    }

    #[tokio::test]
    async fn test_upsert_missing_saves_partial() {
        let (service, store, _provider) = service();

        let saved = service.upsert(7, &Person::named("Fresh")).await.unwrap();

        assert_eq!(saved.name.as_deref(), Some("Fresh"));
        assert_eq!(store.len(), 1);
        assert_eq!(service.indexer().pending(), 1);
    }
}
