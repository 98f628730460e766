//! Shared test doubles for store-layer and policy tests.

use crate::db::CacheError;
use crate::models::{Document, DocumentMap, Task};
use crate::store::persistence::{DocumentBatch, StorePersistence};
use crate::store::policy::StorePolicy;
use crate::store::DocumentMapStore;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Records every batch handed to the remote side and optionally serves a
/// canned cache read. No real I/O.
pub(crate) struct RecordingPersistence<T> {
    pub batches: Mutex<Vec<DocumentBatch<T>>>,
    pub cache_writes: Mutex<usize>,
    pub cached_map: Mutex<Option<DocumentMap<T>>>,
}

impl<T> RecordingPersistence<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            cache_writes: Mutex::new(0),
            cached_map: Mutex::new(None),
        })
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn last_batch(&self) -> Option<DocumentBatch<T>>
    where
        T: Clone,
    {
        self.batches.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl<T: Document> StorePersistence<T> for RecordingPersistence<T> {
    async fn write_cache(&self, _map: &DocumentMap<T>) -> Result<(), CacheError> {
        *self.cache_writes.lock().unwrap() += 1;
        Ok(())
    }

    async fn read_cache(&self) -> Result<Option<DocumentMap<T>>, CacheError> {
        Ok(self.cached_map.lock().unwrap().clone())
    }

    async fn persist_remote(&self, batch: DocumentBatch<T>) {
        self.batches.lock().unwrap().push(batch);
    }
}

/// Task store with the provided policies and a recording persistence
/// double.
pub(crate) fn task_store_with_policies(
    policies: Vec<Arc<dyn StorePolicy<Task>>>,
) -> (Arc<DocumentMapStore<Task>>, Arc<RecordingPersistence<Task>>) {
    let persistence = RecordingPersistence::new();
    let store = DocumentMapStore::new(policies, persistence.clone());
    (store, persistence)
}

/// Task store with no policies attached.
pub(crate) fn plain_task_store() -> (Arc<DocumentMapStore<Task>>, Arc<RecordingPersistence<Task>>) {
    task_store_with_policies(Vec::new())
}
