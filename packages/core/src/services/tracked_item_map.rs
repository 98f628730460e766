//! Tracked Item Map Service
//!
//! Store wiring for the game-tracking item variant. Items are flat (no
//! hierarchy, no recurrence); the only policy is a name-to-ID index kept
//! fresh so callers can reach an item's reactive handle by its name.

use crate::api::{DashboardRequest, DocumentPayload, GetFlags};
use crate::db::{CacheError, LocalCache};
use crate::models::{DocumentMap, TrackedItem};
use crate::store::{
    DocumentBatch, DocumentMapStore, DocumentStore, StorePersistence, StorePolicy,
};
use crate::sync::RequestQueue;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub const TRACKED_ITEM_MAP_CACHE_KEY: &str = "trackedItemMap";

struct ItemNameIndexPolicy {
    index: Arc<Mutex<HashMap<String, String>>>,
}

impl StorePolicy<TrackedItem> for ItemNameIndexPolicy {
    fn name(&self) -> &'static str {
        "item-name-index"
    }

    fn after_map_set(
        &self,
        map: &DocumentMap<TrackedItem>,
        _effects: &mut crate::store::StoreEffects<TrackedItem>,
    ) {
        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        index.clear();
        for item in map.values() {
            index.insert(item.item_name.clone(), item.id.clone());
        }
    }

    fn after_doc_addition(&self, _map: &DocumentMap<TrackedItem>, new_doc: &TrackedItem) {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(new_doc.item_name.clone(), new_doc.id.clone());
    }
}

struct TrackedItemPersistence {
    cache: Arc<LocalCache>,
    queue: Arc<RequestQueue>,
}

#[async_trait]
impl StorePersistence<TrackedItem> for TrackedItemPersistence {
    async fn write_cache(&self, map: &DocumentMap<TrackedItem>) -> Result<(), CacheError> {
        let payload = serde_json::to_string(map)?;
        self.cache.set(TRACKED_ITEM_MAP_CACHE_KEY, &payload).await
    }

    async fn read_cache(&self) -> Result<Option<DocumentMap<TrackedItem>>, CacheError> {
        match self.cache.get(TRACKED_ITEM_MAP_CACHE_KEY).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn persist_remote(&self, batch: DocumentBatch<TrackedItem>) {
        if batch.is_empty() {
            return;
        }
        let DocumentBatch {
            insert,
            update,
            delete,
        } = batch;
        let request = DashboardRequest {
            get: Some(GetFlags::tracked_items()),
            insert: (!insert.is_empty()).then(|| DocumentPayload {
                tracked_items: Some(insert),
                ..Default::default()
            }),
            update: (!update.is_empty()).then(|| DocumentPayload {
                tracked_items: Some(update),
                ..Default::default()
            }),
            delete: (!delete.is_empty()).then(|| DocumentPayload {
                tracked_items: Some(delete),
                ..Default::default()
            }),
        };
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            queue.submit(request).await;
        });
    }
}

pub struct TrackedItemMapService {
    store: Arc<DocumentMapStore<TrackedItem>>,
    name_to_id: Arc<Mutex<HashMap<String, String>>>,
}

impl TrackedItemMapService {
    pub fn new(cache: Arc<LocalCache>, queue: Arc<RequestQueue>) -> Arc<Self> {
        let name_to_id = Arc::new(Mutex::new(HashMap::new()));
        let policies: Vec<Arc<dyn StorePolicy<TrackedItem>>> = vec![Arc::new(ItemNameIndexPolicy {
            index: Arc::clone(&name_to_id),
        })];
        let persistence = Arc::new(TrackedItemPersistence { cache, queue });
        Arc::new(Self {
            store: DocumentMapStore::new(policies, persistence),
            name_to_id,
        })
    }

    pub fn store(&self) -> &Arc<DocumentMapStore<TrackedItem>> {
        &self.store
    }

    pub fn get_map(&self) -> DocumentMap<TrackedItem> {
        self.store.get_map()
    }

    pub fn item_store(&self, item_id: &str) -> DocumentStore<TrackedItem> {
        self.store.doc_store(item_id)
    }

    pub fn item_id_by_name(&self, item_name: &str) -> Option<String> {
        self.name_to_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(item_name)
            .cloned()
    }

    /// Reactive handle for the item with the provided name, if one exists.
    pub fn item_store_by_name(&self, item_name: &str) -> Option<DocumentStore<TrackedItem>> {
        match self.item_id_by_name(item_name) {
            Some(item_id) => Some(self.store.doc_store(&item_id)),
            None => {
                tracing::error!(item_name, "no tracked item with that name");
                None
            }
        }
    }
}
