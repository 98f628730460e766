//! Upgrade Map Service
//!
//! Store wiring for the upgrade-record variant. Upgrades carry no policies
//! of their own; the store exists for identity, reactivity, caching, and
//! outbound persistence.

use crate::api::{DashboardRequest, DocumentPayload, GetFlags};
use crate::db::{CacheError, LocalCache};
use crate::models::{DocumentMap, UpgradeRecord};
use crate::store::{DocumentBatch, DocumentMapStore, DocumentStore, StorePersistence};
use crate::sync::RequestQueue;
use async_trait::async_trait;
use std::sync::Arc;

pub const UPGRADE_MAP_CACHE_KEY: &str = "upgradeMap";

struct UpgradePersistence {
    cache: Arc<LocalCache>,
    queue: Arc<RequestQueue>,
}

#[async_trait]
impl StorePersistence<UpgradeRecord> for UpgradePersistence {
    async fn write_cache(&self, map: &DocumentMap<UpgradeRecord>) -> Result<(), CacheError> {
        let payload = serde_json::to_string(map)?;
        self.cache.set(UPGRADE_MAP_CACHE_KEY, &payload).await
    }

    async fn read_cache(&self) -> Result<Option<DocumentMap<UpgradeRecord>>, CacheError> {
        match self.cache.get(UPGRADE_MAP_CACHE_KEY).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn persist_remote(&self, batch: DocumentBatch<UpgradeRecord>) {
        if batch.is_empty() {
            return;
        }
        let DocumentBatch {
            insert,
            update,
            delete,
        } = batch;
        let request = DashboardRequest {
            get: Some(GetFlags::upgrades()),
            insert: (!insert.is_empty()).then(|| DocumentPayload {
                upgrades: Some(insert),
                ..Default::default()
            }),
            update: (!update.is_empty()).then(|| DocumentPayload {
                upgrades: Some(update),
                ..Default::default()
            }),
            delete: (!delete.is_empty()).then(|| DocumentPayload {
                upgrades: Some(delete),
                ..Default::default()
            }),
        };
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            queue.submit(request).await;
        });
    }
}

pub struct UpgradeMapService {
    store: Arc<DocumentMapStore<UpgradeRecord>>,
}

impl UpgradeMapService {
    pub fn new(cache: Arc<LocalCache>, queue: Arc<RequestQueue>) -> Arc<Self> {
        let persistence = Arc::new(UpgradePersistence { cache, queue });
        Arc::new(Self {
            store: DocumentMapStore::new(Vec::new(), persistence),
        })
    }

    pub fn store(&self) -> &Arc<DocumentMapStore<UpgradeRecord>> {
        &self.store
    }

    pub fn get_map(&self) -> DocumentMap<UpgradeRecord> {
        self.store.get_map()
    }

    pub fn upgrade_store(&self, upgrade_id: &str) -> DocumentStore<UpgradeRecord> {
        self.store.doc_store(upgrade_id)
    }
}
