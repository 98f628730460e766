//! Application Context
//!
//! Explicit owner of one store per document variant plus everything they
//! share: the local cache, the outbound queue, the sync service, the
//! recurrence engine, the clock, and the visibility flag. Consumers receive
//! the context (or pieces of it) instead of reaching for hidden globals;
//! there is exactly one instance per running app.
//!
//! # Startup Sequence
//!
//! 1. Open the local cache (flips the ready signal).
//! 2. Wire queue, stores, and the response applier.
//! 3. Hydrate every store from the cache mirror once ready, preferring
//!    cache contents over the cold-start empty maps.
//! 4. Resume any outbound batches a previous session left queued.
//!
//! The first authoritative fetch (`sync.fetch_initial_data`) is the UI
//! shell's call to make once login state allows it.

use crate::api::{ApiData, DashboardApi};
use crate::db::LocalCache;
use crate::models::{map_from_docs, Task, TrackedItem, UpgradeRecord};
use crate::services::{
    RecurrenceService, TaskMapService, TaskTagsService, TrackedItemMapService, UpgradeMapService,
    UserSettingsStore,
};
use crate::store::DocumentMapStore;
use crate::sync::{RequestQueue, ResponseApplier, SyncService};
use crate::time::{AppVisibility, MinuteClock};
use anyhow::Context as _;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Construction parameters for [`AppContext`].
pub struct AppContextConfig {
    /// Path of the local cache database file.
    pub cache_path: PathBuf,
    /// Remote API implementation (HTTP in production, scripted in tests).
    pub api: Arc<dyn DashboardApi>,
}

/// Applies combined/fetched response data to the reactive stores.
struct StoreResponseApplier {
    tasks: Arc<DocumentMapStore<Task>>,
    tracked_items: Arc<DocumentMapStore<TrackedItem>>,
    upgrades: Arc<DocumentMapStore<UpgradeRecord>>,
    settings: Arc<UserSettingsStore>,
}

#[async_trait]
impl ResponseApplier for StoreResponseApplier {
    async fn apply_response_data(&self, data: ApiData) {
        if let Some(config) = data.user_config {
            self.settings.set_local(config).await;
        }
        if let Some(tasks) = data.tasks {
            self.tasks.set(map_from_docs(tasks)).await;
        }
        if let Some(items) = data.tracked_items {
            self.tracked_items.set(map_from_docs(items)).await;
        }
        if let Some(upgrades) = data.upgrades {
            self.upgrades.set(map_from_docs(upgrades)).await;
        }
    }
}

/// One instance per running app; owns every store and shared service.
pub struct AppContext {
    pub cache: Arc<LocalCache>,
    pub api: Arc<dyn DashboardApi>,
    pub queue: Arc<RequestQueue>,
    pub settings: Arc<UserSettingsStore>,
    pub sync: Arc<SyncService>,
    pub tasks: Arc<TaskMapService>,
    pub tracked_items: Arc<TrackedItemMapService>,
    pub upgrades: Arc<UpgradeMapService>,
    pub recurrence: Arc<RecurrenceService>,
    pub task_tags: Arc<TaskTagsService>,
    pub clock: MinuteClock,
    pub visibility: AppVisibility,
}

impl AppContext {
    /// Opens the cache and wires the full service graph. Spawns the clock
    /// ticker, the refresh listener, and the cache-hydration task.
    pub async fn initialize(config: AppContextConfig) -> anyhow::Result<Arc<Self>> {
        let cache = Arc::new(
            LocalCache::open(config.cache_path)
                .await
                .context("failed to open local cache")?,
        );
        let queue = RequestQueue::new(cache.clone(), config.api.clone());
        let settings = UserSettingsStore::new(cache.clone());
        let sync = SyncService::new(config.api.clone(), cache.clone(), settings.clone());

        let clock = MinuteClock::new();
        let visibility = AppVisibility::new(true);
        let recurrence = RecurrenceService::new(
            clock.subscribe(),
            visibility.clone(),
            sync.refresh_handle(),
        );
        let task_tags = TaskTagsService::new(settings.clone());
        let tasks = TaskMapService::new(
            cache.clone(),
            queue.clone(),
            recurrence.clone(),
            task_tags.clone(),
            settings.clone(),
        );
        let tracked_items = TrackedItemMapService::new(cache.clone(), queue.clone());
        let upgrades = UpgradeMapService::new(cache.clone(), queue.clone());

        let applier: Arc<dyn ResponseApplier> = Arc::new(StoreResponseApplier {
            tasks: tasks.store().clone(),
            tracked_items: tracked_items.store().clone(),
            upgrades: upgrades.store().clone(),
            settings: settings.clone(),
        });
        queue.set_applier(applier.clone());
        sync.set_applier(applier);

        sync.spawn_refresh_listener();
        clock.spawn_ticker();

        let context = Arc::new(Self {
            cache,
            api: config.api,
            queue,
            settings,
            sync,
            tasks,
            tracked_items,
            upgrades,
            recurrence,
            task_tags,
            clock,
            visibility,
        });
        context.spawn_cache_hydration();
        Ok(context)
    }

    /// Hydrates every store from the cache mirror once the cache signals
    /// ready, then resumes any batches a previous session left queued.
    fn spawn_cache_hydration(self: &Arc<Self>) -> JoinHandle<()> {
        let context = Arc::clone(self);
        tokio::spawn(async move {
            let mut ready = context.cache.ready();
            while !*ready.borrow() {
                if ready.changed().await.is_err() {
                    return;
                }
            }
            context.settings.hydrate_from_cache().await;
            context.tasks.store().hydrate_from_cache().await;
            context.tracked_items.store().hydrate_from_cache().await;
            context.upgrades.store().hydrate_from_cache().await;
            if context.queue.pending().await > 0 {
                tracing::info!("resuming outbound queue from previous session");
                context.queue.process().await;
            }
        })
    }
}
