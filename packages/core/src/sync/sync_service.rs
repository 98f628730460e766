//! Authoritative Refresh Service
//!
//! Owns the "pull everything from the backend" path: the initial data
//! fetch, the throttled re-fetch triggered when a recurrence comes due
//! while the app is visible, and the direct user-settings update call.
//!
//! A refresh is deliberately the only way timer-driven recurrence reaches
//! the network: acting on possibly-stale local data is avoided by fetching
//! authoritative state first and letting recurrence execute from the
//! subsequent map-set hook pass.

use crate::api::{DashboardApi, DashboardRequest, DashboardResponse, DocumentPayload, GetFlags};
use crate::db::LocalCache;
use crate::models::UserConfig;
use crate::services::settings::UserSettingsStore;
use crate::sync::request_queue::ResponseApplier;
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Minimum spacing between authoritative refreshes.
pub const SECONDS_TO_WAIT_BEFORE_REFETCH: u64 = 10;

pub struct SyncService {
    api: Arc<dyn DashboardApi>,
    cache: Arc<LocalCache>,
    settings: Arc<UserSettingsStore>,
    applier: OnceLock<Arc<dyn ResponseApplier>>,
    last_fetch: StdMutex<Option<Instant>>,
    refresh_tx: mpsc::UnboundedSender<()>,
    refresh_rx: StdMutex<Option<mpsc::UnboundedReceiver<()>>>,
}

impl SyncService {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        cache: Arc<LocalCache>,
        settings: Arc<UserSettingsStore>,
    ) -> Arc<Self> {
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            api,
            cache,
            settings,
            applier: OnceLock::new(),
            last_fetch: StdMutex::new(None),
            refresh_tx,
            refresh_rx: StdMutex::new(Some(refresh_rx)),
        })
    }

    /// Registers the applier that receives fetched data. Wired once at
    /// context construction.
    pub fn set_applier(&self, applier: Arc<dyn ResponseApplier>) {
        if self.applier.set(applier).is_err() {
            tracing::warn!("response applier already registered; ignoring replacement");
        }
    }

    /// Handle recurrence time-subscriptions use to request a refresh.
    pub fn refresh_handle(&self) -> mpsc::UnboundedSender<()> {
        self.refresh_tx.clone()
    }

    /// Spawns the task that serves queued refresh requests. Returns `None`
    /// if the listener was already spawned.
    pub fn spawn_refresh_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let rx = self
            .refresh_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        let service = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut rx = rx;
            while rx.recv().await.is_some() {
                service.fetch_initial_data_if_needed().await;
            }
        }))
    }

    /// Fetches authoritative state unless mutations are still queued or the
    /// last fetch was too recent.
    pub async fn fetch_initial_data_if_needed(&self) {
        match self.cache.queue_len().await {
            Ok(0) => {}
            Ok(pending) => {
                tracing::debug!(pending, "skipping refresh; outbound queue is not empty");
                return;
            }
            Err(e) => {
                tracing::error!("failed to read outbound queue length: {e}");
                return;
            }
        }
        let due = {
            let last_fetch = self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner);
            match *last_fetch {
                None => true,
                Some(at) => at.elapsed() >= Duration::from_secs(SECONDS_TO_WAIT_BEFORE_REFETCH),
            }
        };
        if due {
            tracing::info!(
                "fetching initial data; more than {} seconds since the last fetch",
                SECONDS_TO_WAIT_BEFORE_REFETCH
            );
            self.fetch_initial_data().await;
        }
    }

    /// Fetches every resource plus the user config and applies the result.
    /// Queued mutations are cleared - the fetched state supersedes them.
    ///
    /// Returns whether the data was successfully retrieved.
    pub async fn fetch_initial_data(&self) -> bool {
        {
            let mut last_fetch = self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner);
            *last_fetch = Some(Instant::now());
        }
        let request = DashboardRequest {
            get: Some(GetFlags::all()),
            ..Default::default()
        };
        match self.api.call(request).await {
            Ok(DashboardResponse {
                success: true,
                data: Some(data),
                ..
            }) => {
                if let Err(e) = self.cache.clear_queue().await {
                    tracing::error!("failed to clear outbound queue after refresh: {e}");
                }
                match self.applier.get() {
                    Some(applier) => applier.apply_response_data(data).await,
                    None => tracing::warn!("no response applier registered; dropping fetched data"),
                }
                tracing::info!("initial data retrieved successfully");
                true
            }
            Ok(response) => {
                tracing::error!(
                    errors = ?response.errors,
                    "error getting initial backend data"
                );
                false
            }
            Err(e) => {
                tracing::error!("error getting initial backend data: {e}");
                false
            }
        }
    }

    /// Pushes an updated user config to the backend and applies the
    /// returned config locally.
    pub async fn update_settings(&self, config: UserConfig) {
        let request = DashboardRequest {
            update: Some(DocumentPayload {
                user_config: Some(config),
                ..Default::default()
            }),
            ..Default::default()
        };
        match self.api.call(request).await {
            Ok(DashboardResponse {
                success: true,
                data: Some(data),
                ..
            }) if data.user_config.is_some() => {
                if let Some(refreshed) = data.user_config {
                    self.settings.set_local(refreshed).await;
                }
            }
            Ok(response) => {
                tracing::error!(errors = ?response.errors, "error updating settings");
            }
            Err(e) => {
                tracing::error!("error updating settings: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiData, ApiError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct CountingApi {
        calls: Mutex<usize>,
        data: ApiData,
    }

    impl CountingApi {
        fn new(data: ApiData) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(0),
                data,
            })
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl DashboardApi for CountingApi {
        async fn call(&self, _request: DashboardRequest) -> Result<DashboardResponse, ApiError> {
            *self.calls.lock().unwrap() += 1;
            Ok(DashboardResponse {
                success: true,
                data: Some(self.data.clone()),
                errors: Vec::new(),
            })
        }
    }

    struct RecordingApplier {
        applied: Mutex<Vec<ApiData>>,
    }

    #[async_trait]
    impl ResponseApplier for RecordingApplier {
        async fn apply_response_data(&self, data: ApiData) {
            self.applied.lock().unwrap().push(data);
        }
    }

    async fn service_with(
        api: Arc<dyn DashboardApi>,
    ) -> (Arc<SyncService>, Arc<LocalCache>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(
            LocalCache::open(temp_dir.path().join("cache.db"))
                .await
                .unwrap(),
        );
        let settings = UserSettingsStore::new(cache.clone());
        (
            SyncService::new(api, cache.clone(), settings),
            cache,
            temp_dir,
        )
    }

    #[tokio::test]
    async fn test_fetch_applies_data_and_clears_queue() {
        let data = ApiData {
            user_config: Some(UserConfig::new("user-1")),
            ..Default::default()
        };
        let api = CountingApi::new(data);
        let (service, cache, _dir) = service_with(api.clone()).await;
        let applier = Arc::new(RecordingApplier {
            applied: Mutex::new(Vec::new()),
        });
        service.set_applier(applier.clone());
        cache.enqueue("stale-batch").await.unwrap();

        assert!(service.fetch_initial_data().await);

        assert_eq!(api.call_count(), 1);
        assert_eq!(cache.queue_len().await.unwrap(), 0);
        assert_eq!(applier.applied.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_if_needed_skips_while_queue_pending() {
        let api = CountingApi::new(ApiData::default());
        let (service, cache, _dir) = service_with(api.clone()).await;
        cache.enqueue("pending").await.unwrap();

        service.fetch_initial_data_if_needed().await;
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_if_needed_throttles_back_to_back_fetches() {
        let data = ApiData {
            user_config: Some(UserConfig::new("user-1")),
            ..Default::default()
        };
        let api = CountingApi::new(data);
        let (service, _cache, _dir) = service_with(api.clone()).await;
        let applier = Arc::new(RecordingApplier {
            applied: Mutex::new(Vec::new()),
        });
        service.set_applier(applier);

        service.fetch_initial_data_if_needed().await;
        service.fetch_initial_data_if_needed().await;

        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_update_settings_applies_returned_config() {
        let mut returned = UserConfig::new("user-1");
        returned.auto_task_deletion_days = 42;
        let api = CountingApi::new(ApiData {
            user_config: Some(returned),
            ..Default::default()
        });
        let (service, _cache, _dir) = service_with(api).await;

        service.update_settings(UserConfig::new("user-1")).await;
        assert_eq!(service.settings.get().auto_task_deletion_days, 42);
    }
}
