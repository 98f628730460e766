//! User Settings Store
//!
//! Reactive holder for the current user's [`UserConfig`], mirrored to the
//! local cache. Remote propagation of settings changes goes through
//! `SyncService::update_settings`; this store itself never talks to the
//! network (`set_local` is the "without propagation" path used when
//! applying backend responses and cache hydration).

use crate::db::LocalCache;
use crate::models::UserConfig;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

pub const USER_SETTINGS_CACHE_KEY: &str = "userSettings";

pub struct UserSettingsStore {
    cache: Arc<LocalCache>,
    state: Mutex<UserConfig>,
    tx: watch::Sender<UserConfig>,
}

impl UserSettingsStore {
    pub fn new(cache: Arc<LocalCache>) -> Arc<Self> {
        let initial = UserConfig::default();
        let (tx, _) = watch::channel(initial.clone());
        Arc::new(Self {
            cache,
            state: Mutex::new(initial),
            tx,
        })
    }

    pub fn get(&self) -> UserConfig {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UserConfig> {
        self.tx.subscribe()
    }

    /// Replaces the settings without propagating to the backend. Used when
    /// applying an authoritative response or hydrating from the cache.
    pub async fn set_local(&self, config: UserConfig) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            *state = config.clone();
        }
        self.tx.send_replace(config.clone());
        match serde_json::to_string(&config) {
            Ok(payload) => {
                if let Err(e) = self.cache.set(USER_SETTINGS_CACHE_KEY, &payload).await {
                    tracing::error!("failed to mirror user settings to local cache: {e}");
                }
            }
            Err(e) => tracing::error!("failed to serialize user settings: {e}"),
        }
    }

    /// Applies a local-only transformation to the settings.
    pub async fn update_local(&self, updater: impl FnOnce(UserConfig) -> UserConfig) {
        let updated = {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            updater(state.clone())
        };
        self.set_local(updated).await;
    }

    /// Loads settings from the cache mirror, if present. Returns whether a
    /// cached config was applied.
    pub async fn hydrate_from_cache(&self) -> bool {
        let payload = match self.cache.get(USER_SETTINGS_CACHE_KEY).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return false,
            Err(e) => {
                tracing::error!("failed to read user settings from local cache: {e}");
                return false;
            }
        };
        match serde_json::from_str::<UserConfig>(&payload) {
            Ok(config) => {
                {
                    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
                    *state = config.clone();
                }
                self.tx.send_replace(config);
                true
            }
            Err(e) => {
                tracing::error!("ignoring corrupt cached user settings: {e}");
                false
            }
        }
    }
}
