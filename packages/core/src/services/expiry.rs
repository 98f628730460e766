//! Auto-Expiry Policy
//!
//! After every wholesale map set, completed, non-recurring, parentless
//! tasks owned by the current user fall out of the map once their
//! last-modified date ages past the user-configured retention window.
//! A window configured outside the 5-90 day bounds aborts the whole scan
//! for that cycle; nothing is deleted on bad configuration.

use crate::models::{DocumentMap, Task};
use crate::services::settings::UserSettingsStore;
use crate::store::{StoreEffects, StorePolicy};
use chrono::{Duration, Utc};
use std::sync::Arc;

pub struct AutoExpiryPolicy {
    settings: Arc<UserSettingsStore>,
}

impl AutoExpiryPolicy {
    pub fn new(settings: Arc<UserSettingsStore>) -> Self {
        Self { settings }
    }
}

impl StorePolicy<Task> for AutoExpiryPolicy {
    fn name(&self) -> &'static str {
        "auto-expiry"
    }

    fn after_map_set(&self, map: &DocumentMap<Task>, effects: &mut StoreEffects<Task>) {
        let config = self.settings.get();
        if !config.auto_task_deletion_days_in_bounds() {
            tracing::error!(
                user_id = %config.user_id,
                days = config.auto_task_deletion_days,
                "invalid autoTaskDeletionDays value; skipping auto-deletion scan"
            );
            return;
        }
        let threshold = Utc::now() - Duration::days(config.auto_task_deletion_days);
        let expired: Vec<String> = map
            .values()
            .filter(|task| {
                task.user_id == config.user_id
                    && task.completed
                    && task.parent_task_id.is_none()
                    && task.parent_recurring_task_info.is_none()
                    && task.recurrence_info.is_none()
                    && task.last_updated_date < threshold
            })
            .map(|task| task.id.clone())
            .collect();
        if !expired.is_empty() {
            tracing::info!(
                count = expired.len(),
                "deleting tasks past the auto-deletion window"
            );
            effects.delete_many(expired);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LocalCache;
    use crate::models::{map_from_docs, RecurrenceBasis, RecurrenceEffect, RecurrenceFrequency, RecurrenceInfo, UserConfig};
    use crate::store::test_support::task_store_with_policies;
    use crate::store::DocumentMapStore;
    use tempfile::TempDir;

    async fn expiry_fixture(
        deletion_days: i64,
    ) -> (Arc<DocumentMapStore<Task>>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(
            LocalCache::open(temp_dir.path().join("cache.db"))
                .await
                .unwrap(),
        );
        let settings = UserSettingsStore::new(cache);
        let mut config = UserConfig::new("user-1");
        config.auto_task_deletion_days = deletion_days;
        settings.set_local(config).await;
        let (store, _persistence) =
            task_store_with_policies(vec![Arc::new(AutoExpiryPolicy::new(settings))]);
        (store, temp_dir)
    }

    fn completed_task_aged(days_old: i64) -> Task {
        let mut task = Task::new("user-1", "done");
        task.completed = true;
        task.last_updated_date = Utc::now() - Duration::days(days_old);
        task
    }

    #[tokio::test]
    async fn test_expired_tasks_deleted_recent_retained() {
        let (store, _dir) = expiry_fixture(5).await;
        let old = completed_task_aged(7);
        let recent = completed_task_aged(1);
        let old_id = old.id.clone();
        let recent_id = recent.id.clone();

        store.set(map_from_docs(vec![old, recent])).await;

        assert!(store.get_doc(&old_id).is_none());
        assert!(store.get_doc(&recent_id).is_some());
    }

    #[tokio::test]
    async fn test_out_of_bounds_window_aborts_scan() {
        let (store, _dir) = expiry_fixture(3).await;
        let old = completed_task_aged(30);
        let old_id = old.id.clone();

        store.set(map_from_docs(vec![old])).await;

        // Invalid configuration deletes nothing.
        assert!(store.get_doc(&old_id).is_some());
    }

    #[tokio::test]
    async fn test_recurring_parented_and_foreign_tasks_exempt() {
        let (store, _dir) = expiry_fixture(5).await;

        let mut recurring = completed_task_aged(30);
        recurring.recurrence_info = Some(RecurrenceInfo {
            frequency: RecurrenceFrequency::EveryXDays { x: 1 },
            recurrence_basis: RecurrenceBasis::DueDate,
            recurrence_effect: RecurrenceEffect::RollOnCompletion,
        });
        let mut parented = completed_task_aged(30);
        parented.parent_task_id = Some(recurring.id.clone());
        let mut foreign = completed_task_aged(30);
        foreign.user_id = "someone-else".to_string();
        let mut incomplete = completed_task_aged(30);
        incomplete.completed = false;

        let ids: Vec<String> = [&recurring, &parented, &foreign, &incomplete]
            .iter()
            .map(|t| t.id.clone())
            .collect();
        store
            .set(map_from_docs(vec![recurring, parented, foreign, incomplete]))
            .await;

        for id in ids {
            assert!(store.get_doc(&id).is_some(), "{id} should be retained");
        }
    }
}
