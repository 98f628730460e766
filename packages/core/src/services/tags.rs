//! Tag Index Maintenance
//!
//! Maintains a derived reactive list of every distinct tag the current user
//! has in use across all tasks. The index recomputes with a full O(n) scan
//! whenever a per-user tag array's length changes on an update, after any
//! deletion that removed tags, and after every wholesale map set.
//!
//! Bulk tag operations (remove a tag everywhere, rename a tag everywhere)
//! live here too; they drive the store's `update_many` path and keep the
//! user's tag settings in step.

use crate::models::{DocumentMap, Task};
use crate::services::settings::UserSettingsStore;
use crate::store::{DocumentMapStore, StorePolicy};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Reactive index of the current user's task tags.
pub struct TaskTagsService {
    settings: Arc<UserSettingsStore>,
    tags_tx: watch::Sender<Vec<String>>,
}

impl TaskTagsService {
    pub fn new(settings: Arc<UserSettingsStore>) -> Arc<Self> {
        let (tags_tx, _) = watch::channel(Vec::new());
        Arc::new(Self { settings, tags_tx })
    }

    /// The hook bundle this service contributes to the task map store.
    pub fn policy(self: &Arc<Self>) -> Arc<dyn StorePolicy<Task>> {
        Arc::new(TagIndexPolicy {
            service: Arc::clone(self),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<String>> {
        self.tags_tx.subscribe()
    }

    pub fn current_tags(&self) -> Vec<String> {
        self.tags_tx.borrow().clone()
    }

    /// Rebuilds the index from the map. `overlay`, when present, stands in
    /// for the map entry with the same ID - used from the before-update
    /// hook where the candidate document is not committed yet.
    fn recompute(&self, map: &DocumentMap<Task>, overlay: Option<&Task>) {
        let user_id = self.settings.get().user_id;
        let mut tags: BTreeSet<String> = BTreeSet::new();
        for task in map.values() {
            let effective = match overlay {
                Some(candidate) if candidate.id == task.id => candidate,
                _ => task,
            };
            tags.extend(effective.tags_for_user(&user_id).iter().cloned());
        }
        let tags: Vec<String> = tags.into_iter().collect();
        self.tags_tx.send_if_modified(|current| {
            if *current == tags {
                false
            } else {
                *current = tags;
                true
            }
        });
    }

    /// Removes a tag from the user's settings and from every task carrying
    /// it. Driven from the global tag manager.
    pub async fn remove_tag_everywhere(&self, store: &DocumentMapStore<Task>, tag: &str) {
        let user_id = self.settings.get().user_id;
        let tag_owned = tag.to_string();
        self.settings
            .update_local(|mut config| {
                config.tag_settings.remove(&tag_owned);
                config
            })
            .await;

        let filter_user = user_id.clone();
        let filter_tag = tag.to_string();
        let update_user = user_id;
        let update_tag = tag.to_string();
        store
            .update_many(
                move |task: &Task| task.tags_for_user(&filter_user).contains(&filter_tag),
                move |mut task: Task| {
                    if let Some(user_tags) = task.tags.get_mut(&update_user) {
                        user_tags.retain(|t| t != &update_tag);
                    }
                    task
                },
            )
            .await;
    }

    /// Renames a tag in the user's settings and on every task carrying it.
    pub async fn rename_tag_everywhere(
        &self,
        store: &DocumentMapStore<Task>,
        old_tag: &str,
        new_tag: &str,
    ) {
        let user_id = self.settings.get().user_id;
        let old_owned = old_tag.to_string();
        let new_owned = new_tag.to_string();
        self.settings
            .update_local(move |mut config| {
                if let Some(setting) = config.tag_settings.remove(&old_owned) {
                    config.tag_settings.insert(new_owned, setting);
                }
                config
            })
            .await;

        let filter_user = user_id.clone();
        let filter_tag = old_tag.to_string();
        let update_user = user_id;
        let update_old = old_tag.to_string();
        let update_new = new_tag.to_string();
        store
            .update_many(
                move |task: &Task| task.tags_for_user(&filter_user).contains(&filter_tag),
                move |mut task: Task| {
                    if let Some(user_tags) = task.tags.get_mut(&update_user) {
                        for tag in user_tags.iter_mut() {
                            if tag == &update_old {
                                *tag = update_new.clone();
                            }
                        }
                    }
                    task
                },
            )
            .await;
    }
}

struct TagIndexPolicy {
    service: Arc<TaskTagsService>,
}

impl StorePolicy<Task> for TagIndexPolicy {
    fn name(&self) -> &'static str {
        "tag-index"
    }

    fn after_map_set(
        &self,
        map: &DocumentMap<Task>,
        _effects: &mut crate::store::StoreEffects<Task>,
    ) {
        self.service.recompute(map, None);
    }

    fn after_doc_addition(&self, map: &DocumentMap<Task>, new_doc: &Task) {
        let user_id = self.service.settings.get().user_id;
        if !new_doc.tags_for_user(&user_id).is_empty() {
            self.service.recompute(map, None);
        }
    }

    fn before_doc_update(
        &self,
        map: &DocumentMap<Task>,
        old_doc: Option<&Task>,
        new_doc: Task,
    ) -> Task {
        let user_id = self.service.settings.get().user_id;
        let old_len = old_doc.map(|o| o.tags_for_user(&user_id).len()).unwrap_or(0);
        if old_len != new_doc.tags_for_user(&user_id).len() {
            self.service.recompute(map, Some(&new_doc));
        }
        new_doc
    }

    fn after_doc_deletion(&self, map: &DocumentMap<Task>, removed: &[Task]) {
        let user_id = self.service.settings.get().user_id;
        if removed
            .iter()
            .any(|task| !task.tags_for_user(&user_id).is_empty())
        {
            self.service.recompute(map, None);
        }
    }
}
