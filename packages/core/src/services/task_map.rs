//! Task Map Service
//!
//! Wires the task document store together: the base policy (owner
//! inheritance, deletion cascade, subscription teardown), the recurrence,
//! tag-index, sharing, and auto-expiry policies in registration order, and
//! the persistence strategy mapping task batches onto the remote request
//! shape.

use crate::api::{DashboardRequest, DocumentPayload, GetFlags};
use crate::db::{CacheError, LocalCache};
use crate::models::{DocumentMap, Task};
use crate::operations::{self, TaskOperationError};
use crate::services::expiry::AutoExpiryPolicy;
use crate::services::recurrence::RecurrenceService;
use crate::services::settings::UserSettingsStore;
use crate::services::sharing::SharingPolicy;
use crate::services::tags::TaskTagsService;
use crate::store::{
    DocUpdater, DocumentBatch, DocumentMapStore, DocumentStore, StorePersistence, StorePolicy,
    UpsertManyInfo,
};
use crate::sync::RequestQueue;
use async_trait::async_trait;
use std::sync::Arc;

pub const TASK_MAP_CACHE_KEY: &str = "taskMap";

/// Base task policy: ownership inheritance on addition, the deletion
/// cascade over the descendant subtree, and recurrence-subscription
/// teardown before removal.
struct TaskBasePolicy {
    recurrence: Arc<RecurrenceService>,
}

impl StorePolicy<Task> for TaskBasePolicy {
    fn name(&self) -> &'static str {
        "task-base"
    }

    fn before_doc_addition(&self, map: &DocumentMap<Task>, mut new_doc: Task) -> Task {
        // A subtask belongs to its parent's owner.
        let parent_user = new_doc
            .parent_task_id
            .as_deref()
            .and_then(|parent_id| map.get(parent_id))
            .map(|parent| parent.user_id.clone());
        if let Some(parent_user) = parent_user {
            new_doc.user_id = parent_user;
        }
        new_doc
    }

    fn validate_doc_deletion(&self, map: &DocumentMap<Task>, doc: &Task) -> Vec<String> {
        operations::children_ids(&operations::all_tasks(map), std::slice::from_ref(&doc.id))
    }

    fn before_doc_deletion(&self, _map: &DocumentMap<Task>, doc: &Task) {
        self.recurrence.remove_time_subscription(&doc.id);
    }
}

/// Persistence strategy for the task variant.
struct TaskPersistence {
    cache: Arc<LocalCache>,
    queue: Arc<RequestQueue>,
}

#[async_trait]
impl StorePersistence<Task> for TaskPersistence {
    async fn write_cache(&self, map: &DocumentMap<Task>) -> Result<(), CacheError> {
        let payload = serde_json::to_string(map)?;
        self.cache.set(TASK_MAP_CACHE_KEY, &payload).await
    }

    async fn read_cache(&self) -> Result<Option<DocumentMap<Task>>, CacheError> {
        match self.cache.get(TASK_MAP_CACHE_KEY).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn persist_remote(&self, batch: DocumentBatch<Task>) {
        if batch.is_empty() {
            return;
        }
        let DocumentBatch {
            insert,
            update,
            delete,
        } = batch;
        let request = DashboardRequest {
            get: Some(GetFlags::tasks()),
            insert: (!insert.is_empty()).then(|| DocumentPayload {
                tasks: Some(insert),
                ..Default::default()
            }),
            update: (!update.is_empty()).then(|| DocumentPayload {
                tasks: Some(update),
                ..Default::default()
            }),
            delete: (!delete.is_empty()).then(|| DocumentPayload {
                tasks: Some(delete),
                ..Default::default()
            }),
        };
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            queue.submit(request).await;
        });
    }
}

/// The main task map service.
pub struct TaskMapService {
    store: Arc<DocumentMapStore<Task>>,
}

impl TaskMapService {
    pub fn new(
        cache: Arc<LocalCache>,
        queue: Arc<RequestQueue>,
        recurrence: Arc<RecurrenceService>,
        tags: Arc<TaskTagsService>,
        settings: Arc<UserSettingsStore>,
    ) -> Arc<Self> {
        let policies: Vec<Arc<dyn StorePolicy<Task>>> = vec![
            Arc::new(TaskBasePolicy {
                recurrence: Arc::clone(&recurrence),
            }),
            recurrence.policy(),
            tags.policy(),
            Arc::new(SharingPolicy),
            Arc::new(AutoExpiryPolicy::new(settings)),
        ];
        let persistence = Arc::new(TaskPersistence { cache, queue });
        Arc::new(Self {
            store: DocumentMapStore::new(policies, persistence),
        })
    }

    pub fn store(&self) -> &Arc<DocumentMapStore<Task>> {
        &self.store
    }

    pub fn get_map(&self) -> DocumentMap<Task> {
        self.store.get_map()
    }

    /// Reactive handle for one task.
    pub fn task_store(&self, task_id: &str) -> DocumentStore<Task> {
        self.store.doc_store(task_id)
    }

    /// Executes recurrence for the provided task if it is due.
    pub async fn execute_recurrence_if_needed(&self, task: &Task) {
        RecurrenceService::execute_recurrence_if_needed(task, &self.store.get_map(), &self.store)
            .await;
    }

    /// Executes recurrence for the provided task.
    pub async fn execute_recurrence_for_task(&self, task: &Task) {
        RecurrenceService::execute_recurrence_for_task(task, &self.store.get_map(), &self.store)
            .await;
    }

    /// Update descriptor covering a task and its whole descendant subtree.
    pub fn update_task_and_all_children_info(
        &self,
        task_id: &str,
        updater: impl Fn(Task) -> Task + Send + Sync + 'static,
    ) -> Result<UpsertManyInfo<Task>, TaskOperationError> {
        operations::update_task_and_all_children_info(&self.store.get_map(), task_id, updater)
    }

    /// Duplication descriptor for a task subtree.
    pub fn duplicate_task_update_info(
        &self,
        task_id: &str,
        new_task_updater: impl Fn(Task) -> Task,
        original_task_updater: Option<DocUpdater<Task>>,
    ) -> Result<UpsertManyInfo<Task>, TaskOperationError> {
        operations::duplicate_task_update_info(
            &self.store.get_map(),
            task_id,
            new_task_updater,
            original_task_updater,
        )
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "task_map_test.rs"]
mod task_map_test;
