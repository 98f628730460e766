//! Task Recurrence Engine
//!
//! Computes whether and when a recurring task should roll forward or
//! duplicate, mutates dates in place according to the frequency rule, and
//! maintains minute-clock wake subscriptions so due recurrences fire even
//! without user interaction.
//!
//! # Execution Path
//!
//! Recurrence only executes as a side effect of a map set: the
//! `after_map_set` hook scans for due roots and requests the roll-forward
//! upserts through the effects buffer. A timer firing never acts on local
//! data directly - if the app is visible it requests an authoritative
//! refresh, and the refreshed map set is what executes the recurrence.
//! Updates sent to the backend could otherwise be stale after the app sat
//! in the background for a long time.
//!
//! # Subscriptions
//!
//! At most one clock subscription exists per root recurring task. The
//! subscription is torn down before any replacement is installed and on
//! document deletion, so rebuilds cannot leak tasks.

use crate::models::{
    DocumentMap, ParentRecurringTaskInfo, RecurrenceBasis, RecurrenceEffect, RecurrenceFrequency,
    Task,
};
use crate::operations::{self, TaskOperationError};
use crate::store::{DocumentMapStore, StoreEffects, StorePolicy, UpsertManyInfo};
use crate::time::AppVisibility;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Recurrence computation and clock-subscription bookkeeping for the task
/// map.
pub struct RecurrenceService {
    clock: watch::Receiver<DateTime<Utc>>,
    visibility: AppVisibility,
    refresh_tx: mpsc::UnboundedSender<()>,
    subscriptions: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl RecurrenceService {
    pub fn new(
        clock: watch::Receiver<DateTime<Utc>>,
        visibility: AppVisibility,
        refresh_tx: mpsc::UnboundedSender<()>,
    ) -> Arc<Self> {
        Arc::new(Self {
            clock,
            visibility,
            refresh_tx,
            subscriptions: Mutex::new(HashMap::new()),
        })
    }

    /// The hook bundle this service contributes to the task map store.
    pub fn policy(self: &Arc<Self>) -> Arc<dyn StorePolicy<Task>> {
        Arc::new(RecurrencePolicy {
            service: Arc::clone(self),
        })
    }

    /// Whether the provided task should recur right now. Always false for
    /// recurrence children; they are handled by their root.
    pub fn task_should_recur(task: &Task) -> bool {
        let Some(info) = task.recurrence_info.as_ref() else {
            return false;
        };
        if task.parent_recurring_task_info.is_some() {
            return false;
        }
        if info.recurrence_effect == RecurrenceEffect::RollOnCompletion && task.completed {
            return true;
        }
        match Self::next_recurrence_date(task) {
            Some(next) => next < Utc::now(),
            None => false,
        }
    }

    /// The next calendar trigger for the task, or `None` for
    /// completion-driven recurrence and unset anchors.
    ///
    /// Recurrence children anchor on the dates snapshotted from their root
    /// at delegation time, not on their own dates.
    pub fn next_recurrence_date(task: &Task) -> Option<DateTime<Utc>> {
        let info = task.recurrence_info.as_ref()?;
        if info.recurrence_effect == RecurrenceEffect::RollOnCompletion {
            return None;
        }
        let anchor = match task.parent_recurring_task_info.as_ref() {
            Some(parent) => match info.recurrence_basis {
                RecurrenceBasis::StartDate => parent.start_date,
                RecurrenceBasis::DueDate => parent.due_date,
            },
            None => match info.recurrence_basis {
                RecurrenceBasis::StartDate => task.start_date,
                RecurrenceBasis::DueDate => task.due_date,
            },
        }?;
        Some(info.frequency.next_occurrence(anchor))
    }

    /// Next recurrence date the task would have after applying `updater` to
    /// a copy of it. The task itself is untouched; used to preview a
    /// recurrence edit before committing it.
    pub fn simulated_next_recurrence_date(
        task: &Task,
        updater: impl FnOnce(Task) -> Task,
    ) -> Option<DateTime<Utc>> {
        let preview = updater(task.clone());
        Self::next_recurrence_date(&preview)
    }

    /// Advances the task's dates by one frequency step in place. For
    /// non-stack effects, keeps stepping until the basis-relevant date is
    /// in the future, so a task untouched for months catches up instead of
    /// landing on a single stale past occurrence.
    pub fn roll_dates_forward(task: &mut Task) {
        let Some(info) = task.recurrence_info.clone() else {
            return;
        };
        Self::step_dates(task, &info.frequency);
        if info.recurrence_effect == RecurrenceEffect::Stack {
            return;
        }
        let now = Utc::now();
        loop {
            let basis = match info.recurrence_basis {
                RecurrenceBasis::StartDate => task.start_date,
                RecurrenceBasis::DueDate => task.due_date,
            };
            let Some(basis) = basis else {
                break;
            };
            if basis >= now {
                break;
            }
            Self::step_dates(task, &info.frequency);
            let stepped = match info.recurrence_basis {
                RecurrenceBasis::StartDate => task.start_date,
                RecurrenceBasis::DueDate => task.due_date,
            };
            if let Some(stepped) = stepped {
                if stepped <= basis {
                    tracing::error!(
                        task_id = %task.id,
                        "recurrence frequency does not advance dates; aborting catch-up"
                    );
                    break;
                }
            }
        }
    }

    fn step_dates(task: &mut Task, frequency: &RecurrenceFrequency) {
        task.start_date = task.start_date.map(|d| frequency.next_occurrence(d));
        task.due_date = task.due_date.map(|d| frequency.next_occurrence(d));
    }

    /// Builds the upsert descriptor that executes one recurrence for a root
    /// recurring task.
    ///
    /// - `Stack` effect on an incomplete root: the whole subtree is
    ///   duplicated (duplicates marked completed with advanced dates) and
    ///   the original subtree is stripped of recurrence ownership, so only
    ///   the newest instance carries it forward.
    /// - Everything else: the existing subtree's dates roll forward in
    ///   place and `completed` resets across it.
    ///
    /// # Errors
    ///
    /// [`TaskOperationError::NotRecurrenceRoot`] if the task has no
    /// recurrence descriptor or is itself a recurrence child.
    pub fn recurrence_update_info(
        map: &DocumentMap<Task>,
        task: &Task,
    ) -> Result<UpsertManyInfo<Task>, TaskOperationError> {
        let Some(info) = task.recurrence_info.as_ref() else {
            return Err(TaskOperationError::not_recurrence_root(task.id.clone()));
        };
        if task.parent_recurring_task_info.is_some() {
            return Err(TaskOperationError::not_recurrence_root(task.id.clone()));
        }
        if info.recurrence_effect == RecurrenceEffect::Stack && !task.completed {
            operations::duplicate_task_update_info(
                map,
                &task.id,
                |mut copy| {
                    copy.completed = true;
                    Self::roll_dates_forward(&mut copy);
                    copy
                },
                Some(Arc::new(|mut original: Task| {
                    original.recurrence_info = None;
                    original.parent_recurring_task_info = None;
                    original
                })),
            )
        } else {
            operations::update_task_and_all_children_info(map, &task.id, |mut task| {
                Self::roll_dates_forward(&mut task);
                task.completed = false;
                task
            })
        }
    }

    /// Executes recurrence for the task through the provided store. No-op
    /// for anything that is not a root recurring task.
    pub async fn execute_recurrence_for_task(
        task: &Task,
        map: &DocumentMap<Task>,
        store: &DocumentMapStore<Task>,
    ) {
        if !task.is_recurrence_root() {
            return;
        }
        tracing::info!(task_id = %task.id, title = %task.title, "executing recurrence for task");
        match Self::recurrence_update_info(map, task) {
            Ok(info) => store.upsert_many(info).await,
            Err(e) => tracing::error!("failed to build recurrence update: {e}"),
        }
    }

    /// Executes recurrence only if the task is due.
    pub async fn execute_recurrence_if_needed(
        task: &Task,
        map: &DocumentMap<Task>,
        store: &DocumentMapStore<Task>,
    ) {
        if Self::task_should_recur(task) {
            Self::execute_recurrence_for_task(task, map, store).await;
        }
    }

    /// Installs the clock subscription for the task if it qualifies
    /// (calendar-driven root recurrence with a computable next date), and
    /// removes any existing one either way.
    pub fn update_or_remove_time_subscription(&self, task: &Task) {
        self.remove_time_subscription(&task.id);
        if !task.is_recurrence_root() {
            return;
        }
        let Some(info) = task.recurrence_info.as_ref() else {
            return;
        };
        if info.recurrence_effect == RecurrenceEffect::RollOnCompletion {
            return;
        }
        let Some(next) = Self::next_recurrence_date(task) else {
            return;
        };

        let mut clock = self.clock.clone();
        let visibility = self.visibility.clone();
        let refresh_tx = self.refresh_tx.clone();
        let task_id = task.id.clone();
        let handle = tokio::spawn(async move {
            while clock.changed().await.is_ok() {
                let now = *clock.borrow_and_update();
                if now > next {
                    // Only refresh while visible; a hidden app waits for
                    // the next tick after it is foregrounded.
                    if visibility.get() {
                        tracing::debug!(
                            task_id = %task_id,
                            "recurrence due; requesting authoritative refresh"
                        );
                        if refresh_tx.send(()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task.id.clone(), handle);
    }

    /// Cancels the task's clock subscription, if any.
    pub fn remove_time_subscription(&self, task_id: &str) {
        let handle = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(task_id);
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Tears down every subscription and installs fresh ones for the
    /// provided map.
    pub fn rebuild_time_subscriptions(&self, map: &DocumentMap<Task>) {
        {
            let mut subscriptions = self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for (_, handle) in subscriptions.drain() {
                handle.abort();
            }
        }
        for task in map.values() {
            self.update_or_remove_time_subscription(task);
        }
    }

    /// Number of live clock subscriptions.
    pub fn active_subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Hook bundle wiring the recurrence engine into the task map store.
struct RecurrencePolicy {
    service: Arc<RecurrenceService>,
}

impl StorePolicy<Task> for RecurrencePolicy {
    fn name(&self) -> &'static str {
        "recurrence"
    }

    fn after_map_set(&self, map: &DocumentMap<Task>, effects: &mut StoreEffects<Task>) {
        for task in map.values() {
            if RecurrenceService::task_should_recur(task) {
                match RecurrenceService::recurrence_update_info(map, task) {
                    Ok(info) => effects.upsert_many(info),
                    Err(e) => tracing::error!("failed to build recurrence update: {e}"),
                }
            }
        }
        self.service.rebuild_time_subscriptions(map);
    }

    fn after_doc_addition(&self, _map: &DocumentMap<Task>, new_doc: &Task) {
        self.service.update_or_remove_time_subscription(new_doc);
    }

    fn validate_doc_update(
        &self,
        map: &DocumentMap<Task>,
        old_doc: Option<&Task>,
        new_doc: &Task,
    ) -> Option<UpsertManyInfo<Task>> {
        let watch_recurrence = new_doc.is_recurrence_root();
        let old_start = old_doc.and_then(|o| o.start_date);
        let old_due = old_doc.and_then(|o| o.due_date);
        let dates_differ = new_doc.start_date != old_start || new_doc.due_date != old_due;

        if watch_recurrence && RecurrenceService::task_should_recur(new_doc) {
            return match RecurrenceService::recurrence_update_info(map, new_doc) {
                Ok(info) => Some(info),
                Err(e) => {
                    tracing::error!("failed to build recurrence update: {e}");
                    None
                }
            };
        }

        let old_recurrence = old_doc.and_then(|o| o.recurrence_info.clone());
        if watch_recurrence || old_recurrence.is_some() || dates_differ {
            let recurrence_changed = old_recurrence != new_doc.recurrence_info;
            if recurrence_changed {
                self.service.update_or_remove_time_subscription(new_doc);
                // Propagate the new recurrence linkage (or its removal)
                // down the whole subtree.
                let root_id = new_doc.id.clone();
                let new_info = new_doc.recurrence_info.clone();
                let parent_info = ParentRecurringTaskInfo {
                    task_id: new_doc.id.clone(),
                    start_date: new_doc.start_date,
                    due_date: new_doc.due_date,
                };
                return match operations::update_task_and_all_children_info(
                    map,
                    &new_doc.id,
                    move |mut task| {
                        if task.id == root_id {
                            return task;
                        }
                        match new_info.as_ref() {
                            Some(info) => {
                                task.parent_recurring_task_info = Some(parent_info.clone());
                                task.recurrence_info = Some(info.clone());
                            }
                            None => {
                                task.parent_recurring_task_info = None;
                                task.recurrence_info = None;
                            }
                        }
                        task
                    },
                ) {
                    Ok(info) => Some(info),
                    Err(e) => {
                        tracing::error!("failed to build recurrence propagation update: {e}");
                        None
                    }
                };
            }
        }
        None
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "recurrence_test.rs"]
mod recurrence_test;
