//! Pure Task-Tree Operations
//!
//! Stateless helpers over a task map: descendant-set computation and deep
//! subtree duplication with ID remapping. Used by the recurrence engine and
//! by store consumers building multi-document update descriptors; nothing
//! here touches a store.

use crate::models::{DocumentMap, Task};
use crate::operations::TaskOperationError;
use crate::store::{DocUpdater, UpsertManyInfo};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// All tasks in the map as a flat list.
pub fn all_tasks(map: &DocumentMap<Task>) -> Vec<&Task> {
    map.values().collect()
}

/// Transitive closure over `parent_task_id` links starting at `root_ids`,
/// excluding the roots themselves.
///
/// Handles arbitrarily deep chains. A parent link that leads back to an
/// already-visited task is a data-integrity violation: it is logged and not
/// followed, so cyclic data cannot loop the walk.
pub fn children_ids(tasks: &[&Task], root_ids: &[String]) -> Vec<String> {
    let mut children_by_parent: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in tasks {
        if let Some(parent_id) = task.parent_task_id.as_deref() {
            children_by_parent
                .entry(parent_id)
                .or_default()
                .push(task.id.as_str());
        }
    }

    let mut visited: HashSet<&str> = root_ids.iter().map(String::as_str).collect();
    let mut frontier: Vec<&str> = root_ids.iter().map(String::as_str).collect();
    let mut result: Vec<String> = Vec::new();
    while let Some(current) = frontier.pop() {
        let Some(children) = children_by_parent.get(current) else {
            continue;
        };
        for &child_id in children {
            if !visited.insert(child_id) {
                tracing::error!(
                    task_id = %child_id,
                    "cycle detected in task parent links; not following"
                );
                continue;
            }
            result.push(child_id.to_string());
            frontier.push(child_id);
        }
    }
    result
}

/// Builds an update descriptor matching `{root} ∪ descendants(root)` paired
/// with the provided updater.
///
/// # Errors
///
/// Returns [`TaskOperationError::TaskNotFound`] if `task_id` is absent.
pub fn update_task_and_all_children_info(
    map: &DocumentMap<Task>,
    task_id: &str,
    updater: impl Fn(Task) -> Task + Send + Sync + 'static,
) -> Result<UpsertManyInfo<Task>, TaskOperationError> {
    let parent_task = map
        .get(task_id)
        .ok_or_else(|| TaskOperationError::task_not_found(task_id))?;
    let mut related_ids = children_ids(&all_tasks(map), std::slice::from_ref(&parent_task.id));
    related_ids.push(parent_task.id.clone());
    let related: HashSet<String> = related_ids.into_iter().collect();
    Ok(UpsertManyInfo::update_only(
        move |task: &Task| related.contains(&task.id),
        updater,
    ))
}

/// Builds the descriptor for duplicating a task and its whole subtree.
///
/// Every copy gets a fresh ID and is passed through `new_task_updater`;
/// every copy's parent reference is rewritten to the copied parent's new
/// ID, except the duplicated root, whose parent link keeps pointing at the
/// external original parent. With `original_task_updater` supplied the
/// descriptor's filter matches the original ID set so the originals are
/// updated in the same batch; otherwise the filter matches nothing.
///
/// # Errors
///
/// Returns [`TaskOperationError::TaskNotFound`] if `task_id` is absent.
pub fn duplicate_task_update_info(
    map: &DocumentMap<Task>,
    task_id: &str,
    new_task_updater: impl Fn(Task) -> Task,
    original_task_updater: Option<DocUpdater<Task>>,
) -> Result<UpsertManyInfo<Task>, TaskOperationError> {
    let parent_task = map
        .get(task_id)
        .ok_or_else(|| TaskOperationError::task_not_found(task_id))?;
    let mut related_ids = children_ids(&all_tasks(map), std::slice::from_ref(&parent_task.id));
    related_ids.push(parent_task.id.clone());

    let mut tasks_to_insert: Vec<Task> = Vec::new();
    let mut old_to_new: HashMap<String, String> = HashMap::new();
    for id in &related_ids {
        let doc = map
            .get(id)
            .ok_or_else(|| TaskOperationError::task_not_found(id.clone()))?;
        let mut copy = doc.clone();
        copy.id = Uuid::new_v4().to_string();
        old_to_new.insert(id.clone(), copy.id.clone());
        copy = new_task_updater(copy);
        tasks_to_insert.push(copy);
    }

    // Remap parent links onto the copies. The duplicated root keeps its
    // external parent untouched.
    let root_copy_id = old_to_new.get(task_id).cloned().unwrap_or_default();
    for task in &mut tasks_to_insert {
        if task.id == root_copy_id {
            continue;
        }
        if let Some(old_parent) = task.parent_task_id.as_deref() {
            match old_to_new.get(old_parent) {
                Some(new_parent) => task.parent_task_id = Some(new_parent.clone()),
                None => tracing::error!(
                    task_id = %task.id,
                    parent_task_id = %old_parent,
                    "duplicated task's parent is outside the duplicated subtree"
                ),
            }
        }
    }

    match original_task_updater {
        Some(updater) => {
            let related: HashSet<String> = related_ids.into_iter().collect();
            Ok(UpsertManyInfo {
                filter: std::sync::Arc::new(move |task: &Task| related.contains(&task.id)),
                updater,
                new_docs: tasks_to_insert,
            })
        }
        None => Ok(UpsertManyInfo::insert_only(tasks_to_insert)),
    }
}
