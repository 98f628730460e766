//! Sharing Propagation Policy
//!
//! A subtree shares as one unit: a child created under a parent inherits
//! the sharing of that parent's subtree root, and widening or narrowing a
//! task's shared-with list pushes the new list down its entire descendant
//! subtree.

use crate::models::{DocumentMap, Task};
use crate::operations;
use crate::store::{StorePolicy, UpsertManyInfo};
use std::collections::HashSet;

pub struct SharingPolicy;

impl SharingPolicy {
    /// The highest ancestor governing a task's sharing: the top of its
    /// parent chain within the map. Iterative walk with a visited-set guard
    /// so cyclic parent data terminates.
    pub fn sharing_root<'a>(map: &'a DocumentMap<Task>, task: &'a Task) -> &'a Task {
        let mut current = task;
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(current.id.as_str());
        while let Some(parent_id) = current.parent_task_id.as_deref() {
            if !visited.insert(parent_id) {
                tracing::error!(
                    task_id = %parent_id,
                    "cycle detected in task parent links while resolving sharing root"
                );
                break;
            }
            match map.get(parent_id) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }
}

impl StorePolicy<Task> for SharingPolicy {
    fn name(&self) -> &'static str {
        "sharing"
    }

    fn before_doc_addition(&self, map: &DocumentMap<Task>, mut new_doc: Task) -> Task {
        let parent = new_doc
            .parent_task_id
            .as_deref()
            .and_then(|parent_id| map.get(parent_id));
        if let Some(parent) = parent {
            new_doc.shared_with = Self::sharing_root(map, parent).shared_with.clone();
        }
        new_doc
    }

    fn validate_doc_update(
        &self,
        map: &DocumentMap<Task>,
        old_doc: Option<&Task>,
        new_doc: &Task,
    ) -> Option<UpsertManyInfo<Task>> {
        if old_doc.map(|o| o.shared_with.len()) == Some(new_doc.shared_with.len()) {
            return None;
        }
        let shared_with = new_doc.shared_with.clone();
        match operations::update_task_and_all_children_info(map, &new_doc.id, move |mut task| {
            task.shared_with = shared_with.clone();
            task
        }) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::error!("failed to build sharing propagation update: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::map_from_docs;
    use crate::store::test_support::task_store_with_policies;
    use std::sync::Arc;

    fn shared_task(title: &str, shared_with: Vec<&str>) -> Task {
        let mut task = Task::new("user-1", title);
        task.shared_with = shared_with.into_iter().map(String::from).collect();
        task
    }

    #[test]
    fn test_sharing_root_walks_to_top() {
        let root = shared_task("root", vec!["friend-1"]);
        let mut mid = Task::new("user-1", "mid");
        mid.parent_task_id = Some(root.id.clone());
        let mut leaf = Task::new("user-1", "leaf");
        leaf.parent_task_id = Some(mid.id.clone());
        let map = map_from_docs(vec![root.clone(), mid, leaf.clone()]);

        let found = SharingPolicy::sharing_root(&map, map.get(&leaf.id).unwrap());
        assert_eq!(found.id, root.id);
    }

    #[test]
    fn test_sharing_root_terminates_on_cycle() {
        let mut a = Task::new("user-1", "a");
        let mut b = Task::new("user-1", "b");
        b.parent_task_id = Some(a.id.clone());
        a.parent_task_id = Some(b.id.clone());
        let map = map_from_docs(vec![a.clone(), b.clone()]);

        // Terminates; lands on the last node before revisiting.
        let found = SharingPolicy::sharing_root(&map, map.get(&a.id).unwrap());
        assert!(found.id == a.id || found.id == b.id);
    }

    #[tokio::test]
    async fn test_child_inherits_share_list_on_addition() {
        let (store, _persistence) = task_store_with_policies(vec![Arc::new(SharingPolicy)]);
        let root = shared_task("root", vec!["friend-1", "friend-2"]);
        store.add_doc(root.clone()).await;

        let mut child = Task::new("user-1", "child");
        child.parent_task_id = Some(root.id.clone());
        let child_id = child.id.clone();
        store.add_doc(child).await;

        assert_eq!(
            store.get_doc(&child_id).unwrap().shared_with,
            vec!["friend-1", "friend-2"]
        );
    }

    #[tokio::test]
    async fn test_share_list_change_propagates_to_subtree() {
        let (store, _persistence) = task_store_with_policies(vec![Arc::new(SharingPolicy)]);
        let root = shared_task("root", vec!["friend-1"]);
        let mut child = Task::new("user-1", "child");
        child.parent_task_id = Some(root.id.clone());
        let mut grandchild = Task::new("user-1", "grandchild");
        grandchild.parent_task_id = Some(child.id.clone());
        store.add_doc(root.clone()).await;
        store.add_doc(child.clone()).await;
        store.add_doc(grandchild.clone()).await;

        store
            .update_doc(&root.id, |mut t| {
                t.shared_with.push("friend-2".to_string());
                t
            })
            .await;

        for id in [&root.id, &child.id, &grandchild.id] {
            assert_eq!(
                store.get_doc(id).unwrap().shared_with,
                vec!["friend-1", "friend-2"],
                "task {id} should carry the propagated share list"
            );
        }
    }

    #[tokio::test]
    async fn test_unchanged_share_length_does_not_propagate() {
        let (store, _persistence) = task_store_with_policies(vec![Arc::new(SharingPolicy)]);
        let root = shared_task("root", vec!["friend-1"]);
        store.add_doc(root.clone()).await;

        store
            .update_doc(&root.id, |mut t| {
                t.title = "renamed".to_string();
                t
            })
            .await;

        // The plain rename went through the single-document path.
        assert_eq!(store.get_doc(&root.id).unwrap().title, "renamed");
    }
}
