//! Pure Task-Tree Operations
//!
//! Stateless helpers shared by the recurrence engine and by store
//! consumers: computing "this task plus all its descendants" sets and
//! deep-duplicating a task subtree with ID remapping. These functions never
//! touch a store; they build descriptors the store layer applies.

mod error;
pub mod task_tree;

pub use error::TaskOperationError;
pub use task_tree::{
    all_tasks, children_ids, duplicate_task_update_info, update_task_and_all_children_info,
};
