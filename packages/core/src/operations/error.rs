//! Error types for pure task-tree operations
//!
//! The operations helpers are the one place in the core allowed to throw
//! outward: operating on an absent root is a programmer error with no
//! sensible degraded behavior.

use thiserror::Error;

/// Errors raised by the task-tree operation helpers.
#[derive(Error, Debug)]
pub enum TaskOperationError {
    /// Referenced task does not exist in the map
    #[error("Task '{task_id}' does not exist")]
    TaskNotFound { task_id: String },

    /// Recurrence was requested for a task that is not a root recurring
    /// task (no descriptor, or delegated to by a recurring ancestor)
    #[error("Task '{task_id}' is not a root recurring task")]
    NotRecurrenceRoot { task_id: String },
}

impl TaskOperationError {
    /// Create a TaskNotFound error
    pub fn task_not_found(task_id: impl Into<String>) -> Self {
        Self::TaskNotFound {
            task_id: task_id.into(),
        }
    }

    /// Create a NotRecurrenceRoot error
    pub fn not_recurrence_root(task_id: impl Into<String>) -> Self {
        Self::NotRecurrenceRoot {
            task_id: task_id.into(),
        }
    }
}
