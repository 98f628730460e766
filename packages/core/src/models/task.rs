//! Task Document and Recurrence Descriptors
//!
//! The task is the primary document variant: a titled item with optional
//! start/due dates, completion state, a parent reference forming arbitrarily
//! deep subtask trees, a shared-with list, per-user tag lists, and an
//! optional recurrence descriptor.
//!
//! # Recurrence Model
//!
//! Only a task with `recurrence_info` set and no `parent_recurring_task_info`
//! is a *root* recurring task. Its descendants carry a
//! [`ParentRecurringTaskInfo`] back-reference with the parent's dates
//! snapshotted at delegation time; children never independently trigger
//! recurrence.

use crate::models::Document;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Which task date anchors recurrence computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecurrenceBasis {
    StartDate,
    DueDate,
}

/// What happens when a recurrence comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecurrenceEffect {
    /// Dates roll forward only once the task is completed. There is no
    /// calendar-driven trigger for this effect.
    RollOnCompletion,
    /// Dates roll forward as soon as the basis date passes (default).
    RollOnBasis,
    /// A completed copy of the subtree is stacked and the newest instance
    /// carries the recurrence forward.
    Stack,
}

/// How far one recurrence step advances a date.
///
/// Month and year steps use calendar arithmetic with end-of-month clamping
/// (Jan 31 + 1 month = Feb 28/29).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecurrenceFrequency {
    EveryXDays { x: u32 },
    EveryXWeeks { x: u32 },
    EveryXMonths { x: u32 },
    EveryXYears { x: u32 },
}

impl RecurrenceFrequency {
    /// Computes the occurrence that follows the provided anchor date.
    pub fn next_occurrence(&self, anchor: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Self::EveryXDays { x } => anchor + Duration::days(i64::from(x)),
            Self::EveryXWeeks { x } => anchor + Duration::weeks(i64::from(x)),
            Self::EveryXMonths { x } => anchor
                .checked_add_months(Months::new(x))
                .unwrap_or(anchor),
            Self::EveryXYears { x } => anchor
                .checked_add_months(Months::new(x.saturating_mul(12)))
                .unwrap_or(anchor),
        }
    }
}

/// Recurrence descriptor attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceInfo {
    pub frequency: RecurrenceFrequency,
    pub recurrence_basis: RecurrenceBasis,
    pub recurrence_effect: RecurrenceEffect,
}

/// Back-reference carried by descendants of a root recurring task.
///
/// The dates are snapshots of the root's dates at the moment recurrence was
/// delegated down the subtree; recurrence computations for children anchor
/// on these, not on the child's own dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRecurringTaskInfo {
    pub task_id: String,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Primary document variant: a task on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub parent_task_id: Option<String>,
    pub recurrence_info: Option<RecurrenceInfo>,
    pub parent_recurring_task_info: Option<ParentRecurringTaskInfo>,
    #[serde(default)]
    pub shared_with: Vec<String>,
    /// Per-user tag lists, keyed by user ID. Collaborators each maintain
    /// their own tags on a shared task.
    #[serde(default)]
    pub tags: HashMap<String, Vec<String>>,
    pub category: Option<String>,
    pub last_updated_date: DateTime<Utc>,
}

impl Task {
    /// Creates a new task with a fresh UUID, owned by the provided user.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            description: String::new(),
            completed: false,
            start_date: None,
            due_date: None,
            parent_task_id: None,
            recurrence_info: None,
            parent_recurring_task_info: None,
            shared_with: Vec::new(),
            tags: HashMap::new(),
            category: None,
            last_updated_date: Utc::now(),
        }
    }

    /// True when this task is a root recurring task: it carries a recurrence
    /// descriptor and is not delegated to by a recurring ancestor.
    pub fn is_recurrence_root(&self) -> bool {
        self.recurrence_info.is_some() && self.parent_recurring_task_info.is_none()
    }

    /// Tags the provided user has placed on this task.
    pub fn tags_for_user(&self, user_id: &str) -> &[String] {
        self.tags.get(user_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Document for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated_date
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_task_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_frequency_steps_days_and_weeks() {
        let anchor = date(2025, 3, 10);
        assert_eq!(
            RecurrenceFrequency::EveryXDays { x: 3 }.next_occurrence(anchor),
            date(2025, 3, 13)
        );
        assert_eq!(
            RecurrenceFrequency::EveryXWeeks { x: 2 }.next_occurrence(anchor),
            date(2025, 3, 24)
        );
    }

    #[test]
    fn test_frequency_clamps_month_end() {
        let anchor = date(2025, 1, 31);
        assert_eq!(
            RecurrenceFrequency::EveryXMonths { x: 1 }.next_occurrence(anchor),
            date(2025, 2, 28)
        );
    }

    #[test]
    fn test_frequency_steps_years() {
        let anchor = date(2024, 2, 29);
        assert_eq!(
            RecurrenceFrequency::EveryXYears { x: 1 }.next_occurrence(anchor),
            date(2025, 2, 28)
        );
    }

    #[test]
    fn test_recurrence_root_detection() {
        let mut task = Task::new("user-1", "Water plants");
        assert!(!task.is_recurrence_root());

        task.recurrence_info = Some(RecurrenceInfo {
            frequency: RecurrenceFrequency::EveryXDays { x: 1 },
            recurrence_basis: RecurrenceBasis::DueDate,
            recurrence_effect: RecurrenceEffect::RollOnBasis,
        });
        assert!(task.is_recurrence_root());

        task.parent_recurring_task_info = Some(ParentRecurringTaskInfo {
            task_id: "other".to_string(),
            start_date: None,
            due_date: None,
        });
        assert!(!task.is_recurrence_root());
    }

    #[test]
    fn test_task_serialization_contract() {
        // The backend contract is camelCase; the frontend shell depends on it.
        let mut task = Task::new("user-1", "Ship release");
        task.parent_task_id = Some("parent-1".to_string());
        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("parentTaskId").is_some());
        assert!(json.get("lastUpdatedDate").is_some());
        assert!(json.get("sharedWith").is_some());
        assert!(json.get("parent_task_id").is_none());
    }

    #[test]
    fn test_frequency_serialization_tagged() {
        let freq = RecurrenceFrequency::EveryXDays { x: 4 };
        let json = serde_json::to_value(freq).unwrap();
        assert_eq!(json.get("type").unwrap(), "everyXDays");
        assert_eq!(json.get("x").unwrap(), 4);
    }
}
