//! Data Structures
//!
//! This module defines the document variants the synchronization core
//! manages and the identity contract they share:
//!
//! - [`Document`] / [`DocumentMap`] - identity trait and the map shape owned
//!   by the stores
//! - [`Task`] - the primary variant, with hierarchy, sharing, tags, and
//!   recurrence descriptors
//! - [`TrackedItem`] / [`UpgradeRecord`] - auxiliary game-tracking variants
//! - [`UserConfig`] - per-user settings the core consumes

mod document;
mod task;
mod tracked_item;
mod upgrade;
mod user_config;

pub use document::{map_from_docs, Document, DocumentMap};
pub use task::{
    ParentRecurringTaskInfo, RecurrenceBasis, RecurrenceEffect, RecurrenceFrequency,
    RecurrenceInfo, Task,
};
pub use tracked_item::TrackedItem;
pub use upgrade::{UpgradePrerequisite, UpgradeRecord};
pub use user_config::{
    TagSetting, UserConfig, MAX_AUTO_TASK_DELETION_DAYS, MIN_AUTO_TASK_DELETION_DAYS,
};
