//! User Configuration
//!
//! Per-user settings the core consumes: the auto-deletion retention window
//! and the tag settings that back the tag index. Collaborator IDs ride along
//! for the sharing UI but are not interpreted by the core.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inclusive bounds for the auto-deletion retention window, in days. A
/// configured value outside this range disables the expiry scan for that
/// cycle (logged as an error, nothing is deleted).
pub const MIN_AUTO_TASK_DELETION_DAYS: i64 = 5;
pub const MAX_AUTO_TASK_DELETION_DAYS: i64 = 90;

fn default_auto_task_deletion_days() -> i64 {
    30
}

/// Per-tag settings stored in the user config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSetting {
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    pub user_id: String,
    #[serde(default = "default_auto_task_deletion_days")]
    pub auto_task_deletion_days: i64,
    #[serde(default)]
    pub tag_settings: HashMap<String, TagSetting>,
    #[serde(default)]
    pub collaborators: Vec<String>,
}

impl UserConfig {
    /// Creates a config with defaults for the provided user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            auto_task_deletion_days: default_auto_task_deletion_days(),
            tag_settings: HashMap::new(),
            collaborators: Vec::new(),
        }
    }

    /// True when the configured retention window is usable by the expiry
    /// scan.
    pub fn auto_task_deletion_days_in_bounds(&self) -> bool {
        (MIN_AUTO_TASK_DELETION_DAYS..=MAX_AUTO_TASK_DELETION_DAYS)
            .contains(&self.auto_task_deletion_days)
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_window_bounds() {
        let mut config = UserConfig::new("user-1");
        assert!(config.auto_task_deletion_days_in_bounds());

        config.auto_task_deletion_days = 4;
        assert!(!config.auto_task_deletion_days_in_bounds());
        config.auto_task_deletion_days = 5;
        assert!(config.auto_task_deletion_days_in_bounds());
        config.auto_task_deletion_days = 90;
        assert!(config.auto_task_deletion_days_in_bounds());
        config.auto_task_deletion_days = 91;
        assert!(!config.auto_task_deletion_days_in_bounds());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: UserConfig = serde_json::from_value(serde_json::json!({
            "userId": "user-1"
        }))
        .unwrap();
        assert_eq!(config.auto_task_deletion_days, 30);
        assert!(config.tag_settings.is_empty());
    }
}
