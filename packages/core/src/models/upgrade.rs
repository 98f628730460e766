//! Upgrade Record Document
//!
//! Auxiliary document variant for the game-tracking pages: an upgrade with a
//! completion flag and the item amounts it requires. Like tracked items, the
//! core treats it as an opaque payload with identity.

use crate::models::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One item requirement of an upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePrerequisite {
    pub item_name: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRecord {
    pub id: String,
    pub user_id: String,
    pub upgrade_name: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub prerequisites: Vec<UpgradePrerequisite>,
    pub last_updated_date: DateTime<Utc>,
}

impl UpgradeRecord {
    pub fn new(user_id: impl Into<String>, upgrade_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            upgrade_name: upgrade_name.into(),
            completed: false,
            prerequisites: Vec::new(),
            last_updated_date: Utc::now(),
        }
    }
}

impl Document for UpgradeRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated_date
    }
}
