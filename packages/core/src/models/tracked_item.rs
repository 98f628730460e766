//! Tracked Collection Item Document
//!
//! Auxiliary document variant for the game-tracking pages: a named item with
//! a current amount, storage cap, and desired-range bounds. The core treats
//! it as an opaque payload with identity; it has no hierarchy.

use crate::models::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItem {
    pub id: String,
    pub user_id: String,
    pub item_name: String,
    #[serde(default)]
    pub current_amount: i64,
    #[serde(default)]
    pub storage_cap: i64,
    #[serde(default)]
    pub min_desired: i64,
    #[serde(default)]
    pub max_desired: i64,
    #[serde(default)]
    pub priority: i64,
    pub last_updated_date: DateTime<Utc>,
}

impl TrackedItem {
    pub fn new(user_id: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            item_name: item_name.into(),
            current_amount: 0,
            storage_cap: 0,
            min_desired: 0,
            max_desired: 0,
            priority: 0,
            last_updated_date: Utc::now(),
        }
    }
}

impl Document for TrackedItem {
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
