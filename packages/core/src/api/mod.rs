//! Remote Document API
//!
//! The backend exposes a single function endpoint accepting one request
//! shape: optional `get` flags plus optional `insert`/`update`/`delete`
//! payloads per resource, answered with a `success` flag and refreshed
//! resource arrays. The core always requests `get` for a resource alongside
//! any mutation so the response can fully refresh the local map instead of
//! trusting optimistic local state.
//!
//! The core depends only on the [`DashboardApi`] trait; the production
//! implementation is [`HttpDashboardApi`]. Tests script their own
//! implementations.

mod http;

pub use http::HttpDashboardApi;

use crate::models::{Task, TrackedItem, UpgradeRecord, UserConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Which resources a request asks the backend to return refreshed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFlags {
    #[serde(default, skip_serializing_if = "is_false")]
    pub tasks: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub tracked_items: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub upgrades: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub user_config: bool,
}

impl GetFlags {
    pub fn all() -> Self {
        Self {
            tasks: true,
            tracked_items: true,
            upgrades: true,
            user_config: true,
        }
    }

    pub fn tasks() -> Self {
        Self {
            tasks: true,
            ..Self::default()
        }
    }

    pub fn tracked_items() -> Self {
        Self {
            tracked_items: true,
            ..Self::default()
        }
    }

    pub fn upgrades() -> Self {
        Self {
            upgrades: true,
            ..Self::default()
        }
    }
}

/// Per-resource document arrays carried by a mutation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_items: Option<Vec<TrackedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrades: Option<Vec<UpgradeRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_config: Option<UserConfig>,
}

impl DocumentPayload {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_none()
            && self.tracked_items.is_none()
            && self.upgrades.is_none()
            && self.user_config.is_none()
    }
}

/// The single request shape the backend accepts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<GetFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert: Option<DocumentPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<DocumentPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<DocumentPayload>,
}

/// Refreshed resource data returned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_items: Option<Vec<TrackedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrades: Option<Vec<UpgradeRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_config: Option<UserConfig>,
}

impl ApiData {
    /// Folds a later response into this one; a resource present in `other`
    /// replaces whatever an earlier response carried for it.
    pub fn merge(&mut self, other: ApiData) {
        if other.tasks.is_some() {
            self.tasks = other.tasks;
        }
        if other.tracked_items.is_some() {
            self.tracked_items = other.tracked_items;
        }
        if other.upgrades.is_some() {
            self.upgrades = other.upgrades;
        }
        if other.user_config.is_some() {
            self.user_config = other.user_config;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_none()
            && self.tracked_items.is_none()
            && self.upgrades.is_none()
            && self.user_config.is_none()
    }
}

/// Backend response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<ApiData>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Remote call errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure (connection, TLS, body decode)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Endpoint answered with a non-success HTTP status
    #[error("Remote call failed with HTTP status {status}")]
    Status { status: u16 },
}

/// Remote document API boundary.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn call(&self, request: DashboardRequest) -> Result<DashboardResponse, ApiError>;
}
