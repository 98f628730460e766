//! Dayboard Core Synchronization Layer
//!
//! This crate provides the document-map synchronization, task recurrence
//! scheduling, and cascade policy layer for the Dayboard personal dashboard
//! application. It is a library consumed by the UI shell; there is no
//! process entry point here.
//!
//! # Architecture
//!
//! - **Reactive document stores**: one generic map store per document
//!   variant, with per-document handles kept strongly consistent with the
//!   map and an ordered policy (hook) pipeline on every mutation
//! - **Durable outbound queue**: every mutation batch lands in a
//!   libsql-backed FIFO and drains strictly in order against the backend;
//!   the combined response applies to the stores exactly once after the
//!   queue empties
//! - **Recurrence as a map-set side effect**: timers only request an
//!   authoritative refresh; due recurrences execute from the refreshed
//!   map's hook pass, never from possibly-stale local state
//!
//! # Modules
//!
//! - [`models`] - Document variants (Task, TrackedItem, UpgradeRecord) and
//!   user configuration
//! - [`store`] - Generic reactive map store, policies, persistence seams
//! - [`operations`] - Pure task-tree helpers (descendants, duplication)
//! - [`services`] - Recurrence, sharing, tags, expiry, and the per-variant
//!   map services
//! - [`sync`] - Outbound request queue and authoritative refresh
//! - [`db`] - libsql local cache (KV mirror + durable queue)
//! - [`api`] - Remote request/response types and the HTTP client
//! - [`context`] - Application context owning one instance of everything

pub mod api;
pub mod context;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;
pub mod store;
pub mod sync;
pub mod time;

// Re-export commonly used types
pub use context::{AppContext, AppContextConfig};
pub use models::*;
pub use services::{
    RecurrenceService, TaskMapService, TaskTagsService, TrackedItemMapService, UpgradeMapService,
    UserSettingsStore,
};
pub use store::{DocumentMapStore, DocumentStore, StorePolicy, UpsertManyInfo};
