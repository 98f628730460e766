//! Remote Synchronization Layer
//!
//! Everything between the stores and the backend function:
//!
//! - [`RequestQueue`] - durable FIFO of mutation batches, drained strictly
//!   in order with a single combined-response apply
//! - [`SyncService`] - authoritative refresh (initial fetch, throttled
//!   recurrence-triggered re-fetch) and user-settings propagation
//! - [`ResponseApplier`] - seam through which fetched/combined data reaches
//!   the reactive stores

pub mod request_queue;
pub mod sync_service;

pub use request_queue::{RequestQueue, ResponseApplier};
pub use sync_service::{SyncService, SECONDS_TO_WAIT_BEFORE_REFETCH};
