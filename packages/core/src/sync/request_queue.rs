//! Outbound Request Queue
//!
//! Serializes every locally-queued mutation batch into an ordered sequence
//! of calls against the remote API. The queue itself is durable (libsql
//! rows, see [`LocalCache`]); this module owns the drain loop and its
//! ordering guarantees:
//!
//! - strictly FIFO: one batch in flight at a time, in enqueue order
//! - responses are merged into one cumulative data object
//! - the combined data is applied to the reactive stores exactly once,
//!   after the queue is fully empty - never per batch - so a page that
//!   reloaded mid-flight cannot observe an intermediate, partially-synced
//!   state
//! - a failed batch stays at the queue front; there is no retry/backoff
//!   loop, the next submit (or startup resume) picks it up
//!
//! # Single-Flight
//!
//! `process` takes a non-blocking drain lock. A submit that arrives while a
//! drain is running returns immediately; the active drain keeps pulling
//! rows until the queue is empty, so the new row is not lost.

use crate::api::{ApiData, DashboardApi, DashboardRequest};
use crate::db::LocalCache;
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;

/// Receiver for the combined response data once a drain completes. In the
/// application context this is the piece that sets every document store
/// from the refreshed resource arrays.
#[async_trait]
pub trait ResponseApplier: Send + Sync {
    async fn apply_response_data(&self, data: ApiData);
}

/// Durable FIFO of outbound mutation batches plus its drain loop.
pub struct RequestQueue {
    cache: Arc<LocalCache>,
    api: Arc<dyn DashboardApi>,
    applier: OnceLock<Arc<dyn ResponseApplier>>,
    drain_lock: Mutex<()>,
}

impl RequestQueue {
    pub fn new(cache: Arc<LocalCache>, api: Arc<dyn DashboardApi>) -> Arc<Self> {
        Arc::new(Self {
            cache,
            api,
            applier: OnceLock::new(),
            drain_lock: Mutex::new(()),
        })
    }

    /// Registers the applier that receives combined response data. Wired
    /// once at context construction; later calls are ignored.
    pub fn set_applier(&self, applier: Arc<dyn ResponseApplier>) {
        if self.applier.set(applier).is_err() {
            tracing::warn!("response applier already registered; ignoring replacement");
        }
    }

    /// Appends a request to the durable queue and drains. The common entry
    /// point for store persistence strategies.
    pub async fn submit(self: Arc<Self>, request: DashboardRequest) {
        if self.enqueue(&request).await {
            self.process().await;
        }
    }

    /// Appends a request to the durable queue without draining. Returns
    /// whether the row was written.
    pub async fn enqueue(&self, request: &DashboardRequest) -> bool {
        let payload = match serde_json::to_string(request) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("failed to serialize outbound request: {e}");
                return false;
            }
        };
        match self.cache.enqueue(&payload).await {
            Ok(row_id) => {
                tracing::debug!(row_id, "queued outbound request");
                true
            }
            Err(e) => {
                tracing::error!("failed to enqueue outbound request: {e}");
                false
            }
        }
    }

    /// Number of batches waiting in the durable queue.
    pub async fn pending(&self) -> u64 {
        match self.cache.queue_len().await {
            Ok(len) => len,
            Err(e) => {
                tracing::error!("failed to read outbound queue length: {e}");
                0
            }
        }
    }

    /// Drains the queue one batch at a time in enqueue order. On success
    /// the combined response data is applied once; on failure the offending
    /// batch is left at the queue front for the next trigger.
    pub async fn process(&self) {
        let Ok(guard) = self.drain_lock.try_lock() else {
            tracing::debug!("outbound queue drain already in progress");
            return;
        };

        let mut combined = ApiData::default();
        let mut drained_any = false;
        let fully_drained = loop {
            let row = match self.cache.peek_front().await {
                Ok(Some(row)) => row,
                Ok(None) => break true,
                Err(e) => {
                    tracing::error!("failed to read outbound queue: {e}");
                    break false;
                }
            };
            let request: DashboardRequest = match serde_json::from_str(&row.payload) {
                Ok(request) => request,
                Err(e) => {
                    tracing::error!(row_id = row.id, "dropping corrupt outbound queue row: {e}");
                    if let Err(e) = self.cache.remove(row.id).await {
                        tracing::error!("failed to drop corrupt queue row: {e}");
                        break false;
                    }
                    continue;
                }
            };
            match self.api.call(request).await {
                Ok(response) if response.success => {
                    if let Some(data) = response.data {
                        combined.merge(data);
                    }
                    drained_any = true;
                    if let Err(e) = self.cache.remove(row.id).await {
                        tracing::error!("failed to remove acknowledged queue row: {e}");
                        break false;
                    }
                }
                Ok(response) => {
                    tracing::error!(
                        errors = ?response.errors,
                        "remote rejected batch; leaving it at the queue front"
                    );
                    break false;
                }
                Err(e) => {
                    tracing::error!("remote call failed: {e}; leaving batch at the queue front");
                    break false;
                }
            }
        };
        drop(guard);

        if fully_drained && drained_any && !combined.is_empty() {
            match self.applier.get() {
                Some(applier) => applier.apply_response_data(combined).await,
                None => tracing::warn!("no response applier registered; dropping combined response"),
            }
        }
    }
}
