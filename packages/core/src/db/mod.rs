//! Local Persistence Layer
//!
//! This module owns the libsql-backed local cache: the key-value mirror of
//! every document map and the durable outbound request queue. It is the
//! piece that lets a reload resume mid-flight - maps re-hydrate from the
//! mirror and unacknowledged batches drain from the queue.
//!
//! The remote side of persistence lives in [`crate::sync`]; this layer
//! never talks to the network.

mod error;
mod local_cache;

pub use error::CacheError;
pub use local_cache::{LocalCache, QueueRow, CACHE_KEY_PREFIX};
