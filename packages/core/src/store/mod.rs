//! Reactive Document Store Layer
//!
//! The generic mechanism the concrete services ride on:
//!
//! - [`DocumentMapStore`] - reactive map of one document variant with
//!   per-document handles and outbound persistence
//! - [`StorePolicy`] - ordered hook bundles carrying the policy layer
//!   (recurrence, sharing, tags, cascades)
//! - [`StorePersistence`] - injected cache/remote strategy per variant

pub mod document_map_store;
pub mod persistence;
pub mod policy;

#[cfg(test)]
pub(crate) mod test_support;

pub use document_map_store::{DocumentMapStore, DocumentStore};
pub use persistence::{DocumentBatch, StorePersistence};
pub use policy::{DocFilter, DocUpdater, StoreEffects, StorePolicy, UpsertManyInfo};
