//! Store Policies (Hook Pipeline)
//!
//! A [`StorePolicy`] is an ordered bundle of optional hook slots attached to
//! a `DocumentMapStore` at construction. Policies are how the concrete rule
//! layers (recurrence, sharing, tags, deletion cascade, auto-expiry) ride on
//! the generic store mechanism: each policy implements only the slots it
//! needs and the store drives the whole pipeline explicitly.
//!
//! # Hook Order
//!
//! For each store operation the hooks run in registration order:
//!
//! - map set: `before_map_set`, swap, `after_map_set`
//! - addition: `before_doc_addition` (transforming chain), insert,
//!   `after_doc_addition`
//! - deletion: `validate_doc_deletion` (expands the removal set),
//!   `before_doc_deletion`, removal, `after_doc_deletion`
//! - single-document update: `validate_doc_update` runs strictly before any
//!   `before_doc_update` hook; the first policy returning a multi-update
//!   descriptor short-circuits the single-document path entirely
//!
//! # Re-entrancy
//!
//! `after_map_set` receives a [`StoreEffects`] buffer instead of a store
//! reference. A policy that needs follow-up store operations (recurrence
//! roll-forward, auto-expiry deletion) records them there; the store applies
//! the buffered effects after the primary mutation completes, so no hook
//! ever re-enters a store mid-mutation.

use crate::models::{Document, DocumentMap};
use std::sync::Arc;

/// Predicate selecting documents for a multi-document operation.
pub type DocFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Transformation applied to each selected document.
pub type DocUpdater<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// Descriptor for a combined insert-and-update operation.
///
/// Returned by `validate_doc_update` hooks to redirect a single-document
/// update into a multi-document one, and passed to
/// `DocumentMapStore::upsert_many` directly by callers.
pub struct UpsertManyInfo<T> {
    pub filter: DocFilter<T>,
    pub updater: DocUpdater<T>,
    pub new_docs: Vec<T>,
}

impl<T> UpsertManyInfo<T> {
    /// Descriptor that updates matching documents and inserts nothing.
    pub fn update_only(
        filter: impl Fn(&T) -> bool + Send + Sync + 'static,
        updater: impl Fn(T) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            filter: Arc::new(filter),
            updater: Arc::new(updater),
            new_docs: Vec::new(),
        }
    }

    /// Descriptor that inserts documents and matches nothing for update.
    pub fn insert_only(new_docs: Vec<T>) -> Self {
        Self {
            filter: Arc::new(|_| false),
            updater: Arc::new(|doc| doc),
            new_docs,
        }
    }

    /// Attaches documents to insert alongside the update.
    pub fn with_new_docs(mut self, new_docs: Vec<T>) -> Self {
        self.new_docs = new_docs;
        self
    }
}

impl<T: Clone> Clone for UpsertManyInfo<T> {
    fn clone(&self) -> Self {
        Self {
            filter: Arc::clone(&self.filter),
            updater: Arc::clone(&self.updater),
            new_docs: self.new_docs.clone(),
        }
    }
}

/// Follow-up operations requested by `after_map_set` hooks.
///
/// Applied by the store, in the order recorded, once the triggering mutation
/// has fully completed: upserts first, then the union of requested
/// deletions.
pub struct StoreEffects<T> {
    pub(crate) upserts: Vec<UpsertManyInfo<T>>,
    pub(crate) deletions: Vec<String>,
}

impl<T> StoreEffects<T> {
    pub(crate) fn new() -> Self {
        Self {
            upserts: Vec::new(),
            deletions: Vec::new(),
        }
    }

    /// Requests a combined insert/update once the current mutation settles.
    pub fn upsert_many(&mut self, info: UpsertManyInfo<T>) {
        self.upserts.push(info);
    }

    /// Requests a bulk deletion once the current mutation settles.
    pub fn delete_many(&mut self, ids: Vec<String>) {
        self.deletions.extend(ids);
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletions.is_empty()
    }
}

/// Hook bundle registered with a `DocumentMapStore`.
///
/// Every slot has a default no-op implementation; a policy overrides only
/// the slots it cares about. Hooks must not panic: the store runs them
/// unguarded inside its mutation pass.
pub trait StorePolicy<T: Document>: Send + Sync {
    /// Short name used in log lines when a policy's request is dropped or
    /// overridden.
    fn name(&self) -> &'static str;

    /// Runs before a wholesale map replacement is committed.
    fn before_map_set(&self, _old_map: &DocumentMap<T>, _new_map: &DocumentMap<T>) {}

    /// Runs after a wholesale map replacement. Follow-up store operations
    /// go through the effects buffer.
    fn after_map_set(&self, _map: &DocumentMap<T>, _effects: &mut StoreEffects<T>) {}

    /// Runs before a document is inserted. May transform the incoming
    /// document; the value returned by the last policy in the chain is what
    /// gets stored.
    fn before_doc_addition(&self, _map: &DocumentMap<T>, new_doc: T) -> T {
        new_doc
    }

    /// Runs after a document has been inserted and the map notified.
    fn after_doc_addition(&self, _map: &DocumentMap<T>, _new_doc: &T) {}

    /// Reports additional document IDs that must be removed together with
    /// the provided document (typically its descendants).
    fn validate_doc_deletion(&self, _map: &DocumentMap<T>, _doc: &T) -> Vec<String> {
        Vec::new()
    }

    /// Runs once per document in the expanded removal set, before removal.
    fn before_doc_deletion(&self, _map: &DocumentMap<T>, _doc: &T) {}

    /// Runs after the expanded set has been removed, with the full set of
    /// removed documents.
    fn after_doc_deletion(&self, _map: &DocumentMap<T>, _removed: &[T]) {}

    /// Inspects a pending single-document update. Returning a descriptor
    /// abandons the single-document path and re-enters the multi-document
    /// update path with the descriptor's filter and updater instead.
    fn validate_doc_update(
        &self,
        _map: &DocumentMap<T>,
        _old_doc: Option<&T>,
        _new_doc: &T,
    ) -> Option<UpsertManyInfo<T>> {
        None
    }

    /// Runs before any document update is committed. May transform the
    /// candidate document (chain, like `before_doc_addition`).
    fn before_doc_update(&self, _map: &DocumentMap<T>, _old_doc: Option<&T>, new_doc: T) -> T {
        new_doc
    }
}
