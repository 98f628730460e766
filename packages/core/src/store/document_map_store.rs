//! Generic Reactive Document Map Store
//!
//! `DocumentMapStore<T>` mirrors a collection of server-owned documents in
//! memory: one map per document variant, per-document reactive handles kept
//! strongly consistent with the map, an ordered policy pipeline run on every
//! mutation, a local-cache mirror, and outbound batched persistence handed
//! to the request queue.
//!
//! # Consistency Model
//!
//! Every mutation performs its full in-memory pass - map update, handle
//! pushes, and the policy pipeline - under a single lock acquisition with no
//! await points, so multi-document operations are never observable
//! partially applied. Persistence (cache mirror, remote batch handoff)
//! happens after the lock is released.
//!
//! Map-level subscribers are notified on every map *replacement* (`set`,
//! `add_doc`, deletions, `upsert_many`); per-document mutations
//! (`update_many`, handle updates) push only the affected handles.
//!
//! # Previous-State Snapshot
//!
//! The store keeps a snapshot of the map as of the last persist. Update
//! hooks receive the snapshot entry as the "old" document, mirroring what
//! the backend last saw rather than the in-flight value.

use crate::models::{Document, DocumentMap};
use crate::store::persistence::{DocumentBatch, StorePersistence};
use crate::store::policy::{DocFilter, DocUpdater, StoreEffects, StorePolicy, UpsertManyInfo};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Reactive store owning the document map for one variant.
pub struct DocumentMapStore<T: Document> {
    state: Mutex<StoreState<T>>,
    policies: Vec<Arc<dyn StorePolicy<T>>>,
    persistence: Arc<dyn StorePersistence<T>>,
    map_tx: watch::Sender<DocumentMap<T>>,
}

struct StoreState<T> {
    map: DocumentMap<T>,
    /// Map contents as of the last persist; the "old document" seen by
    /// update hooks.
    previous: DocumentMap<T>,
    handles: HashMap<String, watch::Sender<Option<T>>>,
}

enum UpdateOutcome<T: Document> {
    Committed { snapshot: DocumentMap<T>, doc: T },
    Delegated(UpsertManyInfo<T>),
    Missing,
}

impl<T: Document> DocumentMapStore<T> {
    /// Creates a store with the provided policy pipeline (run in order) and
    /// persistence strategy.
    pub fn new(
        policies: Vec<Arc<dyn StorePolicy<T>>>,
        persistence: Arc<dyn StorePersistence<T>>,
    ) -> Arc<Self> {
        let (map_tx, _) = watch::channel(DocumentMap::new());
        Arc::new(Self {
            state: Mutex::new(StoreState {
                map: DocumentMap::new(),
                previous: DocumentMap::new(),
                handles: HashMap::new(),
            }),
            policies,
            persistence,
            map_tx,
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Synchronous snapshot of the current map.
    pub fn get_map(&self) -> DocumentMap<T> {
        self.lock_state().map.clone()
    }

    /// Current value of a single document, if present.
    pub fn get_doc(&self, doc_id: &str) -> Option<T> {
        self.lock_state().map.get(doc_id).cloned()
    }

    /// Subscribes to map replacements. Per-document mutations do not fire
    /// here; use [`DocumentMapStore::subscribe_doc`] for those.
    pub fn subscribe(&self) -> watch::Receiver<DocumentMap<T>> {
        self.map_tx.subscribe()
    }

    /// Subscribes to one document's reactive handle, creating it lazily.
    /// The handle emits `None` once its document is removed.
    pub fn subscribe_doc(&self, doc_id: &str) -> watch::Receiver<Option<T>> {
        let mut state = self.lock_state();
        let current = state.map.get(doc_id).cloned();
        state
            .handles
            .entry(doc_id.to_string())
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }

    /// True while a reactive handle is tracked for the document. Handles are
    /// discarded when their document is removed from the map.
    pub fn has_handle(&self, doc_id: &str) -> bool {
        self.lock_state().handles.contains_key(doc_id)
    }

    /// Child store wrapper for one document ID.
    pub fn doc_store(self: &Arc<Self>, doc_id: &str) -> DocumentStore<T> {
        DocumentStore {
            store: Arc::clone(self),
            doc_id: doc_id.to_string(),
        }
    }

    /// Wholesale map replacement. Used only when hydrating from the backend
    /// or the local cache; never triggers outbound persistence.
    pub async fn set(&self, new_map: DocumentMap<T>) {
        let (snapshot, effects) = {
            let mut state = self.lock_state();
            for policy in &self.policies {
                policy.before_map_set(&state.map, &new_map);
            }
            state.map = new_map;

            // Reconcile handles: push surviving documents, discard the rest.
            let mut stale: Vec<String> = Vec::new();
            for (doc_id, handle) in &state.handles {
                match state.map.get(doc_id) {
                    Some(doc) => {
                        handle.send_replace(Some(doc.clone()));
                    }
                    None => stale.push(doc_id.clone()),
                }
            }
            for doc_id in stale {
                if let Some(handle) = state.handles.remove(&doc_id) {
                    handle.send_replace(None);
                }
            }

            self.map_tx.send_replace(state.map.clone());
            let snapshot = Self::refresh_previous(&mut state);
            let mut effects = StoreEffects::new();
            for policy in &self.policies {
                policy.after_map_set(&snapshot, &mut effects);
            }
            (snapshot, effects)
        };
        self.mirror_cache(&snapshot).await;
        self.apply_effects(effects).await;
    }

    /// Inserts one document, running the addition hook chain. The document
    /// stored is the final transformed value.
    pub async fn add_doc(&self, doc: T) {
        let (snapshot, inserted) = {
            let mut state = self.lock_state();
            let inserted = self.add_docs_locked(&mut state, vec![doc]);
            self.map_tx.send_replace(state.map.clone());
            let snapshot = Self::refresh_previous(&mut state);
            for doc in &inserted {
                for policy in &self.policies {
                    policy.after_doc_addition(&snapshot, doc);
                }
            }
            (snapshot, inserted)
        };
        self.mirror_cache(&snapshot).await;
        self.persistence
            .persist_remote(DocumentBatch::insert(inserted))
            .await;
    }

    /// Deletes one document and whatever the policies expand the removal
    /// set to (typically the full descendant subtree).
    pub async fn delete_doc(&self, doc_id: &str) {
        self.delete_many(vec![doc_id.to_string()]).await;
    }

    /// Deletes the provided documents plus every additional ID the policies
    /// report. Missing IDs are logged and skipped without aborting the
    /// batch.
    pub async fn delete_many(&self, doc_ids: Vec<String>) {
        let outcome = {
            let mut state = self.lock_state();
            let mut expanded: Vec<String> = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();
            for doc_id in &doc_ids {
                let Some(doc) = state.map.get(doc_id) else {
                    tracing::error!(doc_id = %doc_id, "cannot delete missing document; skipping");
                    continue;
                };
                if seen.insert(doc_id.clone()) {
                    expanded.push(doc_id.clone());
                }
                for policy in &self.policies {
                    for extra in policy.validate_doc_deletion(&state.map, doc) {
                        if seen.insert(extra.clone()) {
                            expanded.push(extra);
                        }
                    }
                }
            }
            if expanded.is_empty() {
                None
            } else {
                let mut removed: Vec<T> = Vec::new();
                for doc_id in &expanded {
                    match state.map.get(doc_id) {
                        Some(doc) => removed.push(doc.clone()),
                        None => tracing::error!(
                            doc_id = %doc_id,
                            "expanded deletion target missing from map; skipping"
                        ),
                    }
                }
                for doc in &removed {
                    for policy in &self.policies {
                        policy.before_doc_deletion(&state.map, doc);
                    }
                }
                for doc_id in &expanded {
                    state.map.remove(doc_id);
                    if let Some(handle) = state.handles.remove(doc_id) {
                        handle.send_replace(None);
                    }
                }
                self.map_tx.send_replace(state.map.clone());
                let snapshot = Self::refresh_previous(&mut state);
                for policy in &self.policies {
                    policy.after_doc_deletion(&snapshot, &removed);
                }
                Some((snapshot, removed))
            }
        };
        let Some((snapshot, removed)) = outcome else {
            return;
        };
        self.mirror_cache(&snapshot).await;
        self.persistence
            .persist_remote(DocumentBatch::delete(removed))
            .await;
    }

    /// Applies `updater` to every document matching `filter`, pushing the
    /// affected handles and persisting one combined update batch. Does not
    /// run `validate_doc_update` (single-document updates only) and does
    /// not notify map-level subscribers.
    pub async fn update_many(
        &self,
        filter: impl Fn(&T) -> bool + Send + Sync + 'static,
        updater: impl Fn(T) -> T + Send + Sync + 'static,
    ) {
        self.update_many_batch(Arc::new(filter), Arc::new(updater))
            .await;
    }

    async fn update_many_batch(&self, filter: DocFilter<T>, updater: DocUpdater<T>) {
        let (snapshot, updated) = {
            let mut state = self.lock_state();
            let updated = self.update_docs_locked(&mut state, &filter, &updater);
            let snapshot = Self::refresh_previous(&mut state);
            (snapshot, updated)
        };
        self.mirror_cache(&snapshot).await;
        if !updated.is_empty() {
            self.persistence
                .persist_remote(DocumentBatch::update(updated))
                .await;
        }
    }

    /// Inserts `new_docs` (through the addition hook chain) and applies the
    /// descriptor's update to every matching existing document, with a
    /// single combined notify and a single persisted batch.
    ///
    /// `after_doc_addition` runs for updated documents as well as inserted
    /// ones.
    pub async fn upsert_many(&self, info: UpsertManyInfo<T>) {
        let UpsertManyInfo {
            filter,
            updater,
            new_docs,
        } = info;
        let (snapshot, inserted, updated) = {
            let mut state = self.lock_state();
            let inserted = self.add_docs_locked(&mut state, new_docs);
            let updated = self.update_docs_locked(&mut state, &filter, &updater);
            self.map_tx.send_replace(state.map.clone());
            let snapshot = Self::refresh_previous(&mut state);
            for doc in updated.iter().chain(inserted.iter()) {
                for policy in &self.policies {
                    policy.after_doc_addition(&snapshot, doc);
                }
            }
            (snapshot, inserted, updated)
        };
        self.mirror_cache(&snapshot).await;
        if !(inserted.is_empty() && updated.is_empty()) {
            self.persistence
                .persist_remote(DocumentBatch::upsert(inserted, updated))
                .await;
        }
    }

    /// Persists a single-document update batch for the document currently
    /// in the map at `doc_id`.
    pub async fn persist_doc(&self, doc_id: &str) {
        let payload = {
            let mut state = self.lock_state();
            match state.map.get(doc_id).cloned() {
                Some(doc) => {
                    let snapshot = Self::refresh_previous(&mut state);
                    Some((snapshot, doc))
                }
                None => {
                    tracing::error!(doc_id = %doc_id, "cannot persist missing document");
                    None
                }
            }
        };
        let Some((snapshot, doc)) = payload else {
            return;
        };
        self.mirror_cache(&snapshot).await;
        self.persistence
            .persist_remote(DocumentBatch::update(vec![doc]))
            .await;
    }

    /// Single-document update protocol used by child stores: validation
    /// hooks run first, and the first policy returning a multi-update
    /// descriptor redirects the whole call into the multi-document path.
    pub async fn update_doc<F>(&self, doc_id: &str, updater: F)
    where
        F: FnOnce(T) -> T + Send,
    {
        let outcome = {
            let mut state = self.lock_state();
            match state.map.get(doc_id).cloned() {
                None => {
                    tracing::error!(doc_id = %doc_id, "cannot update missing document");
                    UpdateOutcome::Missing
                }
                Some(current) => {
                    let candidate = updater(current);
                    let old_doc = state.previous.get(doc_id).cloned();
                    let mut descriptor: Option<UpsertManyInfo<T>> = None;
                    for policy in &self.policies {
                        if let Some(info) =
                            policy.validate_doc_update(&state.map, old_doc.as_ref(), &candidate)
                        {
                            if descriptor.is_none() {
                                descriptor = Some(info);
                            } else {
                                tracing::warn!(
                                    policy = policy.name(),
                                    doc_id = %doc_id,
                                    "multiple policies requested a multi-document update; \
                                     keeping the first request"
                                );
                            }
                        }
                    }
                    match descriptor {
                        Some(info) => UpdateOutcome::Delegated(info),
                        None => {
                            let hook_map = state.map.clone();
                            let mut new_doc = candidate;
                            for policy in &self.policies {
                                new_doc =
                                    policy.before_doc_update(&hook_map, old_doc.as_ref(), new_doc);
                            }
                            state.map.insert(doc_id.to_string(), new_doc.clone());
                            if let Some(handle) = state.handles.get(doc_id) {
                                handle.send_replace(Some(new_doc.clone()));
                            }
                            let snapshot = Self::refresh_previous(&mut state);
                            UpdateOutcome::Committed {
                                snapshot,
                                doc: new_doc,
                            }
                        }
                    }
                }
            }
        };
        match outcome {
            UpdateOutcome::Committed { snapshot, doc } => {
                self.mirror_cache(&snapshot).await;
                self.persistence
                    .persist_remote(DocumentBatch::update(vec![doc]))
                    .await;
            }
            UpdateOutcome::Delegated(info) => {
                if !info.new_docs.is_empty() {
                    tracing::warn!(
                        doc_id = %doc_id,
                        count = info.new_docs.len(),
                        "multi-update descriptor carried new documents on the \
                         single-document update path; they are dropped"
                    );
                }
                self.update_many_batch(info.filter, info.updater).await;
            }
            UpdateOutcome::Missing => {}
        }
    }

    /// Replaces the map from the local cache mirror, if one exists. Returns
    /// whether a cached map was applied.
    pub async fn hydrate_from_cache(&self) -> bool {
        match self.persistence.read_cache().await {
            Ok(Some(map)) => {
                tracing::debug!(len = map.len(), "hydrating store from local cache");
                self.set(map).await;
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::error!("failed to read local cache: {e}");
                false
            }
        }
    }

    fn add_docs_locked(&self, state: &mut StoreState<T>, docs: Vec<T>) -> Vec<T> {
        let mut hook_map = state.map.clone();
        let mut inserted = Vec::with_capacity(docs.len());
        for doc in docs {
            let mut new_doc = doc;
            for policy in &self.policies {
                new_doc = policy.before_doc_addition(&hook_map, new_doc);
            }
            hook_map.insert(new_doc.id().to_string(), new_doc.clone());
            state.map.insert(new_doc.id().to_string(), new_doc.clone());
            if let Some(handle) = state.handles.get(new_doc.id()) {
                handle.send_replace(Some(new_doc.clone()));
            }
            inserted.push(new_doc);
        }
        inserted
    }

    fn update_docs_locked(
        &self,
        state: &mut StoreState<T>,
        filter: &DocFilter<T>,
        updater: &DocUpdater<T>,
    ) -> Vec<T> {
        let ids: Vec<String> = state
            .map
            .values()
            .filter(|doc| (**filter)(doc))
            .map(|doc| doc.id().to_string())
            .collect();
        let mut hook_map = state.map.clone();
        let mut updated = Vec::with_capacity(ids.len());
        for doc_id in ids {
            let Some(current) = state.map.get(&doc_id).cloned() else {
                tracing::error!(doc_id = %doc_id, "document vanished during bulk update; skipping");
                continue;
            };
            let mut new_doc = (**updater)(current);
            let old_doc = state.previous.get(&doc_id);
            for policy in &self.policies {
                new_doc = policy.before_doc_update(&hook_map, old_doc, new_doc);
            }
            hook_map.insert(doc_id.clone(), new_doc.clone());
            state.map.insert(doc_id.clone(), new_doc.clone());
            if let Some(handle) = state.handles.get(&doc_id) {
                handle.send_replace(Some(new_doc.clone()));
            }
            updated.push(new_doc);
        }
        updated
    }

    fn refresh_previous(state: &mut StoreState<T>) -> DocumentMap<T> {
        state.previous = state.map.clone();
        state.previous.clone()
    }

    async fn mirror_cache(&self, snapshot: &DocumentMap<T>) {
        if let Err(e) = self.persistence.write_cache(snapshot).await {
            tracing::error!("failed to mirror document map to local cache: {e}");
        }
    }

    async fn apply_effects(&self, effects: StoreEffects<T>) {
        let StoreEffects { upserts, deletions } = effects;
        for info in upserts {
            self.upsert_many(info).await;
        }
        if !deletions.is_empty() {
            self.delete_many(deletions).await;
        }
    }
}

/// Per-document reactive view handed out by
/// [`DocumentMapStore::doc_store`]. Setting or updating through a child
/// store runs the single-document update protocol on the owning store.
#[derive(Clone)]
pub struct DocumentStore<T: Document> {
    store: Arc<DocumentMapStore<T>>,
    doc_id: String,
}

impl<T: Document> DocumentStore<T> {
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn get(&self) -> Option<T> {
        self.store.get_doc(&self.doc_id)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.store.subscribe_doc(&self.doc_id)
    }

    pub async fn set(&self, doc: T) {
        self.store.update_doc(&self.doc_id, move |_| doc).await;
    }

    pub async fn update<F>(&self, updater: F)
    where
        F: FnOnce(T) -> T + Send,
    {
        self.store.update_doc(&self.doc_id, updater).await;
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "document_map_store_test.rs"]
mod document_map_store_test;
