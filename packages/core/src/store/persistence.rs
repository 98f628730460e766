//! Store Persistence Strategy
//!
//! A `DocumentMapStore` is constructed with an injected [`StorePersistence`]
//! implementation rather than requiring a subclass to fill in abstract
//! methods: the strategy supplies the local-cache mirror and the outbound
//! remote handoff for one document variant.
//!
//! The remote side is fire-and-forget from the store's perspective - the
//! strategy hands the batch to the outbound request queue, which owns
//! ordering, durability, and the combined-response apply.

use crate::db::CacheError;
use crate::models::{Document, DocumentMap};
use async_trait::async_trait;

/// One outbound mutation batch produced by a store operation.
#[derive(Debug, Clone)]
pub struct DocumentBatch<T> {
    pub insert: Vec<T>,
    pub update: Vec<T>,
    pub delete: Vec<T>,
}

impl<T> DocumentBatch<T> {
    pub fn insert(docs: Vec<T>) -> Self {
        Self {
            insert: docs,
            update: Vec::new(),
            delete: Vec::new(),
        }
    }

    pub fn update(docs: Vec<T>) -> Self {
        Self {
            insert: Vec::new(),
            update: docs,
            delete: Vec::new(),
        }
    }

    pub fn delete(docs: Vec<T>) -> Self {
        Self {
            insert: Vec::new(),
            update: Vec::new(),
            delete: docs,
        }
    }

    pub fn upsert(insert: Vec<T>, update: Vec<T>) -> Self {
        Self {
            insert,
            update,
            delete: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

impl<T> Default for DocumentBatch<T> {
    fn default() -> Self {
        Self {
            insert: Vec::new(),
            update: Vec::new(),
            delete: Vec::new(),
        }
    }
}

/// Persistence capabilities injected into a `DocumentMapStore`.
#[async_trait]
pub trait StorePersistence<T: Document>: Send + Sync {
    /// Mirrors the full map to the local cache.
    async fn write_cache(&self, map: &DocumentMap<T>) -> Result<(), CacheError>;

    /// Reads the mirrored map from the local cache, if one was persisted.
    async fn read_cache(&self) -> Result<Option<DocumentMap<T>>, CacheError>;

    /// Hands an outbound mutation batch to the request queue. Failures are
    /// handled (and logged) downstream; the store does not observe them.
    async fn persist_remote(&self, batch: DocumentBatch<T>);
}
