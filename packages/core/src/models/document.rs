//! Document Identity and Map Types
//!
//! Every record synchronized through Dayboard is a *document*: a server-owned
//! value with a globally unique string identifier, an owning user, and a
//! last-modified timestamp. The [`Document`] trait is the only thing the
//! generic store layer knows about a record; concrete variants (tasks,
//! tracked items, upgrade records) live alongside it in this module tree.
//!
//! # Invariants
//!
//! - A [`DocumentMap`] always maps an ID to the document carrying that same
//!   ID. The map is owned exclusively by one `DocumentMapStore` per variant
//!   and is only ever mutated through that store's operations.
//! - `parent_id` expresses hierarchy where a variant supports it (tasks);
//!   variants without hierarchy keep the default `None`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Mapping from document ID to document. Keys are unique, insertion order is
/// irrelevant, and every key equals the `id()` of its value.
pub type DocumentMap<T> = HashMap<String, T>;

/// Identity contract every synchronized record satisfies.
pub trait Document: Clone + Send + Sync + 'static {
    /// Globally unique identifier for this document.
    fn id(&self) -> &str;

    /// Owning user reference.
    fn user_id(&self) -> &str;

    /// Last-modified timestamp, maintained by the backend on writes.
    fn last_updated(&self) -> DateTime<Utc>;

    /// Parent document reference for hierarchical variants.
    fn parent_id(&self) -> Option<&str> {
        None
    }
}

/// Builds a [`DocumentMap`] from a flat document list, keyed by each
/// document's own ID. Used when converting backend response arrays into the
/// map shape the stores own.
pub fn map_from_docs<T: Document>(docs: Vec<T>) -> DocumentMap<T> {
    docs.into_iter()
        .map(|doc| (doc.id().to_string(), doc))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;

    #[test]
    fn test_map_from_docs_keys_by_id() {
        let a = Task::new("user-1", "First");
        let b = Task::new("user-1", "Second");
        let a_id = a.id.clone();
        let b_id = b.id.clone();

        let map = map_from_docs(vec![a, b]);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&a_id).map(|t| t.title.as_str()), Some("First"));
        assert_eq!(map.get(&b_id).map(|t| t.title.as_str()), Some("Second"));
        for (key, doc) in &map {
            assert_eq!(key, doc.id());
        }
    }
}
