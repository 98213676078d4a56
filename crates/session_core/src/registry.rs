use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use shared::domain::{Document, DocumentId};
use tracing::{debug, warn};

struct Snapshot {
    generation: u64,
    documents: Arc<[Document]>,
}

/// Latest document list received from the backend.
///
/// Each refresh takes a ticket before it goes to the network; a response is
/// only applied if no later ticket has been applied already, so overlapping
/// refreshes settle on the most recently issued one. Readers always see a
/// whole list.
pub struct DocumentRegistry {
    issued: AtomicU64,
    current: RwLock<Snapshot>,
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self {
            issued: AtomicU64::new(0),
            current: RwLock::new(Snapshot {
                generation: 0,
                documents: Arc::from(Vec::new()),
            }),
        }
    }
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Arc<[Document]> {
        Arc::clone(
            &self
                .current
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .documents,
        )
    }

    pub fn find(&self, id: DocumentId) -> Option<Document> {
        self.list().iter().find(|doc| doc.id == id).cloned()
    }

    pub(crate) fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Swaps in `documents` fetched under `ticket`. Returns the applied list,
    /// or `None` when a newer refresh already landed.
    pub(crate) fn replace(&self, ticket: u64, documents: Vec<Document>) -> Option<Arc<[Document]>> {
        let documents: Arc<[Document]> = Arc::from(dedup_by_id(documents));
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if ticket < current.generation {
            debug!(
                "registry: dropping stale refresh ticket={ticket} applied={}",
                current.generation
            );
            return None;
        }
        current.generation = ticket;
        current.documents = Arc::clone(&documents);
        Some(documents)
    }
}

fn dedup_by_id(documents: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::with_capacity(documents.len());
    let total = documents.len();
    let unique: Vec<Document> = documents
        .into_iter()
        .filter(|doc| seen.insert(doc.id))
        .collect();
    if unique.len() != total {
        warn!(
            "registry: backend returned {} duplicate document id(s); keeping first occurrence",
            total - unique.len()
        );
    }
    unique
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn doc(id: i64, title: &str) -> Document {
        Document {
            id: DocumentId(id),
            title: title.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn replace_preserves_backend_order() {
        let registry = DocumentRegistry::new();
        let ticket = registry.issue();
        registry.replace(ticket, vec![doc(3, "c"), doc(1, "a"), doc(2, "b")]);

        let ids: Vec<i64> = registry.list().iter().map(|d| d.id.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(registry.find(DocumentId(1)).expect("found").title, "a");
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let registry = DocumentRegistry::new();
        let ticket = registry.issue();
        registry.replace(ticket, vec![doc(1, "first"), doc(1, "second"), doc(2, "b")]);

        let list = registry.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "first");
    }

    #[test]
    fn stale_refresh_does_not_overwrite_newer_snapshot() {
        let registry = DocumentRegistry::new();
        let older = registry.issue();
        let newer = registry.issue();

        assert!(registry.replace(newer, vec![doc(2, "new")]).is_some());
        assert!(registry.replace(older, vec![doc(1, "old")]).is_none());

        assert_eq!(registry.list()[0].title, "new");
    }
}
