use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use crate::logging::INDEX;
use crate::page_index::PageIndex;

/// Identifies one page of one loaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub doc_id: String,
    pub page: usize,
}

impl PageKey {
    pub fn new(doc_id: impl Into<String>, page: usize) -> Self {
        PageKey {
            doc_id: doc_id.into(),
            page,
        }
    }
}

/// Bounded least-recently-used cache of page indices. Owned by the caller;
/// the engine never caches on its own.
#[derive(Debug)]
pub struct PageIndexCache {
    capacity: usize,
    // Insertion order doubles as recency: the back is the most recent.
    entries: IndexMap<PageKey, Arc<PageIndex>>,
}

impl PageIndexCache {
    pub fn new(capacity: usize) -> Self {
        PageIndexCache {
            capacity: capacity.max(1),
            entries: IndexMap::with_capacity(capacity.max(1)),
        }
    }

    pub fn get(&mut self, key: &PageKey) -> Option<Arc<PageIndex>> {
        let index = self.entries.shift_remove(key)?;
        self.entries.insert(key.clone(), Arc::clone(&index));
        Some(index)
    }

    pub fn insert(&mut self, key: PageKey, index: PageIndex) -> Arc<PageIndex> {
        let index = Arc::new(index);
        self.entries.shift_remove(&key);
        self.entries.insert(key, Arc::clone(&index));
        while self.entries.len() > self.capacity {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                trace!(target: INDEX, doc = %evicted.doc_id, page = evicted.page, "Evicted page index");
            }
        }
        index
    }

    pub fn get_or_build<F>(&mut self, key: PageKey, build: F) -> Arc<PageIndex>
    where
        F: FnOnce() -> PageIndex,
    {
        match self.get(&key) {
            Some(index) => index,
            None => self.insert(key, build()),
        }
    }

    /// Drop every page belonging to `doc_id`.
    pub fn evict_document(&mut self, doc_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.doc_id != doc_id);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
