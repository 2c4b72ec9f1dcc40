//
// store.rs
//
// Concurrent table of per-file item sets
//

use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

use crate::items::FileItemSet;

/// File URI -> latest item set.
///
/// `put` replaces the whole `Arc`, so a reader holding an earlier `get`
/// keeps a consistent snapshot while later readers see the new set.
#[derive(Debug, Default)]
pub struct FileItemStore {
    inner: DashMap<Url, Arc<FileItemSet>>,
}

impl FileItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<FileItemSet>> {
        self.inner.get(uri).map(|entry| Arc::clone(entry.value()))
    }

    pub fn put(&self, uri: Url, set: FileItemSet) -> Arc<FileItemSet> {
        let set = Arc::new(set);
        self.inner.insert(uri, Arc::clone(&set));
        set
    }

    pub fn remove(&self, uri: &Url) -> Option<Arc<FileItemSet>> {
        self.inner.remove(uri).map(|(_, set)| set)
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.inner.contains_key(uri)
    }

    pub fn uris(&self) -> Vec<Url> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
