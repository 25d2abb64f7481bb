//! Query front end over a persisted index.

use crate::embedding::Embedder;
use crate::error::IndexResult;
use crate::index::VectorIndex;
use crate::storage::IndexStorage;
use crate::types::SearchHit;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, info};

/// Shared, read-only search entry point.
///
/// Construction does no I/O. The index is loaded on first use, exactly once
/// even when several threads search concurrently; a failed load is not cached
/// and will be retried by the next call.
pub struct SearchHandle {
    storage: Arc<dyn IndexStorage>,
    embedder: Arc<dyn Embedder>,
    index: OnceLock<VectorIndex>,
    init_guard: Mutex<()>,
    #[cfg(test)]
    loads: AtomicUsize,
}

impl SearchHandle {
    pub fn new(storage: Arc<dyn IndexStorage>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            storage,
            embedder,
            index: OnceLock::new(),
            init_guard: Mutex::new(()),
            #[cfg(test)]
            loads: AtomicUsize::new(0),
        }
    }

    /// The loaded index, loading it if needed. A missing index is empty.
    pub fn index(&self) -> IndexResult<&VectorIndex> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }

        let _guard = self.init_guard.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = self.index.get() {
            return Ok(index);
        }

        let loaded = match self.storage.load_index()? {
            Some(index) => {
                index.ensure_compatible(self.embedder.as_ref())?;
                info!(
                    storage = %self.storage.describe(),
                    chunks = index.len(),
                    documents = index.document_count(),
                    "loaded search index"
                );
                index
            }
            None => {
                info!(storage = %self.storage.describe(), "no index found, serving an empty index");
                VectorIndex::for_embedder(self.embedder.as_ref())
            }
        };
        #[cfg(test)]
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.index.get_or_init(|| loaded))
    }

    /// Top `k` chunks for a free-text query. An empty index, a blank query or
    /// `k == 0` give an empty list.
    pub fn search(&self, query: &str, k: usize) -> IndexResult<Vec<SearchHit>> {
        let index = self.index()?;
        let query = query.trim();
        if k == 0 || query.is_empty() || index.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query)?;
        let hits = index.search(&vector, k);
        debug!(query, k, hits = hits.len(), "search complete");
        Ok(hits)
    }

    /// How many times the index has been loaded from storage.
    #[cfg(test)]
    fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}
