use parking_lot::RwLock;
use std::sync::Arc;

use crate::index::SearchIndex;

/// Shared handle to the currently served index. Readers take an `Arc`
/// snapshot and never block on a rebuild; `replace` swaps in a complete index.
#[derive(Clone)]
pub struct IndexHandle {
    inner: Arc<RwLock<Arc<SearchIndex>>>,
}

impl IndexHandle {
    pub fn new(index: SearchIndex) -> Self {
        Self { inner: Arc::new(RwLock::new(Arc::new(index))) }
    }

    pub fn current(&self) -> Arc<SearchIndex> {
        self.inner.read().clone()
    }

    /// Returns the index that was being served before the swap.
    pub fn replace(&self, index: SearchIndex) -> Arc<SearchIndex> {
        let next = Arc::new(index);
        std::mem::replace(&mut *self.inner.write(), next)
    }
}
