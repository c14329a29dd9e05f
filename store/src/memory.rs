//! In-memory blob store implementation for testing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{BlobStore, StoreResult};

/// An in-memory blob store backed by a HashMap.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all saved blobs, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl BlobStore for MemoryStore {
    fn load(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.lock().get(name).cloned())
    }

    fn save(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        self.data.lock().insert(name.to_string(), data.to_vec());
        Ok(())
    }
}
