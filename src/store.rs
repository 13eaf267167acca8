//! Tree persistence seam.
//!
//! Storage engines live outside this crate; they implement [`TreeStore`]. The
//! in-memory store keeps every tree as its JSON document, so a round trip through
//! it exercises the same serde path a real backend would.

use std::collections::BTreeMap;

use crate::error::ForestError;
use crate::forest::TreeId;
use crate::tree::ProgressTree;

/// CRUD access to stored trees. Implementations know nothing about layout;
/// coordinates are recomputed after loading.
pub trait TreeStore {
    fn load(&self, id: TreeId) -> Result<Option<ProgressTree>, ForestError>;

    /// Inserts or replaces the tree stored under `id`.
    fn save(&mut self, id: TreeId, tree: &ProgressTree) -> Result<(), ForestError>;

    /// Returns false when nothing was stored under `id`.
    fn delete(&mut self, id: TreeId) -> Result<bool, ForestError>;

    fn ids(&self) -> Result<Vec<TreeId>, ForestError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: BTreeMap<TreeId, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Raw JSON stored for `id`.
    pub fn document(&self, id: TreeId) -> Option<&str> {
        self.documents.get(&id).map(String::as_str)
    }
}

impl TreeStore for MemoryStore {
    fn load(&self, id: TreeId) -> Result<Option<ProgressTree>, ForestError> {
        self.documents
            .get(&id)
            .map(|doc| serde_json::from_str(doc).map_err(ForestError::from))
            .transpose()
    }

    fn save(&mut self, id: TreeId, tree: &ProgressTree) -> Result<(), ForestError> {
        let doc = serde_json::to_string(tree)?;
        self.documents.insert(id, doc);
        Ok(())
    }

    fn delete(&mut self, id: TreeId) -> Result<bool, ForestError> {
        Ok(self.documents.remove(&id).is_some())
    }

    fn ids(&self) -> Result<Vec<TreeId>, ForestError> {
        Ok(self.documents.keys().copied().collect())
    }
}
