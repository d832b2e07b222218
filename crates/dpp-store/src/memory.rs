use std::collections::HashMap;
use std::sync::RwLock;

use dpp_types::{Document, Position};

use crate::error::{StoreError, StoreResult};
use crate::traits::{CursorStore, DocumentStore, Mutation};

/// In-memory, HashMap-based document store.
///
/// Intended for tests and embedding. Updates hold the write lock for the whole
/// read-modify-write and swap in a fully mutated copy, so readers see either
/// the old or the new document.
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Number of registered documents.
    pub fn len(&self) -> usize {
        self.documents.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite a document bypassing the engine. Simulates out-of-band edits
    /// when exercising integrity checks.
    pub fn replace_raw(&self, document: Document) -> StoreResult<()> {
        let mut map = self.documents.write().map_err(|_| StoreError::LockPoisoned)?;
        map.insert(document.entity_id.clone(), document);
        Ok(())
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get(&self, entity_id: &str) -> StoreResult<Document> {
        let map = self.documents.read().map_err(|_| StoreError::LockPoisoned)?;
        map.get(entity_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(entity_id.to_string()))
    }

    fn insert(&self, mut document: Document) -> StoreResult<Document> {
        let mut map = self.documents.write().map_err(|_| StoreError::LockPoisoned)?;
        if map.contains_key(&document.entity_id) {
            return Err(StoreError::AlreadyExists(document.entity_id));
        }
        document.version = 1;
        map.insert(document.entity_id.clone(), document.clone());
        Ok(document)
    }

    fn atomic_update(&self, entity_id: &str, mutation: &mut Mutation<'_>) -> StoreResult<Document> {
        let mut map = self.documents.write().map_err(|_| StoreError::LockPoisoned)?;
        let current = map
            .get(entity_id)
            .ok_or_else(|| StoreError::NotFound(entity_id.to_string()))?;

        let mut next = current.clone();
        mutation(&mut next)?;
        next.entity_id = current.entity_id.clone();
        next.version = current.version + 1;

        map.insert(entity_id.to_string(), next.clone());
        Ok(next)
    }

    fn list_ids(&self) -> StoreResult<Vec<String>> {
        let map = self.documents.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut ids: Vec<String> = map.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn exists(&self, entity_id: &str) -> StoreResult<bool> {
        let map = self.documents.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.contains_key(entity_id))
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("document_count", &self.len())
            .finish()
    }
}

/// In-memory cursor positions keyed by source id.
#[derive(Debug, Default)]
pub struct InMemoryCursorStore {
    positions: RwLock<HashMap<String, Position>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for InMemoryCursorStore {
    fn load(&self, source_id: &str) -> StoreResult<Option<Position>> {
        let map = self.positions.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(source_id).copied())
    }

    fn save(&self, source_id: &str, position: Position) -> StoreResult<()> {
        let mut map = self.positions.write().map_err(|_| StoreError::LockPoisoned)?;
        map.insert(source_id.to_string(), position);
        Ok(())
    }
}
