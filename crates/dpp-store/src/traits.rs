use dpp_types::{Document, Position};

use crate::error::StoreResult;

/// Closure applied by [`DocumentStore::atomic_update`].
///
/// Returning an error aborts the update; nothing is persisted. The closure may
/// run more than once if the caller retries after a conflict.
pub type Mutation<'a> = dyn FnMut(&mut Document) -> StoreResult<()> + 'a;

/// Keyed, atomically updatable storage for passport documents.
///
/// All implementations must satisfy these invariants:
/// - A reader never observes a partially applied mutation.
/// - Mutations on the same entity are serialized; a lost race surfaces as
///   [`StoreError::Conflict`](crate::StoreError::Conflict), never as a silently
///   dropped update.
/// - `version` increases by one on every committed update and is owned by the
///   store; mutations cannot change it or the entity id.
/// - Documents are never deleted.
pub trait DocumentStore: Send + Sync {
    /// Read the current document. Fails with `NotFound` for unknown ids.
    fn get(&self, entity_id: &str) -> StoreResult<Document>;

    /// Register a new document. Fails with `AlreadyExists` if the id is taken.
    fn insert(&self, document: Document) -> StoreResult<Document>;

    /// Apply `mutation` to the current document and persist the result as a
    /// single indivisible operation. Returns the committed document.
    fn atomic_update(&self, entity_id: &str, mutation: &mut Mutation<'_>) -> StoreResult<Document>;

    /// All registered ids, sorted.
    fn list_ids(&self) -> StoreResult<Vec<String>>;

    fn exists(&self, entity_id: &str) -> StoreResult<bool> {
        Ok(self.list_ids()?.iter().any(|id| id == entity_id))
    }
}

/// Durable ingestion progress per ledger source.
pub trait CursorStore: Send + Sync {
    /// Last committed position, or `None` if the source was never consumed.
    fn load(&self, source_id: &str) -> StoreResult<Option<Position>>;

    /// Persist `position` as the last committed position.
    fn save(&self, source_id: &str, position: Position) -> StoreResult<()>;
}
