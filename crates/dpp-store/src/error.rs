/// Errors from document and cursor store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No document is registered under this id.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Registration attempted for an id that already has a document.
    #[error("document already exists: {0}")]
    AlreadyExists(String),

    /// A concurrent update changed the document between read and write.
    /// The caller should re-read and reapply.
    #[error("conflicting update on {entity_id}: expected version {expected}, found {found}")]
    Conflict {
        entity_id: String,
        expected: u64,
        found: u64,
    },

    /// The mutation function refused to apply; nothing was persisted.
    #[error("mutation rejected: {0}")]
    Mutation(String),

    /// The id cannot be mapped to a storage key.
    #[error("invalid entity id: {0:?}")]
    InvalidId(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
