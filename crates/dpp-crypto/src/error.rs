/// Errors from canonicalization, hashing, and integrity checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A recomputed section hash disagrees with its recorded commitment.
    #[error("integrity mismatch for {entity_id}: sections {sections:?}")]
    IntegrityMismatch {
        entity_id: String,
        sections: Vec<String>,
    },

    #[error("section not found: {0}")]
    SectionNotFound(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
