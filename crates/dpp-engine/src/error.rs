use dpp_crypto::CryptoError;
use dpp_ledger::LedgerError;
use dpp_store::StoreError;
use dpp_types::Position;

/// Errors surfaced by the reconciliation engine and the disclosure helpers.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No document is registered under this id.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// A ledger event is missing required fields or carries invalid values.
    #[error("invalid event at {position}: {reason}")]
    Validation { position: Position, reason: String },

    /// The ledger could not be read. Retried with backoff; the cursor stays put.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Anchoring a section hash failed. Never blocks ingestion.
    #[error("anchoring {section} of {entity_id} failed: {reason}")]
    AnchoringFailure {
        entity_id: String,
        section: String,
        reason: String,
    },

    /// Store updates kept losing races after all retries.
    #[error("update of {entity_id} still conflicting after {attempts} attempts")]
    Conflict { entity_id: String, attempts: u32 },

    #[error("integrity mismatch for {entity_id}: sections {sections:?}")]
    IntegrityMismatch {
        entity_id: String,
        sections: Vec<String>,
    },

    /// The cursor was asked to move backwards or stand still.
    #[error("out-of-order position {attempted} after {current}")]
    OutOfOrder {
        current: Position,
        attempted: Position,
    },

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Errors that a later cycle may get past on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LedgerUnavailable(_) | Self::Conflict { .. } | Self::Store(_) | Self::AnchoringFailure { .. }
        )
    }

    /// Errors that stop the engine for its source.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfOrder { .. } | Self::IntegrityMismatch { .. })
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) | StoreError::InvalidId(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

impl From<CryptoError> for EngineError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::IntegrityMismatch { entity_id, sections } => {
                Self::IntegrityMismatch { entity_id, sections }
            }
            other => Self::Crypto(other),
        }
    }
}

impl From<LedgerError> for EngineError {
    fn from(e: LedgerError) -> Self {
        Self::LedgerUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
