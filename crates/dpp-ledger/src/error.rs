use std::time::Duration;

/// Errors produced by ledger client calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// RPC endpoint unreachable or returned a transport failure.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within its bound.
    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),

    /// The ledger refused an anchoring submission.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// Event data could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl LedgerError {
    /// Transient failures are retried with backoff and never advance the cursor.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_) | Self::Io(_))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
