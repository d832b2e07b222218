use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dpp_types::{EventType, Position, RawEvent, SectionHash};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Acknowledgement of an anchoring submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub tx_id: String,
    pub submitted_at: DateTime<Utc>,
}

/// Read and anchor boundary over the contract's event log.
///
/// `fetch_after` returns events strictly after `after`, ordered by
/// `(block, log_index)`, at most `limit` of them. An empty result means
/// "nothing new yet", never "end of stream".
///
/// `submit` must be idempotent from the caller's perspective: resubmitting an
/// already anchored hash may not corrupt ledger state.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Stable identifier of the event source (chain + contract), used as the cursor key.
    fn source_id(&self) -> &str;

    async fn fetch_after(&self, after: Option<Position>, limit: usize) -> LedgerResult<Vec<RawEvent>>;

    async fn submit(
        &self,
        entity_id: &str,
        event_type: EventType,
        hash: SectionHash,
    ) -> LedgerResult<AnchorReceipt>;
}

/// Run a ledger call with an upper bound on its duration.
///
/// An elapsed bound becomes [`LedgerError::Timeout`], which is retryable.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_call_times_out() {
        let result: LedgerResult<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(LedgerError::Timeout(Duration::from_millis(10))));
        assert!(result.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
