use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use dpp_types::{EventType, Position, RawEvent, SectionHash};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::{AnchorReceipt, LedgerClient};

/// One accepted anchoring submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorSubmission {
    pub entity_id: String,
    pub event_type: EventType,
    pub hash: SectionHash,
    pub receipt: AnchorReceipt,
}

/// In-memory ledger for tests, local demos, and embedding.
///
/// Holds an ordered event log and records anchoring submissions. Fault
/// injection knobs simulate an unreachable RPC endpoint and failing
/// submissions.
pub struct InMemoryLedger {
    source_id: String,
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    events: Vec<RawEvent>,
    submissions: Vec<AnchorSubmission>,
    fetch_failures: u32,
    submit_failures: u32,
    reject_submissions: bool,
    submit_attempts: u64,
}

impl InMemoryLedger {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            inner: RwLock::new(LedgerState::default()),
        }
    }

    /// Append an event, keeping the log ordered by position.
    pub fn push(&self, event: RawEvent) {
        if let Ok(mut state) = self.inner.write() {
            let at = state
                .events
                .partition_point(|e| e.position() <= event.position());
            state.events.insert(at, event);
        }
    }

    /// Make the next `n` fetches fail as if the RPC endpoint were down.
    pub fn fail_next_fetches(&self, n: u32) {
        if let Ok(mut state) = self.inner.write() {
            state.fetch_failures = n;
        }
    }

    /// Make the next `n` submissions fail.
    pub fn fail_next_submissions(&self, n: u32) {
        if let Ok(mut state) = self.inner.write() {
            state.submit_failures = n;
        }
    }

    /// Reject every submission until switched off.
    pub fn reject_all_submissions(&self, reject: bool) {
        if let Ok(mut state) = self.inner.write() {
            state.reject_submissions = reject;
        }
    }

    pub fn submissions(&self) -> Vec<AnchorSubmission> {
        self.inner
            .read()
            .map(|s| s.submissions.clone())
            .unwrap_or_default()
    }

    /// Number of `submit` calls, successful or not.
    pub fn submit_attempts(&self) -> u64 {
        self.inner.read().map(|s| s.submit_attempts).unwrap_or(0)
    }

    pub fn event_count(&self) -> usize {
        self.inner.read().map(|s| s.events.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch_after(&self, after: Option<Position>, limit: usize) -> LedgerResult<Vec<RawEvent>> {
        let mut state = self
            .inner
            .write()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".into()))?;

        if state.fetch_failures > 0 {
            state.fetch_failures -= 1;
            return Err(LedgerError::Unavailable("injected fetch failure".into()));
        }

        Ok(state
            .events
            .iter()
            .filter(|e| e.position().follows(after))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn submit(
        &self,
        entity_id: &str,
        event_type: EventType,
        hash: SectionHash,
    ) -> LedgerResult<AnchorReceipt> {
        let mut state = self
            .inner
            .write()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".into()))?;
        state.submit_attempts += 1;

        if state.reject_submissions {
            return Err(LedgerError::Rejected("submissions disabled".into()));
        }
        if state.submit_failures > 0 {
            state.submit_failures -= 1;
            return Err(LedgerError::Unavailable("injected submit failure".into()));
        }

        if let Some(existing) = state
            .submissions
            .iter()
            .find(|s| s.entity_id == entity_id && s.hash == hash)
        {
            return Ok(existing.receipt.clone());
        }

        let receipt = AnchorReceipt {
            tx_id: format!("mem-{}-{}", state.submissions.len() + 1, hash.short_hex()),
            submitted_at: Utc::now(),
        };
        state.submissions.push(AnchorSubmission {
            entity_id: entity_id.to_string(),
            event_type,
            hash,
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }
}
