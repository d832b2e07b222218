use std::sync::Arc;
use std::time::Duration;

use dpp_types::{Position, RawEvent};
use tracing::debug;

use crate::error::LedgerResult;
use crate::traits::{with_timeout, LedgerClient};

/// Lazy, restartable view of a ledger's event stream.
///
/// Each [`next_batch`](Self::next_batch) fetches events strictly after the
/// last delivered position. Events a ledger re-delivers at or before that
/// position (overlapping polls) are dropped. The stream never ends; an empty
/// batch means nothing new yet.
pub struct Subscription {
    client: Arc<dyn LedgerClient>,
    position: Option<Position>,
    batch_size: usize,
    timeout: Duration,
}

impl Subscription {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        from: Option<Position>,
        batch_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            position: from,
            batch_size: batch_size.max(1),
            timeout,
        }
    }

    /// Position of the last delivered event.
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Restart delivery after `position`, e.g. the last committed cursor.
    pub fn rewind(&mut self, position: Option<Position>) {
        debug!(from = ?self.position, to = ?position, "subscription rewound");
        self.position = position;
    }

    /// Fetch the next batch. On error the position is unchanged, so the
    /// same events are fetched again on retry.
    pub async fn next_batch(&mut self) -> LedgerResult<Vec<RawEvent>> {
        let after = self.position;
        let fetched = with_timeout(
            self.timeout,
            self.client.fetch_after(after, self.batch_size),
        )
        .await?;

        let fresh: Vec<RawEvent> = fetched
            .into_iter()
            .filter(|e| e.position().follows(after))
            .collect();

        if let Some(last) = fresh.iter().map(RawEvent::position).max() {
            self.position = Some(last);
        }
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::memory::InMemoryLedger;

    fn event(block: u64, log_index: u64) -> RawEvent {
        RawEvent {
            block,
            log_index,
            event_id: Some(format!("e{block}-{log_index}")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn delivers_in_batches_and_resumes() {
        let ledger = Arc::new(InMemoryLedger::new("test"));
        for b in 1..=5 {
            ledger.push(event(b, 0));
        }

        let mut sub = Subscription::new(ledger.clone(), None, 2, Duration::from_secs(1));
        assert_eq!(sub.next_batch().await.unwrap().len(), 2);
        assert_eq!(sub.next_batch().await.unwrap().len(), 2);
        let last = sub.next_batch().await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(sub.position(), Some(Position::new(5, 0)));
        assert!(sub.next_batch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_keeps_position() {
        let ledger = Arc::new(InMemoryLedger::new("test"));
        ledger.push(event(1, 0));
        ledger.fail_next_fetches(1);

        let mut sub = Subscription::new(ledger.clone(), None, 10, Duration::from_secs(1));
        assert!(matches!(sub.next_batch().await, Err(LedgerError::Unavailable(_))));
        assert_eq!(sub.position(), None);
        assert_eq!(sub.next_batch().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rewind_replays_from_committed_position() {
        let ledger = Arc::new(InMemoryLedger::new("test"));
        for b in 1..=3 {
            ledger.push(event(b, 0));
        }
        let mut sub = Subscription::new(ledger.clone(), None, 10, Duration::from_secs(1));
        assert_eq!(sub.next_batch().await.unwrap().len(), 3);

        sub.rewind(Some(Position::new(1, 0)));
        let replay = sub.next_batch().await.unwrap();
        assert_eq!(
            replay.iter().map(RawEvent::position).collect::<Vec<_>>(),
            vec![Position::new(2, 0), Position::new(3, 0)]
        );
    }
}
