use std::collections::BTreeMap;

use dpp_types::{EventType, SectionHash};
use tokio::time::Instant;

/// A section hash waiting to be anchored on the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAnchor {
    pub entity_id: String,
    pub section: String,
    pub event_type: EventType,
    pub hash: SectionHash,
    /// Failed submissions so far.
    pub attempts: u32,
    pub next_attempt_at: Instant,
}

impl PendingAnchor {
    fn key(&self) -> (String, String) {
        (self.entity_id.clone(), self.section.clone())
    }
}

/// Retry queue of anchoring submissions, one slot per `(entity, section)`.
///
/// Enqueuing a newer hash for a section replaces the older one: only the
/// current hash of a section is worth anchoring.
#[derive(Debug, Default)]
pub struct AnchorQueue {
    pending: BTreeMap<(String, String), PendingAnchor>,
}

impl AnchorQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `hash` for immediate submission.
    pub fn enqueue(
        &mut self,
        entity_id: &str,
        section: &str,
        event_type: EventType,
        hash: SectionHash,
        now: Instant,
    ) {
        let anchor = PendingAnchor {
            entity_id: entity_id.to_string(),
            section: section.to_string(),
            event_type,
            hash,
            attempts: 0,
            next_attempt_at: now,
        };
        self.pending.insert(anchor.key(), anchor);
    }

    /// Remove and return every entry due at `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<PendingAnchor> {
        let due: Vec<_> = self
            .pending
            .iter()
            .filter(|(_, a)| a.next_attempt_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        due.into_iter()
            .filter_map(|k| self.pending.remove(&k))
            .collect()
    }

    /// Put a failed entry back, unless a newer hash was queued meanwhile.
    pub fn requeue(&mut self, anchor: PendingAnchor) {
        self.pending.entry(anchor.key()).or_insert(anchor);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, entity_id: &str, section: &str) -> bool {
        self.pending
            .contains_key(&(entity_id.to_string(), section.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn hash(b: u8) -> SectionHash {
        SectionHash::from_hash([b; 32])
    }

    #[test]
    fn newer_hash_replaces_older() {
        let now = Instant::now();
        let mut q = AnchorQueue::new();
        q.enqueue("P1", "log", EventType::Operation, hash(1), now);
        q.enqueue("P1", "log", EventType::Operation, hash(2), now);
        assert_eq!(q.len(), 1);
        assert_eq!(q.take_due(now)[0].hash, hash(2));
        assert!(q.is_empty());
    }

    #[test]
    fn only_due_entries_are_taken() {
        let now = Instant::now();
        let mut q = AnchorQueue::new();
        q.enqueue("P1", "a", EventType::Operation, hash(1), now);
        let mut later = q.take_due(now).remove(0);
        later.next_attempt_at = now + Duration::from_secs(60);
        q.requeue(later);
        q.enqueue("P2", "a", EventType::Installation, hash(2), now);

        let due = q.take_due(now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].entity_id, "P2");
        assert!(q.contains("P1", "a"));
    }

    #[test]
    fn requeue_does_not_clobber_fresh_hash() {
        let now = Instant::now();
        let mut q = AnchorQueue::new();
        q.enqueue("P1", "log", EventType::Operation, hash(1), now);
        let mut stale = q.take_due(now).remove(0);
        q.enqueue("P1", "log", EventType::Operation, hash(2), now);
        stale.attempts = 1;
        q.requeue(stale);
        assert_eq!(q.take_due(now)[0].hash, hash(2));
    }
}
