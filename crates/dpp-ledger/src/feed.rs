//! File-backed ledger: events are read from a newline-delimited JSON feed
//! and anchoring submissions are appended to a second NDJSON file.
//!
//! The feed is re-read on every poll, so an external process (an oracle
//! relay, or a test harness) can append events while the reconciler runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use dpp_types::{EventType, Position, RawEvent, SectionHash};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::{AnchorReceipt, LedgerClient};

#[derive(Debug, Serialize, Deserialize)]
struct AnchorLine {
    entity_id: String,
    event_type: EventType,
    hash: SectionHash,
    tx_id: String,
    submitted_at: chrono::DateTime<Utc>,
}

pub struct FeedLedger {
    source_id: String,
    events_path: PathBuf,
    anchors_path: PathBuf,
    append: Mutex<()>,
}

impl FeedLedger {
    pub fn new(
        source_id: impl Into<String>,
        events_path: impl Into<PathBuf>,
        anchors_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            events_path: events_path.into(),
            anchors_path: anchors_path.into(),
            append: Mutex::new(()),
        }
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    async fn read_lines(path: &Path) -> LedgerResult<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LedgerError::Unavailable(format!("{}: {e}", path.display()))),
        }
    }

    async fn read_anchors(&self) -> LedgerResult<Vec<AnchorLine>> {
        let Some(text) = Self::read_lines(&self.anchors_path).await? else {
            return Ok(Vec::new());
        };
        let mut anchors = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let anchor = serde_json::from_str(line)
                .map_err(|e| LedgerError::Decode(format!("{}: {e}", self.anchors_path.display())))?;
            anchors.push(anchor);
        }
        Ok(anchors)
    }
}

#[async_trait]
impl LedgerClient for FeedLedger {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch_after(&self, after: Option<Position>, limit: usize) -> LedgerResult<Vec<RawEvent>> {
        let Some(text) = Self::read_lines(&self.events_path).await? else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEvent>(line) {
                Ok(event) if event.position().follows(after) => events.push(event),
                Ok(_) => {}
                Err(e) => warn!(
                    path = %self.events_path.display(),
                    line = line_no + 1,
                    error = %e,
                    "skipping undecodable feed line"
                ),
            }
        }
        events.sort_by_key(RawEvent::position);
        events.truncate(limit);
        debug!(source = %self.source_id, count = events.len(), "feed polled");
        Ok(events)
    }

    async fn submit(
        &self,
        entity_id: &str,
        event_type: EventType,
        hash: SectionHash,
    ) -> LedgerResult<AnchorReceipt> {
        let _guard = self.append.lock().await;

        let anchors = self.read_anchors().await?;
        if let Some(existing) = anchors
            .iter()
            .find(|a| a.entity_id == entity_id && a.hash == hash)
        {
            return Ok(AnchorReceipt {
                tx_id: existing.tx_id.clone(),
                submitted_at: existing.submitted_at,
            });
        }

        let line = AnchorLine {
            entity_id: entity_id.to_string(),
            event_type,
            hash,
            tx_id: format!("feed-{}-{}", anchors.len() + 1, hash.short_hex()),
            submitted_at: Utc::now(),
        };
        let mut encoded =
            serde_json::to_string(&line).map_err(|e| LedgerError::Decode(e.to_string()))?;
        encoded.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.anchors_path)
            .await?;
        file.write_all(encoded.as_bytes()).await?;
        file.sync_data().await?;

        Ok(AnchorReceipt {
            tx_id: line.tx_id,
            submitted_at: line.submitted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_line(block: u64, id: &str) -> String {
        serde_json::to_string(&RawEvent {
            block,
            log_index: 0,
            entity_id: Some("P1".into()),
            event_id: Some(id.into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn reads_sorted_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let events = dir.path().join("events.ndjson");
        let text = format!("{}\nnot json\n\n{}\n", feed_line(5, "b"), feed_line(2, "a"));
        std::fs::write(&events, text).unwrap();

        let ledger = FeedLedger::new("feed", &events, dir.path().join("anchors.ndjson"));
        let all = ledger.fetch_after(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].event_id.as_deref(), Some("a"));

        let after = ledger.fetch_after(Some(Position::new(2, 0)), 10).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].block, 5);
    }

    #[tokio::test]
    async fn missing_feed_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FeedLedger::new("feed", dir.path().join("none"), dir.path().join("anchors"));
        assert!(ledger.fetch_after(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submissions_append_once_per_hash() {
        let dir = tempfile::tempdir().unwrap();
        let anchors = dir.path().join("anchors.ndjson");
        let ledger = FeedLedger::new("feed", dir.path().join("events"), &anchors);
        let hash = SectionHash::from_hash([9; 32]);

        let a = ledger.submit("P1", EventType::Operation, hash).await.unwrap();
        let b = ledger.submit("P1", EventType::Operation, hash).await.unwrap();
        assert_eq!(a.tx_id, b.tx_id);

        let other = SectionHash::from_hash([8; 32]);
        ledger.submit("P1", EventType::Installation, other).await.unwrap();

        let written = std::fs::read_to_string(&anchors).unwrap();
        assert_eq!(written.lines().count(), 2);
    }
}
