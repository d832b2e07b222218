use std::sync::Arc;

use dpp_store::CursorStore;
use dpp_types::Position;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

/// Durable ingestion progress for one ledger source.
///
/// The position only moves forward. Each advance is persisted before it
/// becomes visible, so a failed save leaves the cursor where it was and the
/// event is replayed (idempotently) on the next cycle.
pub struct EventCursor {
    source_id: String,
    position: Option<Position>,
    store: Arc<dyn CursorStore>,
}

impl EventCursor {
    /// Load the last committed position for `source_id`.
    pub fn load(source_id: impl Into<String>, store: Arc<dyn CursorStore>) -> EngineResult<Self> {
        let source_id = source_id.into();
        let position = store.load(&source_id)?;
        info!(source = %source_id, position = ?position, "cursor loaded");
        Ok(Self {
            source_id,
            position,
            store,
        })
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Fails with `OutOfOrder` unless `next` is strictly after the current
    /// position. Nothing is persisted.
    pub fn check_next(&self, next: Position) -> EngineResult<()> {
        match self.position {
            Some(current) if !next.follows(Some(current)) => Err(EngineError::OutOfOrder {
                current,
                attempted: next,
            }),
            _ => Ok(()),
        }
    }

    /// Move past `next`, with the same ordering rule as [`check_next`](Self::check_next).
    pub fn advance(&mut self, next: Position) -> EngineResult<()> {
        self.check_next(next)?;
        self.store.save(&self.source_id, next)?;
        self.position = Some(next);
        debug!(source = %self.source_id, position = %next, "cursor advanced");
        Ok(())
    }
}
