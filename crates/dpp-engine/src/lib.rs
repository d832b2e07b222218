//! Reconciliation engine for panel passports.
//!
//! Consumes fault events from a [`LedgerClient`](dpp_ledger::LedgerClient),
//! folds them into passport documents held by a
//! [`DocumentStore`](dpp_store::DocumentStore), and anchors the resulting
//! section hashes back on the ledger.
//!
//! # Components
//!
//! - [`Reconciler`]: the polling state machine (`Idle → Fetching → Applying → Anchoring`)
//! - [`EventCursor`]: durable, strictly forward ledger position
//! - [`AnchorQueue`]: per-section anchoring retries with backoff
//! - [`project`]: tier-based disclosure, shared with the read API
//!
//! # Guarantees
//!
//! 1. Re-delivering an event never changes a document twice.
//! 2. The cursor is saved after the document commit it covers; a crash in
//!    between is repaired by replay.
//! 3. Anchoring failures never hold back ingestion.
//! 4. A projection at a lower tier is always contained in a higher one.

pub mod anchoring;
pub mod backoff;
pub mod config;
pub mod cursor;
pub mod disclosure;
pub mod engine;
pub mod error;
pub mod projector;
pub mod validation;

pub use anchoring::{AnchorQueue, PendingAnchor};
pub use backoff::Backoff;
pub use config::{BackoffConfig, EngineConfig};
pub use cursor::EventCursor;
pub use disclosure::{disclose, verify_entity};
pub use engine::{ApplyOutcome, CycleReport, EngineState, EngineStatus, Reconciler};
pub use error::{EngineError, EngineResult};
pub use projector::{project, ProjectedSection, Projection};
pub use validation::{validate, ValidatedEvent, ValidationFailure};
