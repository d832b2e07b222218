//! Foundation types for the panel passport reconciler.
//!
//! Every other `dpp-*` crate depends on `dpp-types`.
//!
//! # Key Types
//!
//! - [`Document`]: the passport of one asset, a map of named sections
//! - [`SectionRecord`]: a section with its disclosure [`Tier`]
//! - [`FaultEvent`]: validated log entry, [`RawEvent`]: undecided ledger input
//! - [`Position`]: location in the ledger's `(block, log_index)` order
//! - [`SectionHash`] / [`SectionCommitment`]: integrity digests and their anchoring state

pub mod document;
pub mod error;
pub mod event;
pub mod hash;
pub mod position;
pub mod section;
pub mod tier;

pub use document::{
    Document, DocumentWarning, SectionCommitment, WarningKind, DIGITAL_TWIN_STATUS,
};
pub use error::TypeError;
pub use event::{EventType, FaultEvent, RawEvent, INSTALLATION_LOG, OPERATION_LOG};
pub use hash::SectionHash;
pub use position::Position;
pub use section::{SectionContent, SectionKind, SectionRecord};
pub use tier::Tier;
