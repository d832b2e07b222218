//! Ledger boundary for the panel passport reconciler.
//!
//! The reconciler reads fault events emitted by the passport contract and
//! writes section hashes back for anchoring. Both directions go through
//! [`LedgerClient`]; [`Subscription`] turns it into a restartable,
//! position-tracking stream.
//!
//! # Backends
//!
//! - [`InMemoryLedger`]: ordered in-process log with fault injection
//! - [`FeedLedger`]: NDJSON event feed plus an NDJSON anchor journal

pub mod error;
pub mod feed;
pub mod memory;
pub mod subscription;
pub mod traits;

pub use error::{LedgerError, LedgerResult};
pub use feed::FeedLedger;
pub use memory::{AnchorSubmission, InMemoryLedger};
pub use subscription::Subscription;
pub use traits::{with_timeout, AnchorReceipt, LedgerClient};
