//! Document and cursor storage for the panel passport reconciler.
//!
//! # Boundaries
//!
//! - [`DocumentStore`]: keyed passports with an atomic read-modify-write
//! - [`CursorStore`]: last committed ledger position per source
//!
//! # Backends
//!
//! - [`InMemoryDocumentStore`] / [`InMemoryCursorStore`]: tests and embedding
//! - [`FileDocumentStore`] / [`FileCursorStore`]: JSON files with atomic rename
//!
//! # Design Rules
//!
//! 1. Documents are created by registration and never deleted.
//! 2. Every update is all-or-nothing; a failed mutation persists nothing.
//! 3. Per-entity updates are serialized; races surface as `Conflict`.
//! 4. Reads need no locking beyond a single `get`.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::{FileCursorStore, FileDocumentStore};
pub use memory::{InMemoryCursorStore, InMemoryDocumentStore};
pub use traits::{CursorStore, DocumentStore, Mutation};
