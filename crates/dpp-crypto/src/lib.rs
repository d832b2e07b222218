//! Integrity primitives for panel passports.
//!
//! Provides the canonical JSON encoding, domain-separated BLAKE3 hashing of
//! sections and documents, commitment bookkeeping, and integrity verification.
//!
//! All digests wrap the `blake3` crate; nothing here is custom cryptography.

pub mod canonical;
pub mod error;
pub mod hasher;
pub mod integrity;

pub use canonical::{canonical_string, canonicalize, CANONICAL_FORM};
pub use error::{CryptoError, CryptoResult};
pub use hasher::{
    commit_all, commit_section, hash_document, hash_log_prefix, hash_section, ContentHasher,
};
pub use integrity::{verify_document, IntegrityReport, SectionIntegrity, SectionStatus};
