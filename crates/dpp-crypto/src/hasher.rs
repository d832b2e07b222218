use dpp_types::{Document, SectionCommitment, SectionContent, SectionHash, SectionRecord};
use serde_json::{Map, Value};

use crate::canonical::canonicalize;
use crate::error::{CryptoError, CryptoResult};

/// Domain-separated BLAKE3 hasher over canonical JSON.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a section and a whole document with identical canonical
/// bytes produce different digests.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for a single section payload. Anchored on the ledger.
    pub const SECTION: Self = Self {
        domain: "dpp-section-v1",
    };
    /// Hasher for a whole document (all section payloads keyed by name).
    pub const DOCUMENT: Self = Self {
        domain: "dpp-document-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> SectionHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        SectionHash::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash the canonical encoding of a JSON value.
    pub fn hash_value(&self, value: &Value) -> SectionHash {
        self.hash(&canonicalize(value))
    }

    /// Verify that `value` produces the expected digest.
    pub fn verify(&self, value: &Value, expected: &SectionHash) -> bool {
        self.hash_value(value) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Integrity hash of one section's current payload.
pub fn hash_section(section: &SectionRecord) -> CryptoResult<SectionHash> {
    let payload = section
        .payload()
        .map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(ContentHasher::SECTION.hash_value(&payload))
}

/// Integrity hash of every section payload in the document.
///
/// Warnings, commitments, and the store version are excluded.
pub fn hash_document(document: &Document) -> CryptoResult<SectionHash> {
    let mut sections = Map::new();
    for (name, section) in &document.sections {
        let payload = section
            .payload()
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        sections.insert(name.clone(), payload);
    }
    Ok(ContentHasher::DOCUMENT.hash_value(&Value::Object(sections)))
}

/// Recompute and record the commitment for `section_name`.
///
/// An unchanged hash keeps its anchoring state; a changed one resets to
/// pending but keeps the last anchored hash. Returns the current hash.
pub fn commit_section(document: &mut Document, section_name: &str) -> CryptoResult<SectionHash> {
    let section = document
        .section(section_name)
        .ok_or_else(|| CryptoError::SectionNotFound(section_name.to_string()))?;
    let hash = hash_section(section)?;

    match document.commitments.get_mut(section_name) {
        Some(existing) => existing.recommit(hash),
        None => {
            document.commitments.insert(
                section_name.to_string(),
                SectionCommitment::pending(section_name, hash),
            );
        }
    }
    Ok(hash)
}

/// Hash of the first `entries` events of a log section, as it was hashed
/// when the log had that length. `None` for non-log sections or when the
/// log is shorter than `entries`.
pub fn hash_log_prefix(section: &SectionRecord, entries: usize) -> CryptoResult<Option<SectionHash>> {
    let Some(events) = section.log_entries() else {
        return Ok(None);
    };
    if entries > events.len() {
        return Ok(None);
    }
    let prefix = SectionRecord::new(
        section.access_tier,
        SectionContent::Log(events[..entries].to_vec()),
    );
    hash_section(&prefix).map(Some)
}

/// Record commitments for every section. Used at registration.
pub fn commit_all(document: &mut Document) -> CryptoResult<()> {
    let names: Vec<String> = document.sections.keys().cloned().collect();
    for name in names {
        commit_section(document, &name)?;
    }
    Ok(())
}
