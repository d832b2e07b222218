use dpp_types::{Document, SectionCommitment, SectionHash, SectionKind, SectionRecord};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::hasher::{hash_document, hash_log_prefix, hash_section};

/// Verification outcome for one section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// Hash matches a commitment the ledger acknowledged.
    Verified,
    /// Hash matches the recorded commitment, anchoring not yet confirmed.
    /// Any earlier anchored state is consistent with the current payload.
    Pending,
    /// No commitment recorded for this section.
    Uncommitted,
    /// Recomputed hash disagrees with the recorded one, or the section vanished.
    Mismatch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionIntegrity {
    pub section: String,
    pub computed: Option<SectionHash>,
    pub recorded: Option<SectionHash>,
    /// Last hash the ledger acknowledged, which may predate `recorded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchored_hash: Option<SectionHash>,
    pub anchored: bool,
    pub status: SectionStatus,
}

/// Result of re-deriving every hash of a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub entity_id: String,
    pub document_hash: SectionHash,
    pub sections: Vec<SectionIntegrity>,
}

impl IntegrityReport {
    pub fn is_intact(&self) -> bool {
        self.sections
            .iter()
            .all(|s| s.status != SectionStatus::Mismatch)
    }

    pub fn mismatched_sections(&self) -> Vec<String> {
        self.sections
            .iter()
            .filter(|s| s.status == SectionStatus::Mismatch)
            .map(|s| s.section.clone())
            .collect()
    }

    /// Turn any mismatch into [`CryptoError::IntegrityMismatch`].
    pub fn ensure_intact(&self) -> CryptoResult<()> {
        if self.is_intact() {
            return Ok(());
        }
        Err(CryptoError::IntegrityMismatch {
            entity_id: self.entity_id.clone(),
            sections: self.mismatched_sections(),
        })
    }
}

/// Recompute every section hash from the stored payload and compare it with
/// the recorded commitments and the last anchored hashes.
///
/// A section whose latest commitment is not anchored yet is still checked
/// against its anchored history: a static section must hash to its anchored
/// value, and a log must still start with the entries that were anchored.
/// Status sections are rewritten by events, so only the recorded hash is
/// checked for them.
///
/// The report is returned even when sections mismatch; callers decide how
/// loudly to fail via [`IntegrityReport::ensure_intact`].
pub fn verify_document(document: &Document) -> CryptoResult<IntegrityReport> {
    let mut sections = Vec::with_capacity(document.sections.len());

    for (name, section) in &document.sections {
        let computed = hash_section(section)?;
        let commitment = document.commitments.get(name);
        let status = match commitment {
            None => SectionStatus::Uncommitted,
            Some(c) if c.hash != computed => SectionStatus::Mismatch,
            Some(c) if c.anchored && c.anchored_hash.map_or(true, |a| a == computed) => {
                SectionStatus::Verified
            }
            Some(c) if anchored_history_holds(section, c, computed)? => SectionStatus::Pending,
            Some(_) => SectionStatus::Mismatch,
        };
        sections.push(SectionIntegrity {
            section: name.clone(),
            computed: Some(computed),
            recorded: commitment.map(|c| c.hash),
            anchored_hash: commitment.and_then(|c| c.anchored_hash),
            anchored: commitment.is_some_and(|c| c.anchored),
            status,
        });
    }

    for (name, commitment) in &document.commitments {
        if !document.sections.contains_key(name) {
            sections.push(SectionIntegrity {
                section: name.clone(),
                computed: None,
                recorded: Some(commitment.hash),
                anchored_hash: commitment.anchored_hash,
                anchored: commitment.anchored,
                status: SectionStatus::Mismatch,
            });
        }
    }

    let report = IntegrityReport {
        entity_id: document.entity_id.clone(),
        document_hash: hash_document(document)?,
        sections,
    };

    if !report.is_intact() {
        tracing::error!(
            entity_id = %report.entity_id,
            sections = ?report.mismatched_sections(),
            "integrity mismatch: stored payload disagrees with recorded commitment"
        );
    }

    Ok(report)
}

fn anchored_history_holds(
    section: &SectionRecord,
    commitment: &SectionCommitment,
    computed: SectionHash,
) -> CryptoResult<bool> {
    let Some(anchored) = commitment.anchored_hash else {
        return Ok(true);
    };
    Ok(match section.kind() {
        SectionKind::Static => anchored == computed,
        SectionKind::Log => match commitment.anchored_entries {
            Some(entries) => hash_log_prefix(section, entries)? == Some(anchored),
            None => true,
        },
        SectionKind::Status => true,
    })
}
