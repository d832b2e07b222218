use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::event::{FaultEvent, INSTALLATION_LOG, OPERATION_LOG};
use crate::hash::SectionHash;
use crate::position::Position;
use crate::section::{SectionContent, SectionRecord};
use crate::tier::Tier;

/// Default name of the derived digital-twin status section.
pub const DIGITAL_TWIN_STATUS: &str = "digital_twin_status";

/// Field carrying a section's tier in registration passport files.
const ACCESS_TIER_FIELD: &str = "Access_Tier";

/// Recorded integrity commitment for one section.
///
/// `hash` follows every committed mutation. `anchored_hash` only moves when
/// the ledger acknowledges a submission, so it survives later recommits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCommitment {
    pub section_name: String,
    pub hash: SectionHash,
    /// `true` once the ledger acknowledged a submission of `hash`.
    pub anchored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchored_at: Option<DateTime<Utc>>,
    /// Last hash of this section the ledger acknowledged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchored_hash: Option<SectionHash>,
    /// Log length when `anchored_hash` was taken; `None` for non-log sections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchored_entries: Option<usize>,
}

impl SectionCommitment {
    pub fn pending(section_name: impl Into<String>, hash: SectionHash) -> Self {
        Self {
            section_name: section_name.into(),
            hash,
            anchored: false,
            anchored_at: None,
            anchored_hash: None,
            anchored_entries: None,
        }
    }

    /// Replace the current hash, keeping the last anchored one.
    pub fn recommit(&mut self, hash: SectionHash) {
        if self.hash != hash {
            self.hash = hash;
            self.anchored = false;
        }
    }

    /// Record that the ledger acknowledged `hash`.
    pub fn mark_anchored(&mut self, at: DateTime<Utc>, entries: Option<usize>) {
        self.anchored = true;
        self.anchored_at = Some(at);
        self.anchored_hash = Some(self.hash);
        self.anchored_entries = entries;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A ledger event targeting this document failed validation and was skipped.
    Validation,
    /// Anchoring of a section hash exhausted its retries.
    AnchoringPending,
}

/// Non-fatal condition attached to a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentWarning {
    pub kind: WarningKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub raised_at: DateTime<Utc>,
}

impl DocumentWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            section: None,
            position: None,
            event_id: None,
            raised_at: Utc::now(),
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    fn same_subject(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.section == other.section
            && self.position == other.position
            && self.event_id == other.event_id
    }
}

/// The passport of one physical asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub entity_id: String,
    /// Bumped by the document store on every committed update.
    #[serde(default)]
    pub version: u64,
    pub sections: BTreeMap<String, SectionRecord>,
    #[serde(default)]
    pub commitments: BTreeMap<String, SectionCommitment>,
    #[serde(default)]
    pub warnings: Vec<DocumentWarning>,
}

impl Document {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            version: 0,
            sections: BTreeMap::new(),
            commitments: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_section(mut self, name: impl Into<String>, section: SectionRecord) -> Self {
        self.sections.insert(name.into(), section);
        self
    }

    pub fn section(&self, name: &str) -> Option<&SectionRecord> {
        self.sections.get(name)
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut SectionRecord> {
        self.sections.get_mut(name)
    }

    /// Entries of a log section, empty if the section is missing or not a log.
    pub fn log(&self, name: &str) -> &[FaultEvent] {
        self.sections
            .get(name)
            .and_then(SectionRecord::log_entries)
            .unwrap_or(&[])
    }

    /// Attach a warning unless an equivalent one is already present.
    ///
    /// Returns `true` if the warning was added.
    pub fn push_warning(&mut self, warning: DocumentWarning) -> bool {
        if self.warnings.iter().any(|w| w.same_subject(&warning)) {
            return false;
        }
        self.warnings.push(warning);
        true
    }

    /// Remove warnings of `kind` for `section`. Returns how many were removed.
    pub fn clear_warnings(&mut self, kind: WarningKind, section: &str) -> usize {
        let before = self.warnings.len();
        self.warnings
            .retain(|w| !(w.kind == kind && w.section.as_deref() == Some(section)));
        before - self.warnings.len()
    }

    pub fn has_warning(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    /// Build a document from a registration passport file.
    ///
    /// Object sections carry their tier in an `Access_Tier` field, which is
    /// lifted out of the payload. Arrays under `fault_log_*` keys become log
    /// sections; keys starting with `_` are bookkeeping and are dropped. Both
    /// fault logs are created empty if the file lacks them.
    pub fn from_passport_json(entity_id: impl Into<String>, value: Value) -> Result<Self, TypeError> {
        let Value::Object(root) = value else {
            return Err(TypeError::InvalidDocument(
                "passport root must be a JSON object".into(),
            ));
        };

        let mut document = Document::new(entity_id);
        for (name, value) in root {
            if name.starts_with('_') {
                continue;
            }
            let section = match value {
                Value::Object(mut fields) => {
                    let tier = match fields.remove(ACCESS_TIER_FIELD) {
                        Some(Value::String(label)) => Some(label.parse::<Tier>()?),
                        Some(other) => {
                            return Err(TypeError::InvalidDocument(format!(
                                "section {name}: {ACCESS_TIER_FIELD} must be a string, got {other}"
                            )))
                        }
                        None => None,
                    };
                    let content = if name == DIGITAL_TWIN_STATUS {
                        SectionContent::Status(fields)
                    } else {
                        SectionContent::Static(fields)
                    };
                    SectionRecord::new(tier, content)
                }
                Value::Array(entries) if name.starts_with("fault_log_") => {
                    let events: Vec<FaultEvent> =
                        serde_json::from_value(Value::Array(entries)).map_err(|e| {
                        TypeError::InvalidDocument(format!("section {name}: {e}"))
                    })?;
                    SectionRecord::new(None, SectionContent::Log(events))
                }
                scalar => {
                    let mut fields = Map::new();
                    fields.insert("value".into(), scalar);
                    SectionRecord::new(None, SectionContent::Static(fields))
                }
            };
            document.sections.insert(name, section);
        }

        for log in [INSTALLATION_LOG, OPERATION_LOG] {
            document
                .sections
                .entry(log.to_string())
                .or_insert_with(|| SectionRecord::new(None, SectionContent::Log(Vec::new())));
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::SectionKind;
    use serde_json::json;

    #[test]
    fn passport_import_lifts_access_tier() {
        let raw = json!({
            "factory_registration": {"Access_Tier": "Public", "manufacturer": "Helio"},
            "material_composition": {"Access_Tier": "Tier 1", "silicon_pct": 92},
            "digital_twin_status": {"Access_Tier": "Tier 2", "current_visual_status": "green"},
            "_warnings": ["stale"],
        });

        let doc = Document::from_passport_json("P1", raw).unwrap();
        let reg = doc.section("factory_registration").unwrap();
        assert_eq!(reg.access_tier, Some(Tier::Public));
        assert!(!reg.fields().unwrap().contains_key("Access_Tier"));
        assert_eq!(doc.section(DIGITAL_TWIN_STATUS).unwrap().kind(), SectionKind::Status);
        assert!(doc.section("_warnings").is_none());
        assert_eq!(doc.section(OPERATION_LOG).unwrap().kind(), SectionKind::Log);
        assert_eq!(doc.section(INSTALLATION_LOG).unwrap().access_tier, None);
    }

    #[test]
    fn passport_import_rejects_unknown_tier() {
        let raw = json!({"x": {"Access_Tier": "Tier 9"}});
        assert!(matches!(
            Document::from_passport_json("P1", raw),
            Err(TypeError::UnknownTier(_))
        ));
    }

    #[test]
    fn passport_import_rejects_non_object_root() {
        assert!(Document::from_passport_json("P1", json!([1, 2])).is_err());
    }

    #[test]
    fn warnings_are_deduplicated_by_subject() {
        let mut doc = Document::new("P1");
        let w = DocumentWarning::new(WarningKind::Validation, "missing event_id")
            .with_position(Position::new(1, 0));
        assert!(doc.push_warning(w.clone()));
        assert!(!doc.push_warning(w));
        assert_eq!(doc.warnings.len(), 1);
    }

    #[test]
    fn clear_warnings_targets_one_section() {
        let mut doc = Document::new("P1");
        doc.push_warning(
            DocumentWarning::new(WarningKind::AnchoringPending, "a").with_section(OPERATION_LOG),
        );
        doc.push_warning(
            DocumentWarning::new(WarningKind::AnchoringPending, "b").with_section(INSTALLATION_LOG),
        );
        assert_eq!(doc.clear_warnings(WarningKind::AnchoringPending, OPERATION_LOG), 1);
        assert!(doc.has_warning(WarningKind::AnchoringPending));
    }

    #[test]
    fn document_serde_roundtrip() {
        let doc = Document::new("P9")
            .with_section("factory_registration", SectionRecord::static_fields(Tier::Public, Map::new()))
            .with_section(OPERATION_LOG, SectionRecord::log(Tier::Tier2));
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
