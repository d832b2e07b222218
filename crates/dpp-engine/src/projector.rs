//! Tier-based disclosure of passport documents.

use std::collections::BTreeMap;

use dpp_types::{Document, DocumentWarning, SectionKind, Tier};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineResult;

/// Field name carrying a section's tier in passport-shaped output.
const ACCESS_TIER_FIELD: &str = "Access_Tier";

/// One disclosed section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectedSection {
    /// Tier the section was disclosed under. Untagged sections report `Tier 2`.
    pub access_tier: Tier,
    pub kind: SectionKind,
    pub payload: Value,
}

/// The subset of a document visible at one tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub entity_id: String,
    pub tier: Tier,
    pub sections: BTreeMap<String, ProjectedSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<DocumentWarning>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections in registration-file shape: object payloads regain their
    /// `Access_Tier` field, logs stay arrays.
    pub fn passport_data(&self) -> Map<String, Value> {
        self.sections
            .iter()
            .map(|(name, section)| {
                let value = match &section.payload {
                    Value::Object(fields) => {
                        let mut fields = fields.clone();
                        fields.insert(
                            ACCESS_TIER_FIELD.into(),
                            Value::String(section.access_tier.label().into()),
                        );
                        Value::Object(fields)
                    }
                    other => other.clone(),
                };
                (name.clone(), value)
            })
            .collect()
    }
}

/// Project `document` down to what a reader holding `tier` may see.
///
/// A section is included iff its effective tier is at or below `tier`;
/// sections without a tier count as `Tier2`. Warnings are internal metadata
/// and only disclosed at `Tier2`. The result for a lower tier is always a
/// subset of the result for a higher one.
pub fn project(document: &Document, tier: Tier) -> EngineResult<Projection> {
    let mut sections = BTreeMap::new();
    for (name, section) in &document.sections {
        let section_tier = section.effective_tier();
        if !tier.grants(section_tier) {
            continue;
        }
        sections.insert(
            name.clone(),
            ProjectedSection {
                access_tier: section_tier,
                kind: section.kind(),
                payload: section.payload()?,
            },
        );
    }

    let warnings = if tier == Tier::Tier2 {
        document.warnings.clone()
    } else {
        Vec::new()
    };

    Ok(Projection {
        entity_id: document.entity_id.clone(),
        tier,
        sections,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpp_types::{DocumentWarning, SectionContent, SectionRecord, WarningKind, OPERATION_LOG};
    use proptest::prelude::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn sample() -> Document {
        Document::new("P1")
            .with_section(
                "factory_registration",
                SectionRecord::static_fields(Tier::Public, fields(json!({"manufacturer": "Helio"}))),
            )
            .with_section(
                "material_composition",
                SectionRecord::static_fields(Tier::Tier1, fields(json!({"silicon_pct": 92}))),
            )
            .with_section(OPERATION_LOG, SectionRecord::log(Tier::Tier2))
            .with_section(
                "legacy_notes",
                SectionRecord::new(None, SectionContent::Static(fields(json!({"n": 1})))),
            )
    }

    #[test]
    fn tiers_nest() {
        let doc = sample();
        let names = |t| -> Vec<String> { project(&doc, t).unwrap().sections.into_keys().collect() };
        assert_eq!(names(Tier::Public), vec!["factory_registration"]);
        assert_eq!(
            names(Tier::Tier1),
            vec!["factory_registration", "material_composition"]
        );
        assert_eq!(names(Tier::Tier2).len(), 4);
    }

    #[test]
    fn untagged_sections_are_tier2_only() {
        let doc = sample();
        assert!(!project(&doc, Tier::Tier1).unwrap().sections.contains_key("legacy_notes"));
        let t2 = project(&doc, Tier::Tier2).unwrap();
        assert_eq!(t2.sections["legacy_notes"].access_tier, Tier::Tier2);
    }

    #[test]
    fn public_view_of_restricted_document_is_empty() {
        let doc = Document::new("P2")
            .with_section("a", SectionRecord::static_fields(Tier::Tier1, Map::new()))
            .with_section("b", SectionRecord::log(Tier::Tier2));
        let projection = project(&doc, Tier::Public).unwrap();
        assert!(projection.is_empty());
        assert_eq!(projection.entity_id, "P2");
    }

    #[test]
    fn warnings_only_at_tier2() {
        let mut doc = sample();
        doc.push_warning(DocumentWarning::new(WarningKind::Validation, "bad event"));
        assert!(project(&doc, Tier::Tier1).unwrap().warnings.is_empty());
        assert_eq!(project(&doc, Tier::Tier2).unwrap().warnings.len(), 1);
    }

    #[test]
    fn passport_data_restores_access_tier() {
        let data = project(&sample(), Tier::Tier1).unwrap().passport_data();
        assert_eq!(data["factory_registration"]["Access_Tier"], json!("Public"));
        assert_eq!(data["material_composition"]["Access_Tier"], json!("Tier 1"));
    }

    fn tier_from(idx: u8) -> Option<Tier> {
        match idx % 4 {
            0 => None,
            n => Some(Tier::ALL[(n - 1) as usize]),
        }
    }

    proptest! {
        #[test]
        fn lower_tier_view_is_contained_in_higher(tags in proptest::collection::vec(0u8..4, 0..12)) {
            let mut doc = Document::new("P");
            for (i, tag) in tags.iter().enumerate() {
                let section = SectionRecord::new(
                    tier_from(*tag),
                    SectionContent::Static(fields(json!({"i": i}))),
                );
                doc.sections.insert(format!("s{i}"), section);
            }

            for low in Tier::ALL {
                for high in Tier::ALL.into_iter().filter(|t| *t >= low) {
                    let a = project(&doc, low).unwrap();
                    let b = project(&doc, high).unwrap();
                    for (name, section) in &a.sections {
                        prop_assert_eq!(b.sections.get(name), Some(section));
                    }
                }
            }
        }
    }
}
