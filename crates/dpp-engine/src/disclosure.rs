//! Read-side helpers shared by the HTTP surface and the CLI.

use dpp_crypto::{verify_document, IntegrityReport};
use dpp_store::DocumentStore;
use dpp_types::Tier;

use crate::error::EngineResult;
use crate::projector::{project, Projection};

/// Load a document and project it for `tier`.
pub fn disclose(store: &dyn DocumentStore, entity_id: &str, tier: Tier) -> EngineResult<Projection> {
    let document = store.get(entity_id)?;
    project(&document, tier)
}

/// Recompute every section hash of a stored document.
///
/// Any disagreement with the recorded commitments is returned as
/// [`EngineError::IntegrityMismatch`](crate::EngineError::IntegrityMismatch).
pub fn verify_entity(store: &dyn DocumentStore, entity_id: &str) -> EngineResult<IntegrityReport> {
    let document = store.get(entity_id)?;
    let report = verify_document(&document)?;
    report.ensure_intact()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use dpp_crypto::commit_all;
    use dpp_store::InMemoryDocumentStore;
    use dpp_types::{Document, SectionContent, SectionRecord};
    use serde_json::{json, Map, Value};

    fn store_with_p1() -> InMemoryDocumentStore {
        let Value::Object(fields) = json!({"manufacturer": "Helio"}) else {
            unreachable!()
        };
        let mut doc = Document::new("P1")
            .with_section("factory_registration", SectionRecord::static_fields(Tier::Public, fields))
            .with_section("grid_contract", SectionRecord::static_fields(Tier::Tier1, Map::new()));
        commit_all(&mut doc).unwrap();
        let store = InMemoryDocumentStore::new();
        store.insert(doc).unwrap();
        store
    }

    #[test]
    fn unknown_entity_is_not_found() {
        let store = InMemoryDocumentStore::new();
        assert!(matches!(
            disclose(&store, "nope", Tier::Public),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(verify_entity(&store, "nope"), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn disclose_applies_the_tier() {
        let store = store_with_p1();
        assert_eq!(disclose(&store, "P1", Tier::Public).unwrap().sections.len(), 1);
        assert_eq!(disclose(&store, "P1", Tier::Tier1).unwrap().sections.len(), 2);
    }

    #[test]
    fn tampered_section_fails_verification() {
        let store = store_with_p1();
        assert!(verify_entity(&store, "P1").is_ok());

        let mut doc = store.get("P1").unwrap();
        let Value::Object(forged) = json!({"manufacturer": "Forged"}) else {
            unreachable!()
        };
        doc.sections.insert(
            "factory_registration".into(),
            SectionRecord::new(Some(Tier::Public), SectionContent::Static(forged)),
        );
        store.replace_raw(doc).unwrap();

        match verify_entity(&store, "P1") {
            Err(EngineError::IntegrityMismatch { sections, .. }) => {
                assert_eq!(sections, vec!["factory_registration".to_string()])
            }
            other => panic!("expected integrity mismatch, got {other:?}"),
        }
    }
}
