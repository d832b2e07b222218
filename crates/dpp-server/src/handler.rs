use axum::extract::{Path, Query, State};
use axum::response::Json;
use dpp_crypto::SectionIntegrity;
use dpp_engine::{disclose, verify_entity, EngineState, EngineStatus, Projection};
use dpp_store::DocumentStore;
use dpp_types::Tier;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineStatus>,
}

/// Health check. Reports `degraded` once the engine has halted.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state.engine_status();
    let status = match &engine {
        Some(s) if s.state == EngineState::Stopped => "degraded",
        _ => "ok",
    };
    Json(HealthResponse {
        status: status.to_string(),
        engine,
    })
}

pub async fn info_handler(State(state): State<AppState>) -> Json<Value> {
    let entities = state.store.list_ids().map(|ids| ids.len()).ok();
    Json(json!({
        "name": "dpp-server",
        "version": env!("CARGO_PKG_VERSION"),
        "canonical_form": dpp_crypto::CANONICAL_FORM,
        "tiers": Tier::ALL.iter().map(Tier::query_name).collect::<Vec<_>>(),
        "entities": entities,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TierQuery {
    pub tier: Option<String>,
}

/// `GET /entities/:id?tier=`: projection at the requested tier, `public` by default.
pub async fn entity_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TierQuery>,
) -> Result<Json<Projection>, ApiError> {
    let tier = match query.tier.as_deref() {
        None => Tier::Public,
        Some(raw) => raw
            .parse::<Tier>()
            .map_err(|_| ApiError::BadRequest(format!("invalid tier: {raw}")))?,
    };
    Ok(Json(disclose(state.store.as_ref(), &id, tier)?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IntegrityResponse {
    pub id: String,
    pub hash: String,
    pub sections: Vec<SectionIntegrity>,
}

/// `GET /entities/:id/integrity`: recomputed hashes against recorded commitments.
pub async fn integrity_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IntegrityResponse>, ApiError> {
    let report = verify_entity(state.store.as_ref(), &id)?;
    Ok(Json(IntegrityResponse {
        id: report.entity_id,
        hash: report.document_hash.to_hex(),
        sections: report.sections,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct AccessQuery {
    pub access: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PassportResponse {
    pub panel_id: String,
    pub access: String,
    pub data: Map<String, Value>,
}

/// `GET /api/dpp/:id?access=`: passport-file shaped view. Unknown access
/// levels fall back to `public`.
pub async fn passport_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<PassportResponse>, ApiError> {
    let access = query
        .access
        .unwrap_or_else(|| Tier::Public.query_name().to_string())
        .to_lowercase();
    let tier = access.parse::<Tier>().unwrap_or(Tier::Public);
    let projection = disclose(state.store.as_ref(), &id, tier)?;
    Ok(Json(PassportResponse {
        panel_id: id,
        access,
        data: projection.passport_data(),
    }))
}
