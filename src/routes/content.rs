/**
 * Content Routes
 * Read and edit the singleton page sections
 */
use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use super::{AdminSession, ApiError, WriteQuery};
use crate::model::SectionName;
use crate::state::SharedState;
use crate::store::SectionPersistence;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionResponse {
    pub section: SectionName,
    pub persistence: SectionPersistence,
    pub content: Value,
}

fn parse_section(raw: &str) -> Result<SectionName, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("Section '{}'", raw)))
}

/// GET /api/content
pub async fn list_sections(State(state): State<SharedState>) -> Json<BTreeMap<SectionName, Value>> {
    Json(state.store.sections().snapshot())
}

/// GET /api/content/{section}
pub async fn get_section(
    State(state): State<SharedState>,
    Path(section): Path<String>,
) -> Result<Json<SectionResponse>, ApiError> {
    let name = parse_section(&section)?;
    let sections = state.store.sections();
    Ok(Json(SectionResponse {
        section: name,
        persistence: sections.persistence(name),
        content: sections.get(name),
    }))
}

/// PUT /api/content/{section}
///
/// Local-only sections answer 200 straight away. Persisted ones answer 202,
/// or 200 once the upsert settles when `?wait=true`.
pub async fn update_section(
    State(state): State<SharedState>,
    admin: AdminSession,
    Path(section): Path<String>,
    Query(query): Query<WriteQuery>,
    Json(content): Json<Value>,
) -> Result<(StatusCode, Json<SectionResponse>), ApiError> {
    let name = parse_section(&section)?;
    if !content.is_object() {
        return Err(ApiError::BadRequest(
            "Section content must be a JSON object".to_string(),
        ));
    }

    tracing::info!(section = %name, admin = %admin.profile.email, "Section edit");
    let sections = state.store.sections();
    let status = match sections.set(name, content) {
        Some(pending) if query.wait => {
            pending.settled().await?;
            StatusCode::OK
        }
        Some(_) => StatusCode::ACCEPTED,
        None => StatusCode::OK,
    };

    Ok((
        status,
        Json(SectionResponse {
            section: name,
            persistence: sections.persistence(name),
            content: sections.get(name),
        }),
    ))
}
