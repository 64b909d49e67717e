//! Reference discharge-record lookup.
//!
//! The one read path that bypasses SQL generation entirely: identifiers
//! come in as query parameters and are bound into a parameterized
//! statement against the reference database.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::store;

#[derive(Deserialize)]
pub struct ReferenceParams {
    pub subject_id: Option<String>,
    pub admission_id: Option<String>,
}

/// `GET /api/fetch-reference-record` — discharge records for a patient,
/// optionally narrowed to one admission.
pub async fn fetch(
    State(ctx): State<ApiContext>,
    Query(params): Query<ReferenceParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let subject_id = params
        .subject_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("subject_id is required".into()))?;

    let admission_id = params
        .admission_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let rows = store::fetch_reference_records(
        &ctx.config.reference_db_path,
        subject_id,
        admission_id,
    )?;

    Ok(Json(json!({
        "data": rows,
        "subject_id": subject_id,
        "admission_id": admission_id,
    })))
}
