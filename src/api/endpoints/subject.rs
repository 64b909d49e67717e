//! Subject-id detection endpoint.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::subject::SubjectIdExtractor;

#[derive(Deserialize)]
pub struct DetectRequest {
    pub query: String,
}

#[derive(Serialize)]
pub struct DetectResponse {
    #[serde(rename = "subjectId")]
    pub subject_id: Option<String>,
    #[serde(rename = "originalQuery")]
    pub original_query: String,
}

/// `POST /api/detect-subject-id` — pull a patient identifier out of a
/// question. `null` means no identifier was mentioned.
pub async fn detect(
    State(ctx): State<ApiContext>,
    Json(req): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    ctx.config.require_api_key()?;

    let extractor = SubjectIdExtractor::new(&*ctx.completion, &ctx.config.detection_model);
    let subject_id = extractor
        .extract(&req.query)
        .await
        .map_err(|source| ApiError::Completion {
            action: "detect patient ID",
            source,
        })?;

    Ok(Json(DetectResponse {
        subject_id,
        original_query: req.query,
    }))
}
