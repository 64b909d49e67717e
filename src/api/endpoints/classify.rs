//! Query classification endpoint.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::category::{QueryCategory, QueryClassifier};

#[derive(Deserialize)]
pub struct ClassifyRequest {
    pub query: String,
}

#[derive(Serialize)]
pub struct ClassifyResponse {
    #[serde(rename = "queryType")]
    pub query_type: Option<QueryCategory>,
    #[serde(rename = "originalQuery")]
    pub original_query: String,
}

/// `POST /api/classify-query` — categorize a question ahead of the full
/// turn. Short questions come back unclassified without a service call.
pub async fn classify(
    State(ctx): State<ApiContext>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    ctx.config.require_api_key()?;

    let classifier = QueryClassifier::new(&*ctx.completion, &ctx.config.detection_model);
    let query_type = classifier
        .classify(&req.query)
        .await
        .map_err(|source| ApiError::Completion {
            action: "classify query",
            source,
        })?;

    Ok(Json(ClassifyResponse {
        query_type,
        original_query: req.query,
    }))
}
