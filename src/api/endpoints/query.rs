//! Full pipeline endpoint and conversation reset.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::category::QueryCategory;
use crate::pipeline::orchestrator::{ResponseEnvelope, TurnRequest};

#[derive(Deserialize)]
pub struct RunQueryRequest {
    pub query: String,
    /// Category hint from a prior classify call. Unknown literals are
    /// ignored and the turn classifies for itself.
    #[serde(default, rename = "queryType")]
    pub query_type: Option<String>,
    /// Explicit graph toggle from the client.
    #[serde(default, rename = "needsGraph")]
    pub needs_graph: bool,
}

/// `POST /api/run-query` — the full turn: detect, generate, execute,
/// format. Holds the conversation lock for the whole turn so concurrent
/// questions cannot interleave context updates.
pub async fn run(
    State(ctx): State<ApiContext>,
    Json(req): Json<RunQueryRequest>,
) -> Result<Json<ResponseEnvelope>, ApiError> {
    ctx.config.require_api_key()?;

    if req.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query is required".into()));
    }

    let turn = TurnRequest {
        question: req.query.clone(),
        category_hint: req
            .query_type
            .as_deref()
            .and_then(QueryCategory::from_literal),
        graph_toggle: req.needs_graph,
    };

    let mut conversation = ctx.conversation.lock().await;
    let (envelope, updated) = ctx
        .orchestrator
        .run_turn(&turn, conversation.clone())
        .await
        .map_err(|e| ApiError::from_turn(e, &req.query))?;
    *conversation = updated;

    Ok(Json(envelope))
}

/// `POST /api/conversation/reset` — forget the active patient context.
pub async fn reset(State(ctx): State<ApiContext>) -> Json<serde_json::Value> {
    let mut conversation = ctx.conversation.lock().await;
    conversation.reset();
    tracing::info!("Conversation context reset");
    Json(serde_json::json!({ "status": "ok" }))
}
