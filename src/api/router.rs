//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.

use axum::routing::{get, post};
use axum::Router;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the API router with all routes under `/api/`.
pub fn api_router(ctx: ApiContext) -> Router {
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/classify-query", post(endpoints::classify::classify))
        .route("/detect-subject-id", post(endpoints::subject::detect))
        .route("/run-query", post(endpoints::query::run))
        .route("/conversation/reset", post(endpoints::query::reset))
        .route("/fetch-reference-record", get(endpoints::reference::fetch))
        .with_state(ctx);

    Router::new().nest("/api", routes)
}
