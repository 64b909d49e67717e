//! API error types with structured JSON responses.
//!
//! Bodies are flat objects keyed by `error`; the SQL-execution variant
//! additionally carries the failing statement and the original question so
//! the client can display both alongside the message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::llm::CompletionError;
use crate::pipeline::orchestrator::TurnError;
use crate::store::StoreError;

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("OpenAI API key is not configured")]
    MissingCredential,
    #[error("SQL execution failed: {message}")]
    SqlExecution {
        message: String,
        sql: String,
        original_query: Option<String>,
    },
    #[error("Failed to {action}")]
    Completion {
        action: &'static str,
        #[source]
        source: CompletionError,
    },
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Attach the original question to a turn failure before it becomes a
    /// response body.
    pub fn from_turn(err: TurnError, original_query: &str) -> Self {
        match err {
            TurnError::Generation(source) => ApiError::Completion {
                action: "generate SQL query",
                source,
            },
            TurnError::Execution { message, sql } => ApiError::SqlExecution {
                message,
                sql,
                original_query: Some(original_query.to_string()),
            },
            TurnError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::MissingCredential => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "OpenAI API key is not configured" }),
            ),
            ApiError::SqlExecution {
                message,
                sql,
                original_query,
            } => {
                let mut body = json!({
                    "error": "SQL execution failed",
                    "sqlError": message,
                    "sql": sql,
                });
                if let Some(q) = original_query {
                    body["originalQuery"] = json!(q);
                }
                (StatusCode::BAD_REQUEST, body)
            }
            ApiError::Completion { action, source } => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": format!("Failed to {action}"),
                    "details": source.to_string(),
                }),
            ),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, json!({ "error": detail }))
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An internal error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingApiKey => ApiError::MissingCredential,
            ConfigError::InvalidBindAddr(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
