use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::generation::validation::ValidationError;

/// Errors surfaced by the letter endpoint.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Upstream completion failures are not here: they resolve to the template letter.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid JSON format")]
    MalformedInput,

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Even the fallback failed. `details` is only set in development mode.
    #[error("Failed to generate letter")]
    Generation { details: Option<String> },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::MalformedInput => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid JSON format" }),
            ),
            AppError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": &err.message,
                    "details": err.messages(),
                }),
            ),
            AppError::Generation { details } => {
                let mut body = json!({ "error": "Failed to generate letter" });
                if let Some(details) = details {
                    body["details"] = json!(details);
                }
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };

        (status, Json(body)).into_response()
    }
}
