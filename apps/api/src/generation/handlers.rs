//! Axum route handlers for the letter API.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::generation::validation::validate;
use crate::models::FormData;
use crate::state::AppState;

/// Decodes a letter request. Accepts the form itself or `{ "prompt": "<form JSON>" }`.
pub fn parse_letter_request(body: &[u8]) -> Result<FormData, AppError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        warn!("Letter request is not valid JSON: {e}");
        AppError::MalformedInput
    })?;

    let value = match value.get("prompt") {
        Some(Value::String(inner)) if !inner.is_empty() => {
            serde_json::from_str(inner).map_err(|e| {
                warn!("Wrapped letter request is not valid JSON: {e}");
                AppError::MalformedInput
            })?
        }
        _ => value,
    };

    serde_json::from_value(value).map_err(|e| {
        warn!("Letter request has the wrong shape: {e}");
        AppError::MalformedInput
    })
}

/// GET /generate-letter
///
/// Liveness probe.
pub async fn handle_letter_probe(uri: Uri) -> Json<Value> {
    Json(json!({
        "message": "API endpoint is working",
        "path": uri.path(),
    }))
}

/// POST /generate-letter
///
/// Streams the letter as plain text. Completion failures fall back to the template
/// letter and still answer 200.
pub async fn handle_generate_letter(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, AppError> {
    let form = parse_letter_request(&body)?;
    validate(&form)?;

    let letter = state.completion.open(&form).await.map_err(|e| {
        error!("Letter generation failed, fallback included: {e}");
        AppError::Generation {
            details: state.config.is_development().then(|| e.to_string()),
        }
    })?;

    info!(
        "Streaming letter for {:?} at {:?} ({:?})",
        form.job_title.trim(),
        form.company.trim(),
        letter.source()
    );

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(letter.into_stream()),
    )
        .into_response())
}
