//! Producer-facing message endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::db::queue;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /messages - enqueue a raw message for reconciliation.
///
/// The body must be a JSON object; field-level validation happens inside
/// the pipeline so that a malformed message is recorded in the dead-letter
/// channel rather than lost at the HTTP boundary.
pub async fn submit_message(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    if !payload.is_object() {
        return Err(ApiError::BadRequest("message must be a JSON object".to_string()));
    }

    let id = queue::enqueue(&state.db, &payload.to_string()).await?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "id": id }))))
}

/// DELETE /messages/:id - revoke a still-pending message.
///
/// Once a worker has claimed the message, the unit of work runs to
/// completion and revocation reports 404.
pub async fn revoke_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if queue::revoke(&state.db, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no pending message with id {id}")))
    }
}
