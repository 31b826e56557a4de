//! Conflict surface endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use pitchside_common::db::models::ConflictEntry;
use uuid::Uuid;

use crate::db::conflicts;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /conflicts - unresolved conflict entries, oldest first
pub async fn list_conflicts(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ConflictEntry>>> {
    let entries = conflicts::list_unresolved(&state.db).await?;
    Ok(Json(entries))
}

/// POST /conflicts/:id/resolve - mark a conflict entry handled
pub async fn resolve_conflict(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let guid = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("invalid conflict id: {id}")))?;

    if conflicts::resolve(&state.db, guid).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no unresolved conflict with id {id}")))
    }
}
