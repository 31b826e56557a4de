//! Match inspection and unlock endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use pitchside_common::db::models::MatchRow;
use uuid::Uuid;

use crate::db::matches;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /matches/:id - read one reconciled match row
pub async fn get_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MatchRow>> {
    let guid = parse_guid(&id)?;
    match matches::get_match(&state.db, guid).await? {
        Some(row) => Ok(Json(row)),
        None => Err(ApiError::NotFound(format!("no match with id {id}"))),
    }
}

/// POST /matches/:id/unlock - clear the lock flag.
///
/// After unlocking, the next automated message may update the match
/// normally again.
pub async fn unlock_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let guid = parse_guid(&id)?;
    if matches::set_locked(&state.db, guid, false).await? > 0 {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no match with id {id}")))
    }
}

fn parse_guid(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest(format!("invalid match id: {id}")))
}
