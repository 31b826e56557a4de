//! Dead-letter inspection endpoint

use axum::{extract::State, Json};
use pitchside_common::db::models::DeadLetterEntry;

use crate::db::dead_letters;
use crate::error::ApiResult;
use crate::AppState;

/// GET /dead-letters - entries awaiting manual inspection, newest first
pub async fn list_dead_letters(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<DeadLetterEntry>>> {
    let entries = dead_letters::list(&state.db).await?;
    Ok(Json(entries))
}
