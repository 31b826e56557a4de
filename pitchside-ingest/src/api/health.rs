//! Health check endpoint

use axum::{extract::State, Json};
use serde_json::json;

use crate::error::ApiResult;
use crate::AppState;

/// GET /health - liveness plus database reachability
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db)
        .await?;

    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
