//! pitchside-ingest library interface
//!
//! Exposes the reconciliation pipeline and HTTP surfaces for integration
//! testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod retry;
pub mod worker;

pub use crate::error::{ApiError, ApiResult, IngestError, IngestResult};

use axum::{
    routing::{delete, get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/messages", post(api::submit_message))
        .route("/messages/:id", delete(api::revoke_message))
        .route("/matches/:id", get(api::get_match))
        .route("/matches/:id/unlock", post(api::unlock_match))
        .route("/conflicts", get(api::list_conflicts))
        .route("/conflicts/:id/resolve", post(api::resolve_conflict))
        .route("/dead-letters", get(api::list_dead_letters))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
