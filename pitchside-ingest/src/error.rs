//! Error types for pitchside-ingest
//!
//! The pipeline taxonomy separates outcomes that are resolved inside the
//! pipeline (validation failures, invalid transitions, locked conflicts)
//! from storage failures that may escalate to the dead-letter channel.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pitchside_common::db::models::MatchStatus;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Malformed inbound message. Never retried: replaying the same payload
/// cannot succeed without producer-side correction.
#[derive(Debug, Clone, Error)]
#[error("invalid message: {}", issues.join("; "))]
pub struct ValidationError {
    /// One entry per offending field, `field: reason`
    pub issues: Vec<String>,
}

/// Pipeline error taxonomy
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed message; routed straight to the dead-letter channel
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Status change outside the allowed edge set; surfaced as a conflict
    #[error("invalid status transition for match {match_id}: {from} -> {to}")]
    InvalidTransition {
        match_id: Uuid,
        from: MatchStatus,
        to: MatchStatus,
    },

    /// Automated update diverges from a locked match; surfaced as a conflict
    #[error("automated update diverges from locked match {match_id}")]
    LockedConflict { match_id: Uuid },

    /// Storage failure; transient variants are retried with backoff
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Shared-library error (config, decode)
    #[error(transparent)]
    Common(#[from] pitchside_common::Error),

    /// Invariant breach that is not attributable to the message or store
    #[error("internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Whether the retry controller should retry this failure.
    ///
    /// Pool exhaustion, I/O failures, and SQLite lock contention can
    /// self-resolve; constraint violations and everything else cannot.
    pub fn is_transient(&self) -> bool {
        match self {
            IngestError::Database(err) => sqlx_error_is_transient(err),
            IngestError::Common(pitchside_common::Error::Database(err)) => {
                sqlx_error_is_transient(err)
            }
            IngestError::Common(pitchside_common::Error::Io(_)) => true,
            _ => false,
        }
    }

    /// Whether this error is a conflict outcome (surfaced, acknowledged)
    /// rather than a pipeline failure.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            IngestError::InvalidTransition { .. } | IngestError::LockedConflict { .. }
        )
    }
}

fn sqlx_error_is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}

/// Result type for pipeline operations
pub type IngestResult<T> = Result<T, IngestError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Pipeline error
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Ingest(IngestError::Database(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Ingest(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
