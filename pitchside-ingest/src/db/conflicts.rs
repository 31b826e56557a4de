//! Conflict surface operations
//!
//! Appended to by the reconciliation pipeline, queried by the admin UI for
//! manual resolution. Entries capture the stored and incoming values at
//! detection time as JSON documents.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::error::{IngestError, IngestResult};
use pitchside_common::db::models::ConflictEntry;

/// Append a conflict entry for a match
pub async fn record_conflict(
    pool: &SqlitePool,
    match_id: Uuid,
    stored_value: &serde_json::Value,
    incoming_value: &serde_json::Value,
) -> IngestResult<Uuid> {
    let guid = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO match_conflicts (guid, match_id, stored_value, incoming_value) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(guid.to_string())
    .bind(match_id.to_string())
    .bind(stored_value.to_string())
    .bind(incoming_value.to_string())
    .execute(pool)
    .await?;

    Ok(guid)
}

/// List unresolved conflict entries, oldest first
pub async fn list_unresolved(pool: &SqlitePool) -> IngestResult<Vec<ConflictEntry>> {
    let rows = sqlx::query(
        "SELECT guid, match_id, stored_value, incoming_value, detected_at, resolved_at \
         FROM match_conflicts \
         WHERE resolved_at IS NULL \
         ORDER BY detected_at",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_conflict_row).collect()
}

/// Mark a conflict entry resolved. Returns false if unknown or already
/// resolved.
pub async fn resolve(pool: &SqlitePool, guid: Uuid) -> IngestResult<bool> {
    let result = sqlx::query(
        "UPDATE match_conflicts \
         SET resolved_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
         WHERE guid = ? AND resolved_at IS NULL",
    )
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn map_conflict_row(row: &SqliteRow) -> IngestResult<ConflictEntry> {
    let guid_str: String = row.get("guid");
    let match_id_str: String = row.get("match_id");
    let stored: String = row.get("stored_value");
    let incoming: String = row.get("incoming_value");

    Ok(ConflictEntry {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| IngestError::Internal(format!("bad guid in conflict row: {e}")))?,
        match_id: Uuid::parse_str(&match_id_str)
            .map_err(|e| IngestError::Internal(format!("bad match_id in conflict row: {e}")))?,
        stored_value: serde_json::from_str(&stored)
            .map_err(|e| IngestError::Internal(format!("bad stored_value JSON: {e}")))?,
        incoming_value: serde_json::from_str(&incoming)
            .map_err(|e| IngestError::Internal(format!("bad incoming_value JSON: {e}")))?,
        detected_at: row.get("detected_at"),
        resolved_at: row.get("resolved_at"),
    })
}
