//! Dead-letter channel operations
//!
//! Terminal holding area for messages that cannot be processed
//! automatically: validation failures (never retried) and messages whose
//! retries were exhausted. Entries keep the original payload verbatim for
//! manual inspection and producer-side correction.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::error::{IngestError, IngestResult};
use pitchside_common::db::models::{DeadLetterCategory, DeadLetterEntry};

/// Record a dead letter. `attempts` is how many delivery attempts were made
/// (1 for validation failures, which fail on first sight).
pub async fn record(
    pool: &SqlitePool,
    payload: &str,
    category: DeadLetterCategory,
    attempts: u32,
    last_error: Option<&str>,
) -> IngestResult<Uuid> {
    let guid = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO dead_letters (guid, payload, category, attempts, last_error) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(guid.to_string())
    .bind(payload)
    .bind(category.as_str())
    .bind(attempts as i64)
    .bind(last_error)
    .execute(pool)
    .await?;

    Ok(guid)
}

/// List dead letters, newest first
pub async fn list(pool: &SqlitePool) -> IngestResult<Vec<DeadLetterEntry>> {
    let rows = sqlx::query(
        "SELECT guid, payload, category, attempts, last_error, created_at \
         FROM dead_letters \
         ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_dead_letter_row).collect()
}

fn map_dead_letter_row(row: &SqliteRow) -> IngestResult<DeadLetterEntry> {
    let guid_str: String = row.get("guid");
    let payload: String = row.get("payload");
    let category_str: String = row.get("category");

    Ok(DeadLetterEntry {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| IngestError::Internal(format!("bad guid in dead letter row: {e}")))?,
        // Payloads are usually JSON but arrive from the queue as opaque
        // text; fall back to a string value rather than refusing to list
        payload: serde_json::from_str(&payload)
            .unwrap_or(serde_json::Value::String(payload)),
        category: DeadLetterCategory::parse(&category_str)?,
        attempts: row.get("attempts"),
        last_error: row.get("last_error"),
        created_at: row.get("created_at"),
    })
}
