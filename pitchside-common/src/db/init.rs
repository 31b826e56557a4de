//! Database initialization
//!
//! Opens (or creates) the SQLite store, applies pragmas, and creates the
//! schema. All DDL is idempotent so startup can run it unconditionally.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection pool and create tables if needed.
///
/// Pragmas are set through the connect options so every pooled connection
/// gets them, not just the first: foreign keys on, WAL (concurrent readers
/// with one writer, which matters once multiple workers share the pool),
/// and a busy timeout under which SQLite waits out short lock contention
/// before the retry controller takes over with backoff.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables, indexes, and triggers (idempotent)
///
/// Exposed separately so tests can build the schema on an in-memory pool.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_matches_table(pool).await?;
    create_conflicts_table(pool).await?;
    create_dead_letters_table(pool).await?;
    create_inbound_messages_table(pool).await?;
    Ok(())
}

/// The authoritative match store.
///
/// Uniqueness invariants live here, not in application code:
/// - a non-null external match id is unique across all rows
/// - rows without an external id (manual entries) are unique on the
///   composite natural key; `division` is normalized to '' when absent so
///   the unique index treats missing divisions as equal
///
/// The `updated_at` refresh is an unconditional store-level trigger so no
/// write path, manual or automated, can bypass the audit timestamp.
pub async fn create_matches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            guid TEXT PRIMARY KEY,
            external_match_id TEXT UNIQUE,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            match_date TEXT NOT NULL,
            season TEXT NOT NULL,
            age_group TEXT NOT NULL,
            match_type TEXT NOT NULL,
            division TEXT NOT NULL DEFAULT '',
            home_score INTEGER,
            away_score INTEGER,
            status TEXT NOT NULL DEFAULT 'scheduled',
            source TEXT NOT NULL,
            locked INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            updated_by TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            CHECK (home_team <> away_team)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_matches_natural_key
        ON matches(match_date, home_team, away_team, season, age_group, match_type, division)
        WHERE external_match_id IS NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS matches_touch_updated_at
        AFTER UPDATE ON matches
        FOR EACH ROW
        BEGIN
            UPDATE matches
            SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE guid = NEW.guid;
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Conflict surface: disagreements between stored (locked) data and
/// incoming automated updates, queried by the admin UI for manual
/// resolution. Unresolved entries have NULL resolved_at.
pub async fn create_conflicts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS match_conflicts (
            guid TEXT PRIMARY KEY,
            match_id TEXT NOT NULL REFERENCES matches(guid),
            stored_value TEXT NOT NULL,
            incoming_value TEXT NOT NULL,
            detected_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            resolved_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_conflicts_unresolved
        ON match_conflicts(match_id)
        WHERE resolved_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Dead-letter channel: messages that cannot be processed automatically,
/// held for manual inspection with the failure reason and attempt count.
pub async fn create_dead_letters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dead_letters (
            guid TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            category TEXT NOT NULL CHECK (category IN ('validation', 'exhausted-retries')),
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Inbound message queue.
///
/// At-least-once delivery is expressed as conditional writes on this table:
/// a worker claims a message by flipping state under a lease, acknowledges
/// by deleting the row, and an expired lease makes the message claimable
/// again. A still-pending message may be revoked by the producer.
pub async fn create_inbound_messages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inbound_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payload TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'pending' CHECK (state IN ('pending', 'claimed')),
            claimed_by TEXT,
            lease_expires_at TEXT,
            enqueued_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_inbound_claimable
        ON inbound_messages(state, lease_expires_at)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
