//! Match store operations
//!
//! CREATE and UPDATE are single conditional writes (insert-or-update keyed
//! by the resolved identity) so concurrent deliveries of the same message
//! cannot produce two rows or a lost update. Automated writes carry a
//! `locked = 0` guard in the update arm: if a manual edit lands between the
//! reconciliation read and this write, the statement affects zero rows and
//! the caller surfaces a conflict instead.
//!
//! `updated_at` is refreshed by a store-level trigger, never set here.

use chrono::NaiveDate;
use pitchside_common::db::models::{MatchRow, MatchSource, MatchStatus, MatchType};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::error::{IngestError, IngestResult};
use crate::message::MatchMessage;

const MATCH_COLUMNS: &str = "guid, external_match_id, home_team, away_team, match_date, \
     season, age_group, match_type, division, home_score, away_score, status, source, \
     locked, created_by, updated_by, created_at, updated_at";

/// Load a match by its external (source-assigned) id
pub async fn find_by_external_id(
    pool: &SqlitePool,
    external_id: &str,
) -> IngestResult<Option<MatchRow>> {
    let row = sqlx::query(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches WHERE external_match_id = ?"
    ))
    .bind(external_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_match_row).transpose()
}

/// Load a match by the composite natural key.
///
/// The lookup spans all rows, including those that carry an external id:
/// a manual correction must find the automated row it semantically matches.
pub async fn find_by_natural_key(
    pool: &SqlitePool,
    msg: &MatchMessage,
) -> IngestResult<Option<MatchRow>> {
    let row = sqlx::query(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches \
         WHERE match_date = ? AND home_team = ? AND away_team = ? AND season = ? \
           AND age_group = ? AND match_type = ? AND division = ?"
    ))
    .bind(msg.date)
    .bind(&msg.home_team)
    .bind(&msg.away_team)
    .bind(&msg.season)
    .bind(&msg.age_group)
    .bind(msg.match_type.as_str())
    .bind(msg.division.as_deref().unwrap_or(""))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_match_row).transpose()
}

/// Load a match by internal id
pub async fn get_match(pool: &SqlitePool, guid: Uuid) -> IngestResult<Option<MatchRow>> {
    let row = sqlx::query(&format!("SELECT {MATCH_COLUMNS} FROM matches WHERE guid = ?"))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(map_match_row).transpose()
}

/// Upsert an automated message into the store.
///
/// Keyed by external id when the message carries one, by natural key
/// otherwise. The update arm only applies to unlocked rows and preserves
/// stored scores when the message omits them. Returns rows affected: 0 means
/// the row exists but is locked, and the caller decides conflict vs skip.
pub async fn upsert_automated(
    pool: &SqlitePool,
    guid: Uuid,
    msg: &MatchMessage,
) -> IngestResult<u64> {
    let sql = match msg.external_match_id {
        Some(_) => {
            "INSERT INTO matches (guid, external_match_id, home_team, away_team, match_date, \
                 season, age_group, match_type, division, home_score, away_score, status, \
                 source, locked, created_by, updated_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'automated', 0, 'automated', 'automated') \
             ON CONFLICT(external_match_id) DO UPDATE SET \
                 status = excluded.status, \
                 home_score = COALESCE(excluded.home_score, home_score), \
                 away_score = COALESCE(excluded.away_score, away_score), \
                 updated_by = excluded.updated_by \
             WHERE locked = 0"
        }
        None => {
            "INSERT INTO matches (guid, external_match_id, home_team, away_team, match_date, \
                 season, age_group, match_type, division, home_score, away_score, status, \
                 source, locked, created_by, updated_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'automated', 0, 'automated', 'automated') \
             ON CONFLICT(match_date, home_team, away_team, season, age_group, match_type, division) \
             WHERE external_match_id IS NULL DO UPDATE SET \
                 status = excluded.status, \
                 home_score = COALESCE(excluded.home_score, home_score), \
                 away_score = COALESCE(excluded.away_score, away_score), \
                 updated_by = excluded.updated_by \
             WHERE locked = 0"
        }
    };

    let result = bind_message(sqlx::query(sql), guid, msg).execute(pool).await?;
    Ok(result.rows_affected())
}

/// Upsert a manual message into the store.
///
/// Manual rows are born locked, and a manual update locks the row it lands
/// on: once a human has recorded a result, automated updates may no longer
/// alter it.
pub async fn upsert_manual(pool: &SqlitePool, guid: Uuid, msg: &MatchMessage) -> IngestResult<u64> {
    let sql = match msg.external_match_id {
        Some(_) => {
            "INSERT INTO matches (guid, external_match_id, home_team, away_team, match_date, \
                 season, age_group, match_type, division, home_score, away_score, status, \
                 source, locked, created_by, updated_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'manual', 1, 'manual', 'manual') \
             ON CONFLICT(external_match_id) DO UPDATE SET \
                 status = excluded.status, \
                 home_score = COALESCE(excluded.home_score, home_score), \
                 away_score = COALESCE(excluded.away_score, away_score), \
                 locked = 1, \
                 updated_by = excluded.updated_by"
        }
        None => {
            "INSERT INTO matches (guid, external_match_id, home_team, away_team, match_date, \
                 season, age_group, match_type, division, home_score, away_score, status, \
                 source, locked, created_by, updated_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'manual', 1, 'manual', 'manual') \
             ON CONFLICT(match_date, home_team, away_team, season, age_group, match_type, division) \
             WHERE external_match_id IS NULL DO UPDATE SET \
                 status = excluded.status, \
                 home_score = COALESCE(excluded.home_score, home_score), \
                 away_score = COALESCE(excluded.away_score, away_score), \
                 locked = 1, \
                 updated_by = excluded.updated_by"
        }
    };

    let result = bind_message(sqlx::query(sql), guid, msg).execute(pool).await?;
    Ok(result.rows_affected())
}

/// Apply an automated refinement to a known row, refusing locked rows.
///
/// Used for update candidates: the write is keyed by the resolved row, not
/// the message's own identity, which may lack the row's external id.
/// Returns 0 when the row is locked and the caller surfaces a conflict.
pub async fn update_automated_by_guid(
    pool: &SqlitePool,
    guid: Uuid,
    msg: &MatchMessage,
) -> IngestResult<u64> {
    let result = sqlx::query(
        "UPDATE matches SET \
             status = ?, \
             home_score = COALESCE(?, home_score), \
             away_score = COALESCE(?, away_score), \
             updated_by = 'automated' \
         WHERE guid = ? AND locked = 0",
    )
    .bind(msg.status.as_str())
    .bind(msg.home_score)
    .bind(msg.away_score)
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Apply a manual correction to a known row.
///
/// Used when the resolved row's identity differs from the message's own key
/// (a manual message matched by natural key against an automated row that
/// carries an external id), where an upsert would insert a duplicate.
pub async fn update_manual_by_guid(
    pool: &SqlitePool,
    guid: Uuid,
    msg: &MatchMessage,
) -> IngestResult<u64> {
    let result = sqlx::query(
        "UPDATE matches SET \
             status = ?, \
             home_score = COALESCE(?, home_score), \
             away_score = COALESCE(?, away_score), \
             locked = 1, \
             updated_by = 'manual' \
         WHERE guid = ?",
    )
    .bind(msg.status.as_str())
    .bind(msg.home_score)
    .bind(msg.away_score)
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Set or clear the lock flag.
///
/// Clearing is the explicit unlock operation: afterwards the next automated
/// message may update the row normally.
pub async fn set_locked(pool: &SqlitePool, guid: Uuid, locked: bool) -> IngestResult<u64> {
    let result = sqlx::query("UPDATE matches SET locked = ? WHERE guid = ?")
        .bind(locked)
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

fn bind_message<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    guid: Uuid,
    msg: &'q MatchMessage,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(guid.to_string())
        .bind(msg.external_match_id.as_deref())
        .bind(&msg.home_team)
        .bind(&msg.away_team)
        .bind(msg.date)
        .bind(&msg.season)
        .bind(&msg.age_group)
        .bind(msg.match_type.as_str())
        .bind(msg.division.as_deref().unwrap_or(""))
        .bind(msg.home_score)
        .bind(msg.away_score)
        .bind(msg.status.as_str())
}

fn map_match_row(row: &SqliteRow) -> IngestResult<MatchRow> {
    let guid_str: String = row.get("guid");
    let status_str: String = row.get("status");
    let source_str: String = row.get("source");
    let match_type_str: String = row.get("match_type");
    let division: String = row.get("division");
    let match_date: NaiveDate = row.get("match_date");

    Ok(MatchRow {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| IngestError::Internal(format!("bad guid in matches row: {e}")))?,
        external_match_id: row.get("external_match_id"),
        home_team: row.get("home_team"),
        away_team: row.get("away_team"),
        match_date,
        season: row.get("season"),
        age_group: row.get("age_group"),
        match_type: MatchType::parse(&match_type_str)?,
        division: if division.is_empty() { None } else { Some(division) },
        home_score: row.get("home_score"),
        away_score: row.get("away_score"),
        status: MatchStatus::parse(&status_str)?,
        source: MatchSource::parse(&source_str)?,
        locked: row.get("locked"),
        created_by: row.get("created_by"),
        updated_by: row.get("updated_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchside_common::db::create_schema;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        create_schema(&pool).await.expect("Failed to create schema");
        pool
    }

    fn automated_msg() -> MatchMessage {
        MatchMessage {
            home_team: "team-a".to_string(),
            away_team: "team-b".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            season: "2025-26".to_string(),
            age_group: "u12".to_string(),
            match_type: MatchType::League,
            division: None,
            status: MatchStatus::Scheduled,
            home_score: None,
            away_score: None,
            external_match_id: Some("42".to_string()),
            source: MatchSource::Automated,
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let pool = test_pool().await;
        let msg = automated_msg();

        let changed = upsert_automated(&pool, Uuid::new_v4(), &msg).await.unwrap();
        assert_eq!(changed, 1);

        let row = find_by_external_id(&pool, "42").await.unwrap().unwrap();
        assert_eq!(row.status, MatchStatus::Scheduled);
        assert_eq!(row.source, MatchSource::Automated);
        assert!(!row.locked);

        // Second delivery with a new status updates the same row
        let mut update = msg.clone();
        update.status = MatchStatus::Tbd;
        let changed = upsert_automated(&pool, Uuid::new_v4(), &update).await.unwrap();
        assert_eq!(changed, 1);

        let row2 = find_by_external_id(&pool, "42").await.unwrap().unwrap();
        assert_eq!(row2.guid, row.guid, "upsert must not create a second row");
        assert_eq!(row2.status, MatchStatus::Tbd);
    }

    #[tokio::test]
    async fn test_automated_update_preserves_scores_when_absent() {
        let pool = test_pool().await;
        let mut msg = automated_msg();
        msg.status = MatchStatus::Completed;
        msg.home_score = Some(2);
        msg.away_score = Some(1);
        upsert_automated(&pool, Uuid::new_v4(), &msg).await.unwrap();

        // Redelivery without scores must not null them out
        let mut bare = automated_msg();
        bare.status = MatchStatus::Completed;
        upsert_automated(&pool, Uuid::new_v4(), &bare).await.unwrap();

        let row = find_by_external_id(&pool, "42").await.unwrap().unwrap();
        assert_eq!(row.home_score, Some(2));
        assert_eq!(row.away_score, Some(1));
    }

    #[tokio::test]
    async fn test_locked_row_refuses_automated_write() {
        let pool = test_pool().await;
        let msg = automated_msg();
        upsert_automated(&pool, Uuid::new_v4(), &msg).await.unwrap();

        let row = find_by_external_id(&pool, "42").await.unwrap().unwrap();
        set_locked(&pool, row.guid, true).await.unwrap();

        let mut update = msg.clone();
        update.status = MatchStatus::Completed;
        update.home_score = Some(3);
        update.away_score = Some(0);
        let changed = upsert_automated(&pool, Uuid::new_v4(), &update).await.unwrap();
        assert_eq!(changed, 0, "locked row must refuse the automated write");

        let after = find_by_external_id(&pool, "42").await.unwrap().unwrap();
        assert_eq!(after.status, MatchStatus::Scheduled);
        assert_eq!(after.home_score, None);
    }

    #[tokio::test]
    async fn test_update_automated_by_guid_respects_lock() {
        let pool = test_pool().await;
        let msg = automated_msg();
        upsert_automated(&pool, Uuid::new_v4(), &msg).await.unwrap();
        let row = find_by_external_id(&pool, "42").await.unwrap().unwrap();

        let mut update = msg.clone();
        update.status = MatchStatus::Tbd;
        assert_eq!(update_automated_by_guid(&pool, row.guid, &update).await.unwrap(), 1);

        set_locked(&pool, row.guid, true).await.unwrap();
        let mut late = msg.clone();
        late.status = MatchStatus::Completed;
        late.home_score = Some(1);
        late.away_score = Some(1);
        assert_eq!(update_automated_by_guid(&pool, row.guid, &late).await.unwrap(), 0);

        let after = get_match(&pool, row.guid).await.unwrap().unwrap();
        assert_eq!(after.status, MatchStatus::Tbd);
    }

    #[tokio::test]
    async fn test_manual_upsert_by_natural_key_locks() {
        let pool = test_pool().await;
        let mut msg = automated_msg();
        msg.external_match_id = None;
        msg.source = MatchSource::Manual;
        msg.status = MatchStatus::Completed;
        msg.home_score = Some(2);
        msg.away_score = Some(0);

        upsert_manual(&pool, Uuid::new_v4(), &msg).await.unwrap();
        let row = find_by_natural_key(&pool, &msg).await.unwrap().unwrap();
        assert!(row.locked);
        assert_eq!(row.source, MatchSource::Manual);
        assert_eq!(row.home_score, Some(2));

        // Redelivery converges on the same row
        upsert_manual(&pool, Uuid::new_v4(), &msg).await.unwrap();
        let again = find_by_natural_key(&pool, &msg).await.unwrap().unwrap();
        assert_eq!(again.guid, row.guid);
    }

    #[tokio::test]
    async fn test_manual_update_by_guid_overrides_and_locks() {
        let pool = test_pool().await;
        let mut auto = automated_msg();
        auto.status = MatchStatus::Completed;
        auto.home_score = Some(2);
        auto.away_score = Some(1);
        upsert_automated(&pool, Uuid::new_v4(), &auto).await.unwrap();
        let row = find_by_external_id(&pool, "42").await.unwrap().unwrap();

        let mut manual = auto.clone();
        manual.external_match_id = None;
        manual.source = MatchSource::Manual;
        manual.home_score = Some(2);
        manual.away_score = Some(0);
        let changed = update_manual_by_guid(&pool, row.guid, &manual).await.unwrap();
        assert_eq!(changed, 1);

        let after = get_match(&pool, row.guid).await.unwrap().unwrap();
        assert!(after.locked);
        assert_eq!(after.away_score, Some(0));
        assert_eq!(after.updated_by, "manual");
        // Creation provenance is preserved
        assert_eq!(after.source, MatchSource::Automated);
    }

    #[tokio::test]
    async fn test_natural_key_lookup_finds_rows_with_external_id() {
        let pool = test_pool().await;
        let msg = automated_msg();
        upsert_automated(&pool, Uuid::new_v4(), &msg).await.unwrap();

        let mut manual = msg.clone();
        manual.external_match_id = None;
        manual.source = MatchSource::Manual;
        let row = find_by_natural_key(&pool, &manual).await.unwrap();
        assert!(row.is_some(), "natural key lookup must span automated rows");
    }

    #[tokio::test]
    async fn test_unlock_allows_subsequent_automated_write() {
        let pool = test_pool().await;
        let msg = automated_msg();
        upsert_automated(&pool, Uuid::new_v4(), &msg).await.unwrap();
        let row = find_by_external_id(&pool, "42").await.unwrap().unwrap();

        set_locked(&pool, row.guid, true).await.unwrap();
        set_locked(&pool, row.guid, false).await.unwrap();

        let mut update = msg.clone();
        update.status = MatchStatus::Tbd;
        let changed = upsert_automated(&pool, Uuid::new_v4(), &update).await.unwrap();
        assert_eq!(changed, 1);
    }
}
