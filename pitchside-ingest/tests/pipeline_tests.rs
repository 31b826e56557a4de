//! End-to-end reconciliation pipeline tests
//!
//! Walks the full crawler/admin interleavings: create on first sighting,
//! refinement, manual override with lock, conflicting late automated data,
//! and malformed input routed to the dead-letter channel.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use pitchside_common::db::create_schema;
use pitchside_common::db::models::{DeadLetterCategory, MatchSource, MatchStatus, MatchType};
use pitchside_ingest::config::IngestSettings;
use pitchside_ingest::db::{conflicts, dead_letters, matches, queue};
use pitchside_ingest::message::MatchMessage;
use pitchside_ingest::pipeline::{process_message, Outcome};
use pitchside_ingest::worker::process_next;

async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    create_schema(&pool).await.unwrap();
    pool
}

fn automated(status: MatchStatus) -> MatchMessage {
    MatchMessage {
        home_team: "team-a".to_string(),
        away_team: "team-b".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        season: "2025-26".to_string(),
        age_group: "u12".to_string(),
        match_type: MatchType::League,
        division: None,
        status,
        home_score: None,
        away_score: None,
        external_match_id: Some("42".to_string()),
        source: MatchSource::Automated,
    }
}

fn manual_result(home_score: i64, away_score: i64) -> MatchMessage {
    MatchMessage {
        external_match_id: None,
        source: MatchSource::Manual,
        status: MatchStatus::Completed,
        home_score: Some(home_score),
        away_score: Some(away_score),
        ..automated(MatchStatus::Completed)
    }
}

#[tokio::test]
async fn test_crawler_and_admin_interleaving() {
    let pool = test_pool().await;

    // First automated sighting creates the match
    let outcome = process_message(&pool, &automated(MatchStatus::Scheduled)).await.unwrap();
    let match_id = match outcome {
        Outcome::Created { match_id } => match_id,
        other => panic!("expected Created, got {other:?}"),
    };
    let row = matches::get_match(&pool, match_id).await.unwrap().unwrap();
    assert_eq!(row.status, MatchStatus::Scheduled);
    assert_eq!(row.source, MatchSource::Automated);
    assert!(!row.locked);

    // The source reports the match played, score not yet known
    let outcome = process_message(&pool, &automated(MatchStatus::Tbd)).await.unwrap();
    assert_eq!(outcome, Outcome::Updated { match_id });

    // Redelivery with no new information is a no-op
    let before = matches::get_match(&pool, match_id).await.unwrap().unwrap();
    let outcome = process_message(&pool, &automated(MatchStatus::Tbd)).await.unwrap();
    assert_eq!(outcome, Outcome::Skipped);
    let after = matches::get_match(&pool, match_id).await.unwrap().unwrap();
    assert_eq!(after.updated_at, before.updated_at, "skip must not touch the audit field");

    // The score arrives
    let mut completed = automated(MatchStatus::Completed);
    completed.home_score = Some(2);
    completed.away_score = Some(1);
    let outcome = process_message(&pool, &completed).await.unwrap();
    assert_eq!(outcome, Outcome::Updated { match_id });
    let row = matches::get_match(&pool, match_id).await.unwrap().unwrap();
    assert_eq!((row.home_score, row.away_score), (Some(2), Some(1)));

    // An admin corrects the result; matched by natural key, no external id
    let outcome = process_message(&pool, &manual_result(2, 0)).await.unwrap();
    assert_eq!(outcome, Outcome::Updated { match_id });
    let row = matches::get_match(&pool, match_id).await.unwrap().unwrap();
    assert!(row.locked, "manual write must lock the match");
    assert_eq!((row.home_score, row.away_score), (Some(2), Some(0)));

    // The crawler resends its original score: conflict, stored value wins
    let outcome = process_message(&pool, &completed).await.unwrap();
    assert_eq!(outcome, Outcome::ConflictRecorded { match_id });
    let row = matches::get_match(&pool, match_id).await.unwrap().unwrap();
    assert_eq!((row.home_score, row.away_score), (Some(2), Some(0)));

    let surface = conflicts::list_unresolved(&pool).await.unwrap();
    assert_eq!(surface.len(), 1);
    assert_eq!(surface[0].match_id, match_id);
    assert_eq!(surface[0].stored_value["away_score"], serde_json::json!(0));
    assert_eq!(surface[0].incoming_value["away_score"], serde_json::json!(1));
}

#[tokio::test]
async fn test_idempotence_of_automated_messages() {
    let pool = test_pool().await;

    let mut msg = automated(MatchStatus::Completed);
    msg.home_score = Some(3);
    msg.away_score = Some(3);

    let first = process_message(&pool, &msg).await.unwrap();
    assert!(matches!(first, Outcome::Created { .. }));
    let row_after_first = {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        matches::find_by_external_id(&pool, "42").await.unwrap().unwrap()
    };

    for _ in 0..3 {
        let outcome = process_message(&pool, &msg).await.unwrap();
        assert_eq!(outcome, Outcome::Skipped);
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "redelivery must never create a second row");

    let row = matches::find_by_external_id(&pool, "42").await.unwrap().unwrap();
    assert_eq!(row.updated_at, row_after_first.updated_at);
    assert_eq!(row.guid, row_after_first.guid);
}

#[tokio::test]
async fn test_invalid_transition_is_surfaced_not_applied() {
    let pool = test_pool().await;

    let mut completed = automated(MatchStatus::Completed);
    completed.home_score = Some(1);
    completed.away_score = Some(0);
    let Outcome::Created { match_id } = process_message(&pool, &completed).await.unwrap() else {
        panic!("expected Created");
    };

    // completed is terminal; a late "scheduled" message must not reopen it
    let outcome = process_message(&pool, &automated(MatchStatus::Scheduled)).await.unwrap();
    assert_eq!(outcome, Outcome::ConflictRecorded { match_id });

    let row = matches::get_match(&pool, match_id).await.unwrap().unwrap();
    assert_eq!(row.status, MatchStatus::Completed);
    assert_eq!(row.home_score, Some(1));

    assert_eq!(conflicts::list_unresolved(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unlock_reopens_automated_updates() {
    let pool = test_pool().await;

    let mut completed = automated(MatchStatus::Completed);
    completed.home_score = Some(2);
    completed.away_score = Some(1);
    process_message(&pool, &completed).await.unwrap();

    let Outcome::Updated { match_id } = process_message(&pool, &manual_result(2, 0)).await.unwrap()
    else {
        panic!("expected Updated");
    };

    // Locked: the automated score is refused
    let outcome = process_message(&pool, &completed).await.unwrap();
    assert!(matches!(outcome, Outcome::ConflictRecorded { .. }));

    // Explicit unlock clears the flag; the next automated message applies
    matches::set_locked(&pool, match_id, false).await.unwrap();
    let outcome = process_message(&pool, &completed).await.unwrap();
    assert_eq!(outcome, Outcome::Updated { match_id });
    let row = matches::get_match(&pool, match_id).await.unwrap().unwrap();
    assert_eq!((row.home_score, row.away_score), (Some(2), Some(1)));
}

#[tokio::test]
async fn test_manual_entries_deduplicate_by_natural_key() {
    let pool = test_pool().await;

    let Outcome::Created { match_id } = process_message(&pool, &manual_result(1, 1)).await.unwrap()
    else {
        panic!("expected Created");
    };
    let row = matches::get_match(&pool, match_id).await.unwrap().unwrap();
    assert!(row.locked, "manual creations are born locked");
    assert_eq!(row.source, MatchSource::Manual);

    // Same logical match entered again updates rather than duplicates
    let outcome = process_message(&pool, &manual_result(1, 2)).await.unwrap();
    assert_eq!(outcome, Outcome::Updated { match_id });

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    // A different age group is a different logical match
    let mut other = manual_result(0, 0);
    other.age_group = "u14".to_string();
    let outcome = process_message(&pool, &other).await.unwrap();
    assert!(matches!(outcome, Outcome::Created { .. }));
}

#[tokio::test]
async fn test_malformed_message_never_reaches_reconciliation() {
    let pool = test_pool().await;
    let settings = IngestSettings::default();

    let payload = serde_json::json!({
        "home_team": "team-a", "away_team": "team-b", "date": "2025-09-01",
        "season": "2025-26", "age_group": "u12", "match_type": "league",
        "status": "unknown-value", "external_match_id": 42, "source": "automated",
    });
    queue::enqueue(&pool, &payload.to_string()).await.unwrap();

    assert!(process_next(&pool, "w0", &settings).await.unwrap());

    let entries = dead_letters::list(&pool).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].category, DeadLetterCategory::Validation);
    // Original payload is preserved verbatim for producer-side correction
    assert_eq!(entries[0].payload["status"], serde_json::json!("unknown-value"));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_end_to_end_through_queue() {
    let pool = test_pool().await;
    let settings = IngestSettings::default();

    let payload = serde_json::json!({
        "home_team": "team-a", "away_team": "team-b", "date": "2025-09-01",
        "season": "2025-26", "age_group": "u12", "match_type": "league",
        "status": "completed", "home_score": 2, "away_score": 1,
        "external_match_id": 42, "source": "automated",
    });

    // At-least-once delivery: the producer enqueued the same message twice
    queue::enqueue(&pool, &payload.to_string()).await.unwrap();
    queue::enqueue(&pool, &payload.to_string()).await.unwrap();

    assert!(process_next(&pool, "w0", &settings).await.unwrap());
    assert!(process_next(&pool, "w1", &settings).await.unwrap());
    assert!(!process_next(&pool, "w0", &settings).await.unwrap());

    let row = matches::find_by_external_id(&pool, "42").await.unwrap().unwrap();
    assert_eq!(row.status, MatchStatus::Completed);
    assert_eq!((row.home_score, row.away_score), (Some(2), Some(1)));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert!(dead_letters::list(&pool).await.unwrap().is_empty());
}
