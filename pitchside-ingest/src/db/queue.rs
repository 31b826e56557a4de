//! Inbound message queue operations
//!
//! At-least-once delivery over the shared store: a claim is a single
//! conditional UPDATE taking a lease, acknowledgement deletes the row, and
//! an expired lease makes the message claimable again. Two workers racing
//! to claim serialize on the write and pick distinct messages.

use sqlx::{Row, SqlitePool};

use crate::error::IngestResult;
use pitchside_common::db::models::QueuedMessage;

/// Enqueue a raw message payload. Returns the queue id.
pub async fn enqueue(pool: &SqlitePool, payload: &str) -> IngestResult<i64> {
    let result = sqlx::query("INSERT INTO inbound_messages (payload) VALUES (?)")
        .bind(payload)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Claim the oldest deliverable message under a lease.
///
/// Deliverable means pending, or claimed with an expired lease (a worker
/// died mid-message and the delivery repeats).
pub async fn claim(
    pool: &SqlitePool,
    worker: &str,
    lease_secs: u32,
) -> IngestResult<Option<QueuedMessage>> {
    let lease_modifier = format!("+{lease_secs} seconds");

    let row = sqlx::query(
        "UPDATE inbound_messages \
         SET state = 'claimed', claimed_by = ?, \
             lease_expires_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?) \
         WHERE id = ( \
             SELECT id FROM inbound_messages \
             WHERE state = 'pending' \
                OR (state = 'claimed' AND lease_expires_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')) \
             ORDER BY id \
             LIMIT 1 \
         ) \
         RETURNING id, payload",
    )
    .bind(worker)
    .bind(&lease_modifier)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| QueuedMessage {
        id: r.get("id"),
        payload: r.get("payload"),
    }))
}

/// Acknowledge a processed message, removing it from the queue
pub async fn ack(pool: &SqlitePool, id: i64) -> IngestResult<()> {
    sqlx::query("DELETE FROM inbound_messages WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Revoke a still-pending message (producer-side cancellation).
///
/// Returns false once a worker has claimed it: a claimed unit of work runs
/// to completion or retry exhaustion.
pub async fn revoke(pool: &SqlitePool, id: i64) -> IngestResult<bool> {
    let result = sqlx::query("DELETE FROM inbound_messages WHERE id = ? AND state = 'pending'")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Number of messages awaiting delivery
pub async fn pending_count(pool: &SqlitePool) -> IngestResult<i64> {
    let count =
        sqlx::query_scalar("SELECT COUNT(*) FROM inbound_messages WHERE state = 'pending'")
            .fetch_one(pool)
            .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchside_common::db::create_schema;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_enqueue_claim_ack() {
        let pool = test_pool().await;

        let id = enqueue(&pool, r#"{"status":"scheduled"}"#).await.unwrap();
        assert_eq!(pending_count(&pool).await.unwrap(), 1);

        let msg = claim(&pool, "worker-0", 60).await.unwrap().unwrap();
        assert_eq!(msg.id, id);
        assert_eq!(msg.payload, r#"{"status":"scheduled"}"#);

        // Claimed message is invisible to other workers while the lease holds
        assert!(claim(&pool, "worker-1", 60).await.unwrap().is_none());

        ack(&pool, msg.id).await.unwrap();
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inbound_messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_claim_empty_queue() {
        let pool = test_pool().await;
        assert!(claim(&pool, "worker-0", 60).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_lease_is_redelivered() {
        let pool = test_pool().await;
        enqueue(&pool, "{}").await.unwrap();

        // Zero-second lease expires immediately
        let first = claim(&pool, "worker-0", 0).await.unwrap().unwrap();
        let second = claim(&pool, "worker-1", 60).await.unwrap().unwrap();
        assert_eq!(first.id, second.id, "expired lease must be reclaimable");
    }

    #[tokio::test]
    async fn test_claims_are_oldest_first() {
        let pool = test_pool().await;
        let a = enqueue(&pool, "\"a\"").await.unwrap();
        let b = enqueue(&pool, "\"b\"").await.unwrap();

        assert_eq!(claim(&pool, "w", 60).await.unwrap().unwrap().id, a);
        assert_eq!(claim(&pool, "w", 60).await.unwrap().unwrap().id, b);
    }

    #[tokio::test]
    async fn test_revoke_only_pending() {
        let pool = test_pool().await;
        let id = enqueue(&pool, "{}").await.unwrap();

        let claimed = claim(&pool, "worker-0", 60).await.unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert!(!revoke(&pool, id).await.unwrap(), "claimed message cannot be revoked");

        let id2 = enqueue(&pool, "{}").await.unwrap();
        assert!(revoke(&pool, id2).await.unwrap());
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
    }
}
