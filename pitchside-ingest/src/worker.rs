//! Queue workers
//!
//! A pool of stateless tokio tasks, each pulling one message at a time from
//! the inbound queue and running the unit of work to completion before
//! acknowledging. No state is shared across workers; the store's
//! constraints and conditional writes are the only coordination.

use std::sync::Arc;

use pitchside_common::db::models::DeadLetterCategory;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::IngestSettings;
use crate::db::{dead_letters, queue};
use crate::error::IngestResult;
use crate::message::RawMessage;
use crate::pipeline::{self, validator, Outcome};
use crate::retry;

/// Spawn the worker pool. Workers run until the token is cancelled; a
/// message claimed before cancellation is finished, not abandoned.
pub fn spawn_workers(
    db: SqlitePool,
    settings: Arc<IngestSettings>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..settings.workers)
        .map(|i| {
            let db = db.clone();
            let settings = Arc::clone(&settings);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let tag = format!("worker-{i}");
                info!(worker = %tag, "Queue worker started");
                run_worker(&tag, db, settings, cancel).await;
                info!(worker = %tag, "Queue worker stopped");
            })
        })
        .collect()
}

async fn run_worker(
    tag: &str,
    db: SqlitePool,
    settings: Arc<IngestSettings>,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        match process_next(&db, tag, &settings).await {
            Ok(true) => {
                // Message handled; immediately try for the next one
            }
            Ok(false) => {
                // Queue empty; idle-wait
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(settings.poll_interval) => {}
                }
            }
            Err(err) => {
                // Claim or acknowledge failed; the lease will re-deliver
                error!(worker = %tag, error = %err, "Worker iteration failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(settings.poll_interval) => {}
                }
            }
        }
    }
}

/// Claim and process one message. Returns false when the queue is empty.
///
/// Acknowledgement discipline:
/// - validation failures dead-letter immediately and acknowledge
/// - conflict outcomes are successful reconciliations and acknowledge
/// - transient storage failures retry under the policy; exhaustion
///   dead-letters with the attempt count and last error, then acknowledges
/// - a failure to record the dead letter leaves the claim in place, so the
///   lease expiry re-delivers rather than dropping the message
pub async fn process_next(
    pool: &SqlitePool,
    worker_tag: &str,
    settings: &IngestSettings,
) -> IngestResult<bool> {
    let Some(claimed) = queue::claim(pool, worker_tag, settings.claim_lease_secs).await? else {
        return Ok(false);
    };

    debug!(worker = %worker_tag, queue_id = claimed.id, "Claimed message");

    let parsed: Result<RawMessage, _> = serde_json::from_str(&claimed.payload);
    let raw = match parsed {
        Ok(raw) => raw,
        Err(err) => {
            info!(queue_id = claimed.id, error = %err, "Unparseable payload, dead-lettering");
            dead_letters::record(
                pool,
                &claimed.payload,
                DeadLetterCategory::Validation,
                1,
                Some(&format!("payload is not a JSON object: {err}")),
            )
            .await?;
            queue::ack(pool, claimed.id).await?;
            return Ok(true);
        }
    };

    let msg = match validator::validate(&raw) {
        Ok(msg) => msg,
        Err(err) => {
            info!(queue_id = claimed.id, error = %err, "Validation failed, dead-lettering");
            dead_letters::record(
                pool,
                &claimed.payload,
                DeadLetterCategory::Validation,
                1,
                Some(&err.to_string()),
            )
            .await?;
            queue::ack(pool, claimed.id).await?;
            return Ok(true);
        }
    };

    match retry::run_with_retry(&settings.retry, "reconcile message", || {
        pipeline::process_message(pool, &msg)
    })
    .await
    {
        Ok(outcome) => {
            match outcome {
                Outcome::Created { match_id } => {
                    debug!(queue_id = claimed.id, match_id = %match_id, "Reconciled: created")
                }
                Outcome::Updated { match_id } => {
                    debug!(queue_id = claimed.id, match_id = %match_id, "Reconciled: updated")
                }
                Outcome::Skipped => debug!(queue_id = claimed.id, "Reconciled: skipped"),
                Outcome::ConflictRecorded { match_id } => {
                    info!(queue_id = claimed.id, match_id = %match_id, "Reconciled: conflict recorded")
                }
            }
        }
        Err(exhausted) => {
            error!(
                queue_id = claimed.id,
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                "Unit of work failed terminally, dead-lettering"
            );
            dead_letters::record(
                pool,
                &claimed.payload,
                DeadLetterCategory::ExhaustedRetries,
                exhausted.attempts,
                Some(&exhausted.last_error.to_string()),
            )
            .await?;
        }
    }

    queue::ack(pool, claimed.id).await?;
    Ok(true)
}
