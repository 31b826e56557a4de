//! Reconciliation pipeline
//!
//! One message flows validator → resolver → engine → persistence. This
//! module owns the unit of work applied per message: everything after
//! validation, run under the retry controller by the worker.
//!
//! Conflict-class errors (locked divergence, invalid transition) never
//! escalate: they append to the conflict surface and the message is
//! acknowledged as handled, since only human judgment can resolve them.

pub mod engine;
pub mod resolver;
pub mod validator;

use pitchside_common::db::models::{MatchRow, MatchSource};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{conflicts, matches};
use crate::error::{IngestError, IngestResult};
use crate::message::MatchMessage;
use engine::Decision;

/// Terminal outcome of one reconciled message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created { match_id: Uuid },
    Updated { match_id: Uuid },
    /// Idempotent no-op; the stored row (if any) is untouched
    Skipped,
    /// A conflict entry was appended; the stored row is untouched
    ConflictRecorded { match_id: Uuid },
}

/// Run the unit of work for one validated message: resolve its identity,
/// reconcile against the existing row, and persist the decision.
pub async fn process_message(pool: &SqlitePool, msg: &MatchMessage) -> IngestResult<Outcome> {
    let existing = resolver::resolve(pool, msg).await?;

    match engine::reconcile(existing.as_ref(), msg) {
        Ok(Decision::Skip) => {
            debug!(
                home_team = %msg.home_team,
                away_team = %msg.away_team,
                "No new information, skipping"
            );
            Ok(Outcome::Skipped)
        }

        Ok(Decision::Create) => {
            let changed = match msg.source {
                MatchSource::Automated => {
                    matches::upsert_automated(pool, Uuid::new_v4(), msg).await?
                }
                MatchSource::Manual => matches::upsert_manual(pool, Uuid::new_v4(), msg).await?,
            };

            // The upsert re-resolves under the store's uniqueness
            // constraints; read back which row the write landed on
            let row = refetch(pool, msg).await?;
            if changed == 0 {
                // The insert arm lost a race against a manual write that
                // locked the row between resolution and persistence
                return refused_write(pool, &row, msg).await;
            }

            info!(match_id = %row.guid, status = %row.status, source = %msg.source, "Match created");
            Ok(Outcome::Created { match_id: row.guid })
        }

        Ok(Decision::Update) => {
            let Some(row) = existing else {
                return Err(IngestError::Internal(
                    "update decision without an existing row".to_string(),
                ));
            };

            match msg.source {
                MatchSource::Manual => {
                    matches::update_manual_by_guid(pool, row.guid, msg).await?;
                    info!(match_id = %row.guid, "Manual correction applied, match locked");
                    Ok(Outcome::Updated { match_id: row.guid })
                }
                MatchSource::Automated => {
                    let changed = matches::update_automated_by_guid(pool, row.guid, msg).await?;
                    if changed == 0 {
                        // The lock landed between resolution and this write
                        let fresh = matches::get_match(pool, row.guid).await?.ok_or_else(|| {
                            IngestError::Internal("row vanished after conditional write".to_string())
                        })?;
                        return refused_write(pool, &fresh, msg).await;
                    }
                    info!(match_id = %row.guid, status = %msg.status, "Match updated");
                    Ok(Outcome::Updated { match_id: row.guid })
                }
            }
        }

        Err(IngestError::LockedConflict { match_id }) => {
            let Some(row) = existing else {
                return Err(IngestError::Internal(
                    "locked conflict without an existing row".to_string(),
                ));
            };
            warn!(match_id = %match_id, "Automated update diverges from locked match");
            record_conflict(pool, &row, msg).await?;
            Ok(Outcome::ConflictRecorded { match_id })
        }

        Err(IngestError::InvalidTransition { match_id, from, to }) => {
            let Some(row) = existing else {
                return Err(IngestError::Internal(
                    "invalid transition without an existing row".to_string(),
                ));
            };
            warn!(match_id = %match_id, %from, %to, "Invalid status transition");
            record_conflict(pool, &row, msg).await?;
            Ok(Outcome::ConflictRecorded { match_id })
        }

        Err(other) => Err(other),
    }
}

/// Handle a conditional write that affected zero rows: the row was locked
/// between the reconciliation read and the write. Re-applies the lock
/// rules against the fresh row state.
async fn refused_write(
    pool: &SqlitePool,
    row: &MatchRow,
    msg: &MatchMessage,
) -> IngestResult<Outcome> {
    if engine::diverges(row, msg) {
        warn!(match_id = %row.guid, "Write refused by lock, recording conflict");
        record_conflict(pool, row, msg).await?;
        Ok(Outcome::ConflictRecorded { match_id: row.guid })
    } else {
        Ok(Outcome::Skipped)
    }
}

async fn record_conflict(pool: &SqlitePool, row: &MatchRow, msg: &MatchMessage) -> IngestResult<()> {
    let stored = json!({
        "status": row.status,
        "home_score": row.home_score,
        "away_score": row.away_score,
    });
    let incoming = json!({
        "status": msg.status,
        "home_score": msg.home_score,
        "away_score": msg.away_score,
    });
    conflicts::record_conflict(pool, row.guid, &stored, &incoming).await?;
    Ok(())
}

/// Read back the row a write landed on, by the message's identity key
async fn refetch(pool: &SqlitePool, msg: &MatchMessage) -> IngestResult<MatchRow> {
    let row = match &msg.external_match_id {
        Some(external_id) => matches::find_by_external_id(pool, external_id).await?,
        None => matches::find_by_natural_key(pool, msg).await?,
    };
    row.ok_or_else(|| IngestError::Internal("row vanished after conditional write".to_string()))
}
