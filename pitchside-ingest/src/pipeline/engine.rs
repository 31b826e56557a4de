//! Reconciliation engine
//!
//! Pure decision logic: given the existing row (if any) and a validated
//! inbound message, decide CREATE / UPDATE / SKIP or raise a conflict-class
//! error. No I/O happens here; the pipeline applies the decision through
//! the persistence adapter.

use pitchside_common::db::models::{MatchRow, MatchSource};

use crate::error::IngestError;
use crate::message::MatchMessage;

/// Reconciliation decision for one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No existing row: persist as a new match
    Create,
    /// Apply the message to the existing row
    Update,
    /// Idempotent no-op: nothing would change
    Skip,
}

/// Decide what to do with a message.
///
/// Rules, in order:
/// - no existing row → CREATE
/// - locked row + automated source → CONFLICT if the message diverges from
///   the stored values, SKIP if identical (redelivery of applied data)
/// - any status change must be within the allowed edge set, else
///   invalid-transition (surfaced as a conflict, including for manual
///   messages: `completed` stays terminal even for admins)
/// - unlocked row + automated source → UPDATE only if something actually
///   changes, else SKIP (`tbd → tbd` with no new information never churns
///   the audit timestamp)
/// - manual source → always UPDATE; the persistence adapter locks the row
///   as a side effect so the human correction sticks
pub fn reconcile(existing: Option<&MatchRow>, msg: &MatchMessage) -> Result<Decision, IngestError> {
    let Some(row) = existing else {
        return Ok(Decision::Create);
    };

    if row.locked && msg.source == MatchSource::Automated {
        if diverges(row, msg) {
            return Err(IngestError::LockedConflict { match_id: row.guid });
        }
        return Ok(Decision::Skip);
    }

    if msg.status != row.status && !row.status.can_transition_to(msg.status) {
        return Err(IngestError::InvalidTransition {
            match_id: row.guid,
            from: row.status,
            to: msg.status,
        });
    }

    match msg.source {
        MatchSource::Manual => Ok(Decision::Update),
        MatchSource::Automated => {
            if diverges(row, msg) {
                Ok(Decision::Update)
            } else {
                Ok(Decision::Skip)
            }
        }
    }
}

/// Whether applying the message would change the stored score or status.
///
/// A score the message omits means "no new information" and compares equal
/// to whatever is stored, matching the persistence adapter's COALESCE.
pub fn diverges(row: &MatchRow, msg: &MatchMessage) -> bool {
    if msg.status != row.status {
        return true;
    }
    let effective_home = msg.home_score.or(row.home_score);
    let effective_away = msg.away_score.or(row.away_score);
    effective_home != row.home_score || effective_away != row.away_score
}
