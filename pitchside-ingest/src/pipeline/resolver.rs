//! Identity resolver
//!
//! Maps a validated message to zero or one existing match row. Automated
//! sources reliably supply a stable external id; manually entered matches
//! never have one and deduplicate by semantic equality instead, hence the
//! two-tier lookup.

use pitchside_common::db::models::MatchRow;
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::matches;
use crate::error::IngestResult;
use crate::message::MatchMessage;

/// Resolve a message to its existing row, if any.
///
/// Tier 1: external match id, when the message carries one.
/// Tier 2: composite natural key (date, teams, season, age group, match
/// type, division) otherwise.
pub async fn resolve(pool: &SqlitePool, msg: &MatchMessage) -> IngestResult<Option<MatchRow>> {
    if let Some(external_id) = &msg.external_match_id {
        let found = matches::find_by_external_id(pool, external_id).await?;
        debug!(
            external_id = %external_id,
            found = found.is_some(),
            "Resolved by external id"
        );
        return Ok(found);
    }

    let found = matches::find_by_natural_key(pool, msg).await?;
    debug!(
        home_team = %msg.home_team,
        away_team = %msg.away_team,
        date = %msg.date,
        found = found.is_some(),
        "Resolved by natural key"
    );
    Ok(found)
}
