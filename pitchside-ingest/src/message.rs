//! Inbound message types
//!
//! `RawMessage` is the loose shape a producer submits: every field optional,
//! scores and external ids as bare JSON values so type mismatches are caught
//! by the schema validator instead of a deserializer panic deep in the
//! pipeline. `MatchMessage` is the normalized, strongly-typed form the rest
//! of the pipeline consumes.

use chrono::NaiveDate;
use pitchside_common::db::models::{MatchSource, MatchStatus, MatchType};
use serde::{Deserialize, Serialize};

/// Unvalidated inbound message, as deserialized off the queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    /// Calendar date, `YYYY-MM-DD`
    pub date: Option<String>,
    pub season: Option<String>,
    pub age_group: Option<String>,
    pub match_type: Option<String>,
    pub division: Option<String>,
    pub status: Option<String>,
    /// Integer; kept as a raw value so non-integers fail validation, not parsing
    pub home_score: Option<serde_json::Value>,
    pub away_score: Option<serde_json::Value>,
    /// Source-assigned id; string or integer on the wire
    pub external_match_id: Option<serde_json::Value>,
    pub source: Option<String>,
}

/// Validated, normalized inbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchMessage {
    pub home_team: String,
    pub away_team: String,
    pub date: NaiveDate,
    pub season: String,
    pub age_group: String,
    pub match_type: MatchType,
    pub division: Option<String>,
    pub status: MatchStatus,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub external_match_id: Option<String>,
    pub source: MatchSource,
}

impl MatchMessage {
    /// Actor recorded in the audit columns: the source tag
    pub fn actor(&self) -> &'static str {
        self.source.as_str()
    }
}
