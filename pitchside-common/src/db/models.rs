//! Database models and status state machine
//!
//! The `matches` table is the authoritative store. Match status progresses
//! through a fixed edge set; everything outside that set is an invalid
//! transition and is surfaced as a conflict rather than applied.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Match lifecycle status
///
/// `Tbd` means the match has been played but the score is not yet known
/// from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Tbd,
    Live,
    Completed,
    Postponed,
    Cancelled,
}

impl MatchStatus {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Tbd => "tbd",
            MatchStatus::Live => "live",
            MatchStatus::Completed => "completed",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    /// Parse from database / wire representation
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "scheduled" => Ok(MatchStatus::Scheduled),
            "tbd" => Ok(MatchStatus::Tbd),
            "live" => Ok(MatchStatus::Live),
            "completed" => Ok(MatchStatus::Completed),
            "postponed" => Ok(MatchStatus::Postponed),
            "cancelled" => Ok(MatchStatus::Cancelled),
            other => Err(Error::InvalidInput(format!("unknown match status: {other}"))),
        }
    }

    /// Whether a status change to `to` is within the allowed edge set.
    ///
    /// Same-status is not a transition and is always permitted; the
    /// reconciliation engine decides separately whether it is a no-op.
    ///
    /// | From      | Allowed To                          |
    /// |-----------|-------------------------------------|
    /// | scheduled | tbd, completed, postponed, cancelled|
    /// | tbd       | completed, cancelled                |
    /// | live      | completed, cancelled                |
    /// | completed | (terminal)                          |
    /// | postponed | scheduled                           |
    /// | cancelled | (terminal)                          |
    pub fn can_transition_to(&self, to: MatchStatus) -> bool {
        use MatchStatus::*;
        if *self == to {
            return true;
        }
        matches!(
            (*self, to),
            (Scheduled, Tbd)
                | (Scheduled, Completed)
                | (Scheduled, Postponed)
                | (Scheduled, Cancelled)
                | (Tbd, Completed)
                | (Tbd, Cancelled)
                | (Live, Completed)
                | (Live, Cancelled)
                | (Postponed, Scheduled)
        )
    }

    /// Terminal statuses accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a match row or inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Manual,
    Automated,
}

impl MatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSource::Manual => "manual",
            MatchSource::Automated => "automated",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "manual" => Ok(MatchSource::Manual),
            "automated" => Ok(MatchSource::Automated),
            other => Err(Error::InvalidInput(format!("unknown source: {other}"))),
        }
    }
}

impl std::fmt::Display for MatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    League,
    Tournament,
    Friendly,
    Playoff,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::League => "league",
            MatchType::Tournament => "tournament",
            MatchType::Friendly => "friendly",
            MatchType::Playoff => "playoff",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "league" => Ok(MatchType::League),
            "tournament" => Ok(MatchType::Tournament),
            "friendly" => Ok(MatchType::Friendly),
            "playoff" => Ok(MatchType::Playoff),
            other => Err(Error::InvalidInput(format!("unknown match type: {other}"))),
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted match row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRow {
    pub guid: Uuid,
    pub external_match_id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub match_date: NaiveDate,
    pub season: String,
    pub age_group: String,
    pub match_type: MatchType,
    pub division: Option<String>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub status: MatchStatus,
    pub source: MatchSource,
    pub locked: bool,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Conflict surface entry: a detected disagreement between stored (locked)
/// data and an incoming automated update, awaiting manual resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub guid: Uuid,
    pub match_id: Uuid,
    /// JSON document of the stored status/scores at detection time
    pub stored_value: serde_json::Value,
    /// JSON document of the incoming status/scores that were refused
    pub incoming_value: serde_json::Value,
    pub detected_at: String,
    pub resolved_at: Option<String>,
}

/// Dead-letter failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeadLetterCategory {
    /// Malformed message; will never succeed on replay
    Validation,
    /// Retries exhausted or non-self-resolving storage failure
    ExhaustedRetries,
}

impl DeadLetterCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadLetterCategory::Validation => "validation",
            DeadLetterCategory::ExhaustedRetries => "exhausted-retries",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "validation" => Ok(DeadLetterCategory::Validation),
            "exhausted-retries" => Ok(DeadLetterCategory::ExhaustedRetries),
            other => Err(Error::InvalidInput(format!(
                "unknown dead letter category: {other}"
            ))),
        }
    }
}

/// Dead-letter channel entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub guid: Uuid,
    /// Original message payload, verbatim
    pub payload: serde_json::Value,
    pub category: DeadLetterCategory,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: String,
}

/// A message claimed from the inbound queue
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub id: i64,
    pub payload: String,
}
