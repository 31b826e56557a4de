//! Schema validator
//!
//! First stage of the pipeline: checks an inbound message against required
//! fields and enumerations before it can reach reconciliation. Failures are
//! never retried; the caller routes them straight to the dead-letter channel.

use chrono::NaiveDate;
use pitchside_common::db::models::{MatchSource, MatchStatus, MatchType};

use crate::error::ValidationError;
use crate::message::{MatchMessage, RawMessage};

/// Validate and normalize an inbound message.
///
/// Collects every field problem in one pass so the dead-letter entry names
/// all offenders, not just the first.
pub fn validate(raw: &RawMessage) -> Result<MatchMessage, ValidationError> {
    let mut issues = Vec::new();

    let home_team = require_str(&raw.home_team, "home_team", &mut issues);
    let away_team = require_str(&raw.away_team, "away_team", &mut issues);
    let season = require_str(&raw.season, "season", &mut issues);
    let age_group = require_str(&raw.age_group, "age_group", &mut issues);

    if let (Some(home), Some(away)) = (&home_team, &away_team) {
        if home == away {
            issues.push("away_team: must differ from home_team".to_string());
        }
    }

    let date = match &raw.date {
        None => {
            issues.push("date: missing".to_string());
            None
        }
        Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                issues.push(format!("date: not a calendar date: '{s}'"));
                None
            }
        },
    };

    let match_type = match &raw.match_type {
        None => {
            issues.push("match_type: missing".to_string());
            None
        }
        Some(s) => match MatchType::parse(s) {
            Ok(t) => Some(t),
            Err(_) => {
                issues.push(format!("match_type: unknown value '{s}'"));
                None
            }
        },
    };

    let status = match &raw.status {
        None => {
            issues.push("status: missing".to_string());
            None
        }
        Some(s) => match MatchStatus::parse(s) {
            Ok(st) => Some(st),
            Err(_) => {
                issues.push(format!("status: unknown value '{s}'"));
                None
            }
        },
    };

    let source = match &raw.source {
        None => {
            issues.push("source: missing".to_string());
            None
        }
        Some(s) => match MatchSource::parse(s) {
            Ok(src) => Some(src),
            Err(_) => {
                issues.push(format!("source: unknown value '{s}'"));
                None
            }
        },
    };

    let home_score = optional_score(&raw.home_score, "home_score", &mut issues);
    let away_score = optional_score(&raw.away_score, "away_score", &mut issues);

    // Scores become mandatory once the source reports the match completed
    if status == Some(MatchStatus::Completed) {
        if home_score.is_none() {
            issues.push("home_score: required when status is completed".to_string());
        }
        if away_score.is_none() {
            issues.push("away_score: required when status is completed".to_string());
        }
    }

    let external_match_id = match &raw.external_match_id {
        // Explicit null is the same as absent
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Number(n)) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        Some(other) => {
            issues.push(format!(
                "external_match_id: expected string or integer, got {other}"
            ));
            None
        }
    };

    // Division is optional; empty string is treated as absent
    let division = raw
        .division
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if !issues.is_empty() {
        return Err(ValidationError { issues });
    }

    // All fields verified present above; unwraps cannot fire past this point
    Ok(MatchMessage {
        home_team: home_team.unwrap(),
        away_team: away_team.unwrap(),
        date: date.unwrap(),
        season: season.unwrap(),
        age_group: age_group.unwrap(),
        match_type: match_type.unwrap(),
        division,
        status: status.unwrap(),
        home_score,
        away_score,
        external_match_id,
        source: source.unwrap(),
    })
}

fn require_str(
    value: &Option<String>,
    field: &str,
    issues: &mut Vec<String>,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(s.to_string()),
        _ => {
            issues.push(format!("{field}: missing"));
            None
        }
    }
}

fn optional_score(
    value: &Option<serde_json::Value>,
    field: &str,
    issues: &mut Vec<String>,
) -> Option<i64> {
    match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(v) if v >= 0 => Some(v),
            Some(v) => {
                issues.push(format!("{field}: must be non-negative, got {v}"));
                None
            }
            None => {
                issues.push(format!("{field}: must be an integer, got {n}"));
                None
            }
        },
        Some(other) => {
            issues.push(format!("{field}: must be an integer, got {other}"));
            None
        }
    }
}
