//! Canonical raw records: the shape every adapter emits after mapping.
//!
//! Downstream components never see provider wire types. A raw record is
//! already normalized (enums canonical, names split, minutes in seconds) and
//! tagged with the provider's external ids; anything the canonical schema
//! has no column for rides in the `extra`/`attributes` maps.

use crate::normalize::NormalizeError;
use crate::taxa::{EventType, GameStatus, Position};
use chrono::{NaiveDate, NaiveDateTime};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A record-level mapping failure. The orchestrator records these as skips;
/// they never abort a whole run.
#[derive(Debug, Error, Diagnostic)]
pub enum MapError {
    #[error("{source_name} payload for {entity} is missing required field {field:?}")]
    MissingField {
        source_name: &'static str,
        entity: &'static str,
        field: String,
    },

    #[error("{source_name} payload for {entity} has malformed field {field:?}: {detail}")]
    MalformedField {
        source_name: &'static str,
        entity: &'static str,
        field: String,
        detail: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("{source_name} box score line {external_id:?} violates {rule}: {detail}")]
    Arithmetic {
        source_name: &'static str,
        external_id: String,
        rule: &'static str,
        detail: String,
    },
}

/// Per-entry result for list endpoints, so one malformed entry skips that
/// record instead of the whole response.
pub type Mapped<T> = Result<T, MapError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSeason {
    pub external_id: String,
    pub league_code: String,
    pub league_name: String,
    pub league_country: Option<String>,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTeam {
    pub external_id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub roster: Vec<RawPlayer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPlayer {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub height_cm: Option<i32>,
    pub positions: Vec<Position>,
    pub jersey_number: Option<i32>,
    pub extra: Map<String, Value>,
}

impl RawPlayer {
    pub fn full_name(&self) -> String {
        if self.first_name.is_empty() {
            self.last_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGame {
    pub external_id: String,
    pub season_external_id: String,
    pub home_team_external_id: String,
    pub away_team_external_id: String,
    pub game_date: NaiveDateTime,
    pub status: GameStatus,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub venue: Option<String>,
    pub attendance: Option<i32>,
}

/// The full stat counters shared by player and team lines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStatCounters {
    pub points: i32,
    pub fgm: i32,
    pub fga: i32,
    pub two_pm: i32,
    pub two_pa: i32,
    pub three_pm: i32,
    pub three_pa: i32,
    pub ftm: i32,
    pub fta: i32,
    pub oreb: i32,
    pub dreb: i32,
    pub treb: i32,
    pub ast: i32,
    pub tov: i32,
    pub stl: i32,
    pub blk: i32,
    pub pf: i32,
}

impl RawStatCounters {
    /// Box-score arithmetic invariants, enforced at map time so nothing
    /// inconsistent ever reaches the store.
    pub fn validate(
        &self,
        source_name: &'static str,
        external_id: &str,
    ) -> Result<(), MapError> {
        let arithmetic = |rule: &'static str, detail: String| MapError::Arithmetic {
            source_name,
            external_id: external_id.to_string(),
            rule,
            detail,
        };

        let counters = [
            self.points, self.fgm, self.fga, self.two_pm, self.two_pa, self.three_pm,
            self.three_pa, self.ftm, self.fta, self.oreb, self.dreb, self.treb, self.ast,
            self.tov, self.stl, self.blk, self.pf,
        ];
        if counters.iter().any(|&c| c < 0) {
            return Err(arithmetic("counters >= 0", format!("{self:?}")));
        }
        if self.fgm > self.fga {
            return Err(arithmetic(
                "fgm <= fga",
                format!("fgm={} fga={}", self.fgm, self.fga),
            ));
        }
        if self.two_pm + self.three_pm != self.fgm {
            return Err(arithmetic(
                "2pm + 3pm == fgm",
                format!("2pm={} 3pm={} fgm={}", self.two_pm, self.three_pm, self.fgm),
            ));
        }
        if self.oreb + self.dreb != self.treb {
            return Err(arithmetic(
                "oreb + dreb == treb",
                format!("oreb={} dreb={} treb={}", self.oreb, self.dreb, self.treb),
            ));
        }
        if 2 * self.two_pm + 3 * self.three_pm + self.ftm != self.points {
            return Err(arithmetic(
                "points == 2*2pm + 3*3pm + ftm",
                format!(
                    "2pm={} 3pm={} ftm={} points={}",
                    self.two_pm, self.three_pm, self.ftm, self.points
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPlayerLine {
    pub player: RawPlayer,
    pub team_external_id: String,
    pub seconds_played: i32,
    pub is_starter: bool,
    pub counters: RawStatCounters,
    pub plus_minus: i32,
    pub efficiency: i32,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTeamLine {
    pub team_external_id: String,
    pub counters: RawStatCounters,
    pub fast_break_points: Option<i32>,
    pub points_in_paint: Option<i32>,
    pub second_chance_points: Option<i32>,
    pub bench_points: Option<i32>,
    pub biggest_lead: Option<i32>,
    pub seconds_leading: Option<i32>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBoxScore {
    pub game: RawGame,
    pub player_lines: Vec<RawPlayerLine>,
    pub team_lines: Vec<RawTeamLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEventLink {
    pub event_number: i32,
    pub relation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPbpEvent {
    pub event_number: i32,
    pub period: i32,
    /// Remaining period time, "MM:SS".
    pub clock: String,
    pub event_type: EventType,
    pub event_subtype: Option<String>,
    pub player_external_id: Option<String>,
    pub team_external_id: String,
    pub success: Option<bool>,
    pub coord_x: Option<f64>,
    pub coord_y: Option<f64>,
    /// Normalized attribute bag: `shot_value`, `fast_break`,
    /// `second_chance`, `contested`, `shot_type`, substitution
    /// `player_in_id`/`player_out_id` (external ids until persisted), and
    /// any provider extras.
    pub attributes: Map<String, Value>,
    pub links: Vec<RawEventLink>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consistent_counters() -> RawStatCounters {
        RawStatCounters {
            points: 21,
            fgm: 8,
            fga: 15,
            two_pm: 5,
            two_pa: 9,
            three_pm: 3,
            three_pa: 6,
            ftm: 2,
            fta: 2,
            oreb: 1,
            dreb: 5,
            treb: 6,
            ast: 4,
            tov: 2,
            stl: 1,
            blk: 0,
            pf: 3,
        }
    }

    #[test]
    fn consistent_line_validates() {
        consistent_counters().validate("winner", "p1").unwrap();
    }

    #[test]
    fn split_mismatch_is_rejected() {
        let mut counters = consistent_counters();
        counters.three_pm = 2;
        let err = counters.validate("winner", "p1").unwrap_err();
        match err {
            MapError::Arithmetic { rule, .. } => assert_eq!(rule, "2pm + 3pm == fgm"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rebound_and_points_identities_are_enforced() {
        let mut counters = consistent_counters();
        counters.treb = 7;
        assert!(counters.validate("winner", "p1").is_err());

        let mut counters = consistent_counters();
        counters.points = 20;
        assert!(counters.validate("winner", "p1").is_err());

        let mut counters = consistent_counters();
        counters.stl = -1;
        assert!(counters.validate("winner", "p1").is_err());
    }
}
