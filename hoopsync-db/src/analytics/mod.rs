//! Play-by-play analytics. Everything in this module is pure and
//! deterministic: functions take canonical rows (already ordered by
//! `event_number`) plus value-type filters, and return events or stat
//! bundles. Nothing here touches a connection.

pub mod clutch;
pub mod filters;
pub mod lineups;
pub mod onoff;
pub mod quarters;
pub mod score;
pub mod situational;

pub use filters::{ClutchFilter, FilterError, OpponentFilter, SituationalFilter, TimeFilter};
pub use score::{GameSides, ScoreState};

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AnalyticsError {
    #[error("event {event_number} has malformed clock {raw:?}")]
    BadClock { event_number: i32, raw: String },

    #[error("event {event_number} belongs to team {team_id}, which is neither side of the game")]
    UnknownTeam { event_number: i32, team_id: i64 },

    #[error("no starters recorded for team {team_id}; cannot reconstruct the floor")]
    MissingStarters { team_id: i64 },

    #[error("lineup size must be between 2 and 5, got {0}")]
    BadLineupSize(usize),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Filter(#[from] FilterError),
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::models::DbPbpEvent;
    use serde_json::{json, Map, Value};

    pub struct EventSpec {
        pub number: i32,
        pub period: i32,
        pub clock: &'static str,
        pub event_type: &'static str,
        pub player_id: Option<i64>,
        pub team_id: i64,
        pub success: Option<bool>,
        pub attributes: Map<String, Value>,
    }

    pub fn event(spec: EventSpec) -> DbPbpEvent {
        DbPbpEvent {
            id: spec.number as i64,
            game_id: 1,
            event_number: spec.number,
            period: spec.period,
            clock: spec.clock.to_string(),
            event_type: spec.event_type.to_string(),
            event_subtype: None,
            player_id: spec.player_id,
            team_id: spec.team_id,
            success: spec.success,
            coord_x: None,
            coord_y: None,
            attributes: Value::Object(spec.attributes),
        }
    }

    pub fn shot(
        number: i32,
        period: i32,
        clock: &'static str,
        team_id: i64,
        player_id: i64,
        value: i64,
        made: bool,
    ) -> DbPbpEvent {
        let mut attributes = Map::new();
        attributes.insert("shot_value".to_string(), json!(value));
        event(EventSpec {
            number,
            period,
            clock,
            event_type: "SHOT",
            player_id: Some(player_id),
            team_id,
            success: Some(made),
            attributes,
        })
    }

    pub fn free_throw(
        number: i32,
        period: i32,
        clock: &'static str,
        team_id: i64,
        player_id: i64,
        made: bool,
    ) -> DbPbpEvent {
        event(EventSpec {
            number,
            period,
            clock,
            event_type: "FREE_THROW",
            player_id: Some(player_id),
            team_id,
            success: Some(made),
            attributes: Map::new(),
        })
    }

    pub fn substitution(
        number: i32,
        period: i32,
        clock: &'static str,
        team_id: i64,
        player_in: i64,
        player_out: i64,
    ) -> DbPbpEvent {
        let mut attributes = Map::new();
        attributes.insert("player_in_id".to_string(), json!(player_in.to_string()));
        attributes.insert("player_out_id".to_string(), json!(player_out.to_string()));
        event(EventSpec {
            number,
            period,
            clock,
            event_type: "SUBSTITUTION",
            player_id: None,
            team_id,
            success: None,
            attributes,
        })
    }

    pub fn period_end(number: i32, period: i32, team_id: i64) -> DbPbpEvent {
        event(EventSpec {
            number,
            period,
            clock: "00:00",
            event_type: "PERIOD_END",
            player_id: None,
            team_id,
            success: None,
            attributes: Map::new(),
        })
    }
}
