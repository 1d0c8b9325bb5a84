//! Filter value types. Each analysis accepts one of these by value;
//! validation catches the mutually-exclusive combinations up front so the
//! facade can turn them into 422s.

use crate::models::{DbGame, DbPbpEvent};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum FilterError {
    #[error("home_only and away_only are mutually exclusive")]
    HomeAwayExclusive,

    #[error("period and periods are mutually exclusive")]
    PeriodPeriodsExclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClutchFilter {
    pub time_remaining_seconds: i32,
    pub score_margin: i32,
    pub include_overtime: bool,
    pub min_period: i32,
}

impl Default for ClutchFilter {
    fn default() -> Self {
        Self {
            time_remaining_seconds: 300,
            score_margin: 5,
            include_overtime: true,
            min_period: 4,
        }
    }
}

impl ClutchFilter {
    /// Margin is evaluated on the score immediately before the event.
    pub fn matches(&self, period: i32, clock_seconds: i32, margin: i32) -> bool {
        let period_ok = if period > 4 {
            self.include_overtime
        } else {
            period >= self.min_period
        };
        period_ok
            && clock_seconds <= self.time_remaining_seconds
            && margin.abs() <= self.score_margin
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SituationalFilter {
    pub fast_break: Option<bool>,
    pub second_chance: Option<bool>,
    pub contested: Option<bool>,
    pub shot_type: Option<String>,
}

impl SituationalFilter {
    /// Equality test against a SHOT event's attributes; `None` fields do
    /// not constrain. An absent attribute fails any constrained test.
    pub fn matches(&self, event: &DbPbpEvent) -> bool {
        if event.event_type != "SHOT" {
            return false;
        }
        let attr_bool = |name: &str| {
            event
                .attributes
                .get(name)
                .and_then(serde_json::Value::as_bool)
        };
        if let Some(expected) = self.fast_break {
            if attr_bool("fast_break") != Some(expected) {
                return false;
            }
        }
        if let Some(expected) = self.second_chance {
            if attr_bool("second_chance") != Some(expected) {
                return false;
            }
        }
        if let Some(expected) = self.contested {
            if attr_bool("contested") != Some(expected) {
                return false;
            }
        }
        if let Some(expected) = &self.shot_type {
            let actual = event
                .attributes
                .get("shot_type")
                .and_then(serde_json::Value::as_str);
            if actual != Some(expected.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentFilter {
    pub opponent_team_id: Option<i64>,
    pub home_only: bool,
    pub away_only: bool,
}

impl OpponentFilter {
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.home_only && self.away_only {
            return Err(FilterError::HomeAwayExclusive);
        }
        Ok(())
    }

    /// Does `game` qualify from the perspective of `team_id`?
    pub fn game_matches(&self, game: &DbGame, team_id: i64) -> bool {
        let is_home = game.home_team_id == team_id;
        let is_away = game.away_team_id == team_id;
        if !is_home && !is_away {
            return false;
        }
        if self.home_only && !is_home {
            return false;
        }
        if self.away_only && !is_away {
            return false;
        }
        if let Some(opponent) = self.opponent_team_id {
            let actual_opponent = if is_home {
                game.away_team_id
            } else {
                game.home_team_id
            };
            if actual_opponent != opponent {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFilter {
    pub period: Option<i32>,
    pub periods: Option<Vec<i32>>,
    pub exclude_garbage_time: bool,
    pub min_time_remaining: Option<i32>,
    pub max_time_remaining: Option<i32>,
}

/// Running margin beyond which an event counts as garbage time.
const GARBAGE_TIME_MARGIN: i32 = 20;

impl TimeFilter {
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.period.is_some() && self.periods.is_some() {
            return Err(FilterError::PeriodPeriodsExclusive);
        }
        Ok(())
    }

    pub fn matches(&self, period: i32, clock_seconds: i32, margin: i32) -> bool {
        if let Some(wanted) = self.period {
            if period != wanted {
                return false;
            }
        }
        if let Some(wanted) = &self.periods {
            if !wanted.contains(&period) {
                return false;
            }
        }
        if self.exclude_garbage_time && margin.abs() > GARBAGE_TIME_MARGIN {
            return false;
        }
        if let Some(min) = self.min_time_remaining {
            if clock_seconds < min {
                return false;
            }
        }
        if let Some(max) = self.max_time_remaining {
            if clock_seconds > max {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testutil::shot;
    use serde_json::json;

    #[test]
    fn clutch_defaults_match_the_contract() {
        let filter = ClutchFilter::default();
        assert_eq!(filter.time_remaining_seconds, 300);
        assert_eq!(filter.score_margin, 5);
        assert!(filter.include_overtime);
        assert_eq!(filter.min_period, 4);

        assert!(filter.matches(4, 300, 5));
        assert!(filter.matches(5, 120, -3));
        assert!(!filter.matches(3, 120, 0));
        assert!(!filter.matches(4, 301, 0));
        assert!(!filter.matches(4, 120, 6));
    }

    #[test]
    fn overtime_can_be_excluded() {
        let filter = ClutchFilter {
            include_overtime: false,
            ..ClutchFilter::default()
        };
        assert!(filter.matches(4, 100, 0));
        assert!(!filter.matches(5, 100, 0));
    }

    #[test]
    fn situational_none_means_unconstrained() {
        let mut event = shot(1, 1, "05:00", 10, 101, 2, true);
        event
            .attributes
            .as_object_mut()
            .unwrap()
            .insert("fast_break".to_string(), json!(true));

        assert!(SituationalFilter::default().matches(&event));
        assert!(SituationalFilter {
            fast_break: Some(true),
            ..Default::default()
        }
        .matches(&event));
        assert!(!SituationalFilter {
            fast_break: Some(false),
            ..Default::default()
        }
        .matches(&event));
        // Constrained attribute absent from the event: no match.
        assert!(!SituationalFilter {
            contested: Some(true),
            ..Default::default()
        }
        .matches(&event));
    }

    #[test]
    fn opponent_filter_validates_exclusive_flags() {
        let filter = OpponentFilter {
            home_only: true,
            away_only: true,
            ..Default::default()
        };
        assert_eq!(filter.validate(), Err(FilterError::HomeAwayExclusive));
    }

    #[test]
    fn time_filter_validates_period_exclusivity_and_garbage_time() {
        let filter = TimeFilter {
            period: Some(4),
            periods: Some(vec![1, 2]),
            ..Default::default()
        };
        assert_eq!(filter.validate(), Err(FilterError::PeriodPeriodsExclusive));

        let filter = TimeFilter {
            exclude_garbage_time: true,
            ..Default::default()
        };
        assert!(filter.matches(2, 400, 20));
        assert!(!filter.matches(2, 400, 21));
        assert!(!filter.matches(2, 400, -21));
    }
}
