//! Closed canonical vocabularies shared by every component downstream of the
//! sync boundary. Raw provider strings never cross this boundary; the
//! normalizers in [`crate::normalize`] are the only way in.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    PointGuard,
    ShootingGuard,
    SmallForward,
    PowerForward,
    Center,
    Guard,
    Forward,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Scheduled,
    Live,
    Final,
    Postponed,
    Cancelled,
}

impl GameStatus {
    /// FINAL may never revert to any other status.
    pub fn is_terminal(self) -> bool {
        self == GameStatus::Final
    }

    /// Scores are non-null exactly for these statuses.
    pub fn has_scores(self) -> bool {
        matches!(self, GameStatus::Live | GameStatus::Final)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Shot,
    FreeThrow,
    Rebound,
    Assist,
    Turnover,
    Steal,
    Block,
    Foul,
    Substitution,
    Timeout,
    JumpBall,
    PeriodStart,
    PeriodEnd,
    Violation,
}

impl EventType {
    /// Events that can move the running score when successful.
    pub fn is_scoring_attempt(self) -> bool {
        matches!(self, EventType::Shot | EventType::FreeThrow)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Started,
    Completed,
    Failed,
    Partial,
}

impl SyncStatus {
    pub fn is_terminal(self) -> bool {
        self != SyncStatus::Started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn enums_round_trip_through_their_wire_form() {
        for pos in Position::iter() {
            assert_eq!(Position::from_str(&pos.to_string()).unwrap(), pos);
        }
        for status in GameStatus::iter() {
            assert_eq!(GameStatus::from_str(&status.to_string()).unwrap(), status);
        }
        for ty in EventType::iter() {
            assert_eq!(EventType::from_str(&ty.to_string()).unwrap(), ty);
        }
        for status in SyncStatus::iter() {
            assert_eq!(SyncStatus::from_str(&status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn wire_form_is_screaming_snake() {
        assert_eq!(Position::PointGuard.to_string(), "POINT_GUARD");
        assert_eq!(GameStatus::Final.to_string(), "FINAL");
        assert_eq!(EventType::FreeThrow.to_string(), "FREE_THROW");
        assert_eq!(SyncStatus::Partial.to_string(), "PARTIAL");
    }

    #[test]
    fn only_final_is_terminal() {
        assert!(GameStatus::Final.is_terminal());
        assert!(!GameStatus::Live.is_terminal());
        assert!(GameStatus::Live.has_scores());
        assert!(!GameStatus::Postponed.has_scores());
    }
}
