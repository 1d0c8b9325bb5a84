//! Running-score reconstruction: the forward scan every other analysis
//! builds on. Assumes events arrive ordered by `event_number`; the store
//! guarantees that ordering.

use super::AnalyticsError;
use crate::models::{DbGame, DbPbpEvent};
use providers::normalize::parse_clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSides {
    pub game_id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
}

impl GameSides {
    pub fn of(game: &DbGame) -> Self {
        Self {
            game_id: game.id,
            home_team_id: game.home_team_id,
            away_team_id: game.away_team_id,
        }
    }

    pub fn is_home(&self, team_id: i64) -> Option<bool> {
        if team_id == self.home_team_id {
            Some(true)
        } else if team_id == self.away_team_id {
            Some(false)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreState {
    pub home: i32,
    pub away: i32,
}

impl ScoreState {
    pub fn margin(&self) -> i32 {
        self.home - self.away
    }
}

/// Points a single event is worth when it counts: made SHOTs are worth
/// their `shot_value` attribute, made free throws are worth one.
pub fn scored_points(event: &DbPbpEvent) -> i32 {
    if event.success != Some(true) {
        return 0;
    }
    match event.event_type.as_str() {
        "SHOT" => event
            .attributes
            .get("shot_value")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(2) as i32,
        "FREE_THROW" => 1,
        _ => 0,
    }
}

/// One event annotated with the score on either side of it and its parsed
/// clock.
#[derive(Debug)]
pub struct ScoredEvent<'a> {
    pub event: &'a DbPbpEvent,
    /// Score immediately before the event applies: the state "at the time
    /// of" the event.
    pub before: ScoreState,
    pub after: ScoreState,
    pub clock_seconds: i32,
}

pub fn clock_seconds(event: &DbPbpEvent) -> Result<i32, AnalyticsError> {
    parse_clock(&event.clock).map_err(|_| AnalyticsError::BadClock {
        event_number: event.event_number,
        raw: event.clock.clone(),
    })
}

/// Forward scan producing the score timeline.
pub fn score_timeline<'a>(
    sides: &GameSides,
    events: &'a [DbPbpEvent],
) -> Result<Vec<ScoredEvent<'a>>, AnalyticsError> {
    let mut state = ScoreState::default();
    let mut timeline = Vec::with_capacity(events.len());
    for event in events {
        let before = state;
        let points = scored_points(event);
        if points > 0 {
            let is_home =
                sides
                    .is_home(event.team_id)
                    .ok_or_else(|| AnalyticsError::UnknownTeam {
                        event_number: event.event_number,
                        team_id: event.team_id,
                    })?;
            if is_home {
                state.home += points;
            } else {
                state.away += points;
            }
        }
        timeline.push(ScoredEvent {
            event,
            before,
            after: state,
            clock_seconds: clock_seconds(event)?,
        });
    }
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testutil::{free_throw, shot};

    const SIDES: GameSides = GameSides {
        game_id: 1,
        home_team_id: 10,
        away_team_id: 20,
    };

    #[test]
    fn timeline_accumulates_made_shots_only() {
        let events = vec![
            shot(1, 1, "09:30", 10, 101, 2, true),
            shot(2, 1, "09:02", 20, 201, 3, false),
            shot(3, 1, "08:40", 20, 201, 3, true),
            free_throw(4, 1, "08:40", 10, 102, true),
            free_throw(5, 1, "08:40", 10, 102, false),
        ];
        let timeline = score_timeline(&SIDES, &events).unwrap();
        assert_eq!(timeline[0].before, ScoreState { home: 0, away: 0 });
        assert_eq!(timeline[0].after, ScoreState { home: 2, away: 0 });
        assert_eq!(timeline[1].after, ScoreState { home: 2, away: 0 });
        assert_eq!(timeline[2].after, ScoreState { home: 2, away: 3 });
        assert_eq!(timeline[3].after, ScoreState { home: 3, away: 3 });
        assert_eq!(timeline[4].after, ScoreState { home: 3, away: 3 });
        assert_eq!(timeline[2].before.margin(), 2);
    }

    #[test]
    fn unknown_team_is_an_error() {
        let events = vec![shot(1, 1, "05:00", 99, 101, 2, true)];
        assert!(matches!(
            score_timeline(&SIDES, &events),
            Err(AnalyticsError::UnknownTeam { team_id: 99, .. })
        ));
    }

    #[test]
    fn malformed_clock_is_an_error() {
        let mut event = shot(7, 2, "05:00", 10, 101, 2, true);
        event.clock = "nope".to_string();
        assert!(matches!(
            score_timeline(&SIDES, &[event]),
            Err(AnalyticsError::BadClock { event_number: 7, .. })
        ));
    }
}
