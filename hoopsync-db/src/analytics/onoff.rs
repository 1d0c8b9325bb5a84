//! On/off-court differentials: reconstruct who is on the floor from
//! starters plus SUBSTITUTION events, then split the game into segments and
//! compare team scoring with the player on vs off.

use super::score::{clock_seconds, scored_points, GameSides};
use super::AnalyticsError;
use crate::models::DbPbpEvent;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// What to do when a substitution event does not carry both player ids and
/// the floor state becomes unknowable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum LineupPolicy {
    /// Exclude segments with indeterminate lineups from both buckets
    /// (reported separately).
    #[default]
    DropSegments,
    /// Keep the best-known floor state and accept degraded accuracy.
    Degrade,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnOffParams {
    pub regulation_period_seconds: i32,
    pub overtime_period_seconds: i32,
    pub lineup_policy: LineupPolicy,
}

impl Default for OnOffParams {
    fn default() -> Self {
        Self {
            regulation_period_seconds: 600,
            overtime_period_seconds: 300,
            lineup_policy: LineupPolicy::default(),
        }
    }
}

impl OnOffParams {
    fn period_length(&self, period: i32) -> i32 {
        if period > 4 {
            self.overtime_period_seconds
        } else {
            self.regulation_period_seconds
        }
    }

    /// Absolute game time of a clock reading, in seconds since tip-off.
    pub fn elapsed_at(&self, period: i32, clock_remaining: i32) -> i32 {
        let mut before = 0;
        for p in 1..period {
            before += self.period_length(p);
        }
        before + (self.period_length(period) - clock_remaining)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OnOffBucket {
    pub seconds: i32,
    pub team_points: i32,
    pub opponent_points: i32,
}

impl OnOffBucket {
    pub fn plus_minus(&self) -> i32 {
        self.team_points - self.opponent_points
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OnOffReport {
    pub on: OnOffBucket,
    pub off: OnOffBucket,
    /// Floor time excluded under [`LineupPolicy::DropSegments`].
    pub indeterminate_seconds: i32,
}

/// Floor state of one team.
pub(super) struct Floor {
    pub on_court: BTreeSet<i64>,
    pub determinate: bool,
}

impl Floor {
    pub fn from_starters(starters: &[i64]) -> Self {
        Self {
            on_court: starters.iter().copied().collect(),
            determinate: true,
        }
    }

    /// Apply one substitution event's attributes.
    pub fn substitute(&mut self, event: &DbPbpEvent, policy: LineupPolicy) {
        let id_attr = |name: &str| -> Option<i64> {
            event
                .attributes
                .get(name)
                .and_then(serde_json::Value::as_str)
                .and_then(|raw| raw.parse().ok())
        };
        let player_in = id_attr("player_in_id");
        let player_out = id_attr("player_out_id");

        match (player_in, player_out) {
            (Some(incoming), Some(outgoing)) => {
                let removed = self.on_court.remove(&outgoing);
                if !removed {
                    debug!(
                        "event {}: substitution removes player {outgoing} who was not on \
                        the floor",
                        event.event_number,
                    );
                    if policy == LineupPolicy::DropSegments {
                        self.determinate = false;
                    }
                }
                self.on_court.insert(incoming);
            }
            (incoming, outgoing) => {
                debug!(
                    "event {}: substitution is missing {}",
                    event.event_number,
                    if incoming.is_none() && outgoing.is_none() {
                        "both player ids"
                    } else if incoming.is_none() {
                        "player_in_id"
                    } else {
                        "player_out_id"
                    },
                );
                match policy {
                    LineupPolicy::DropSegments => self.determinate = false,
                    LineupPolicy::Degrade => {
                        if let Some(outgoing) = outgoing {
                            self.on_court.remove(&outgoing);
                        }
                        if let Some(incoming) = incoming {
                            self.on_court.insert(incoming);
                        }
                    }
                }
            }
        }
    }
}

/// On/off report for `(player_id, game)`.
///
/// `starters_by_team` maps team id to the five starters recorded on the
/// game's player stat lines.
pub fn on_off(
    sides: &GameSides,
    events: &[DbPbpEvent],
    starters_by_team: &BTreeMap<i64, Vec<i64>>,
    player_id: i64,
    player_team_id: i64,
    params: &OnOffParams,
) -> Result<OnOffReport, AnalyticsError> {
    let starters = starters_by_team
        .get(&player_team_id)
        .filter(|starters| !starters.is_empty())
        .ok_or(AnalyticsError::MissingStarters {
            team_id: player_team_id,
        })?;
    let player_is_home =
        sides
            .is_home(player_team_id)
            .ok_or_else(|| AnalyticsError::UnknownTeam {
                event_number: 0,
                team_id: player_team_id,
            })?;

    let mut floor = Floor::from_starters(starters);
    let mut report = OnOffReport::default();

    let mut segment_start = 0i32;
    let mut segment_home_points = 0i32;
    let mut segment_away_points = 0i32;
    let mut last_elapsed = 0i32;

    let mut close_segment = |end: i32,
                             floor: &Floor,
                             report: &mut OnOffReport,
                             home_points: i32,
                             away_points: i32,
                             segment_start: &mut i32| {
        let duration = end - *segment_start;
        let (team_points, opponent_points) = if player_is_home {
            (home_points, away_points)
        } else {
            (away_points, home_points)
        };
        if !floor.determinate {
            report.indeterminate_seconds += duration;
        } else if floor.on_court.contains(&player_id) {
            report.on.seconds += duration;
            report.on.team_points += team_points;
            report.on.opponent_points += opponent_points;
        } else {
            report.off.seconds += duration;
            report.off.team_points += team_points;
            report.off.opponent_points += opponent_points;
        }
        *segment_start = end;
    };

    for event in events {
        let clock = clock_seconds(event)?;
        // Clamp: elapsed time never runs backwards even if a provider's
        // clocks wobble around a period boundary.
        let elapsed = params.elapsed_at(event.period, clock).max(last_elapsed);
        last_elapsed = elapsed;

        if event.event_type == "SUBSTITUTION" && event.team_id == player_team_id {
            close_segment(
                elapsed,
                &floor,
                &mut report,
                segment_home_points,
                segment_away_points,
                &mut segment_start,
            );
            segment_home_points = 0;
            segment_away_points = 0;
            floor.substitute(event, params.lineup_policy);
            continue;
        }

        let points = scored_points(event);
        if points > 0 {
            match sides.is_home(event.team_id) {
                Some(true) => segment_home_points += points,
                Some(false) => segment_away_points += points,
                None => {
                    return Err(AnalyticsError::UnknownTeam {
                        event_number: event.event_number,
                        team_id: event.team_id,
                    });
                }
            }
        }
    }

    close_segment(
        last_elapsed,
        &floor,
        &mut report,
        segment_home_points,
        segment_away_points,
        &mut segment_start,
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testutil::{period_end, shot, substitution};

    const SIDES: GameSides = GameSides {
        game_id: 1,
        home_team_id: 10,
        away_team_id: 20,
    };

    fn starters() -> BTreeMap<i64, Vec<i64>> {
        let mut map = BTreeMap::new();
        map.insert(10, vec![101, 102, 103, 104, 105]);
        map.insert(20, vec![201, 202, 203, 204, 205]);
        map
    }

    #[test]
    fn splits_time_and_points_at_the_substitution() {
        let events = vec![
            // First 5 minutes: home 5, away 2, player 101 on.
            shot(1, 1, "08:00", 10, 101, 2, true),
            shot(2, 1, "07:00", 20, 201, 2, true),
            shot(3, 1, "06:00", 10, 102, 3, true),
            substitution(4, 1, "05:00", 10, 106, 101),
            // Last 5 minutes: home 2, away 5, player 101 off.
            shot(5, 1, "04:00", 20, 202, 3, true),
            shot(6, 1, "03:00", 10, 103, 2, true),
            shot(7, 1, "01:00", 20, 203, 2, true),
            period_end(8, 1, 10),
        ];

        let report = on_off(
            &SIDES,
            &events,
            &starters(),
            101,
            10,
            &OnOffParams::default(),
        )
        .unwrap();

        assert_eq!(report.on.seconds, 300);
        assert_eq!(report.on.team_points, 5);
        assert_eq!(report.on.opponent_points, 2);
        assert_eq!(report.on.plus_minus(), 3);

        assert_eq!(report.off.seconds, 300);
        assert_eq!(report.off.team_points, 2);
        assert_eq!(report.off.opponent_points, 5);
        assert_eq!(report.off.plus_minus(), -3);

        assert_eq!(report.indeterminate_seconds, 0);
    }

    #[test]
    fn on_plus_off_covers_the_observed_game() {
        let events = vec![
            shot(1, 1, "07:12", 10, 101, 2, true),
            substitution(2, 1, "04:41", 10, 106, 101),
            period_end(3, 1, 10),
            shot(4, 2, "09:00", 20, 201, 2, true),
            substitution(5, 2, "06:30", 10, 101, 106),
            shot(6, 2, "02:15", 10, 101, 3, true),
            period_end(7, 2, 10),
        ];
        let params = OnOffParams::default();
        let report = on_off(&SIDES, &events, &starters(), 101, 10, &params).unwrap();

        let total = params.elapsed_at(2, 0);
        assert_eq!(
            report.on.seconds + report.off.seconds + report.indeterminate_seconds,
            total,
        );
        // On: 0..319 in Q1 (till 4:41) and from 6:30 of Q2 (810) to the end
        // (1200): 319 + 390 = 709.
        assert_eq!(report.on.seconds, 319 + 390);
        assert_eq!(report.off.seconds, total - 709);
    }

    #[test]
    fn opponent_subs_do_not_split_the_players_segments() {
        let events = vec![
            shot(1, 1, "08:00", 10, 101, 2, true),
            substitution(2, 1, "05:00", 20, 206, 201),
            shot(3, 1, "02:00", 20, 206, 2, true),
            period_end(4, 1, 10),
        ];
        let report = on_off(
            &SIDES,
            &events,
            &starters(),
            101,
            10,
            &OnOffParams::default(),
        )
        .unwrap();
        assert_eq!(report.on.seconds, 600);
        assert_eq!(report.on.team_points, 2);
        assert_eq!(report.on.opponent_points, 2);
        assert_eq!(report.off.seconds, 0);
    }

    #[test]
    fn missing_sub_ids_drop_segments_under_the_default_policy() {
        let mut bad_sub = substitution(2, 1, "05:00", 10, 106, 101);
        bad_sub
            .attributes
            .as_object_mut()
            .unwrap()
            .remove("player_out_id");

        let events = vec![
            shot(1, 1, "08:00", 10, 101, 2, true),
            bad_sub.clone(),
            shot(3, 1, "02:00", 10, 106, 2, true),
            period_end(4, 1, 10),
        ];

        let report = on_off(
            &SIDES,
            &events,
            &starters(),
            101,
            10,
            &OnOffParams::default(),
        )
        .unwrap();
        assert_eq!(report.on.seconds, 300);
        assert_eq!(report.indeterminate_seconds, 300);
        assert_eq!(report.off.seconds, 0);

        // Degrade keeps counting with the best-known floor.
        let params = OnOffParams {
            lineup_policy: LineupPolicy::Degrade,
            ..OnOffParams::default()
        };
        let events = vec![
            shot(1, 1, "08:00", 10, 101, 2, true),
            bad_sub,
            shot(3, 1, "02:00", 10, 106, 2, true),
            period_end(4, 1, 10),
        ];
        let report = on_off(&SIDES, &events, &starters(), 101, 10, &params).unwrap();
        assert_eq!(report.indeterminate_seconds, 0);
        // 101 was never seen leaving, so the degraded floor keeps them on.
        assert_eq!(report.on.seconds, 600);
    }

    #[test]
    fn missing_starters_is_an_error() {
        let events = vec![period_end(1, 1, 10)];
        let result = on_off(
            &SIDES,
            &events,
            &BTreeMap::new(),
            101,
            10,
            &OnOffParams::default(),
        );
        assert!(matches!(
            result,
            Err(AnalyticsError::MissingStarters { team_id: 10 })
        ));
    }
}
