//! Lineup plus/minus: floor time and scoring differential for player
//! combinations observed together on one team.

use super::onoff::{Floor, OnOffParams};
use super::score::{clock_seconds, scored_points, GameSides};
use super::AnalyticsError;
use crate::models::DbPbpEvent;
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineupStats {
    pub seconds: i32,
    pub team_points: i32,
    pub opponent_points: i32,
}

impl LineupStats {
    pub fn plus_minus(&self) -> i32 {
        self.team_points - self.opponent_points
    }
}

/// Per-five-man-unit floor segments for `team_id`, keyed by the sorted
/// player ids of the unit. Indeterminate stretches are dropped.
pub fn lineup_segments(
    sides: &GameSides,
    events: &[DbPbpEvent],
    starters_by_team: &BTreeMap<i64, Vec<i64>>,
    team_id: i64,
    params: &OnOffParams,
) -> Result<BTreeMap<Vec<i64>, LineupStats>, AnalyticsError> {
    let starters = starters_by_team
        .get(&team_id)
        .filter(|starters| !starters.is_empty())
        .ok_or(AnalyticsError::MissingStarters { team_id })?;
    let team_is_home = sides
        .is_home(team_id)
        .ok_or(AnalyticsError::UnknownTeam {
            event_number: 0,
            team_id,
        })?;

    let mut floor = Floor::from_starters(starters);
    let mut segments: BTreeMap<Vec<i64>, LineupStats> = BTreeMap::new();

    let mut segment_start = 0i32;
    let mut home_points = 0i32;
    let mut away_points = 0i32;
    let mut last_elapsed = 0i32;

    let mut close_segment =
        |end: i32, floor: &Floor, home_points: i32, away_points: i32, start: &mut i32,
         segments: &mut BTreeMap<Vec<i64>, LineupStats>| {
            let duration = end - *start;
            *start = end;
            if !floor.determinate {
                return;
            }
            let key: Vec<i64> = floor.on_court.iter().copied().collect();
            let stats = segments.entry(key).or_default();
            stats.seconds += duration;
            if team_is_home {
                stats.team_points += home_points;
                stats.opponent_points += away_points;
            } else {
                stats.team_points += away_points;
                stats.opponent_points += home_points;
            }
        };

    for event in events {
        let clock = clock_seconds(event)?;
        let elapsed = params.elapsed_at(event.period, clock).max(last_elapsed);
        last_elapsed = elapsed;

        if event.event_type == "SUBSTITUTION" && event.team_id == team_id {
            close_segment(
                elapsed,
                &floor,
                home_points,
                away_points,
                &mut segment_start,
                &mut segments,
            );
            home_points = 0;
            away_points = 0;
            floor.substitute(event, params.lineup_policy);
            continue;
        }

        let points = scored_points(event);
        if points > 0 {
            match sides.is_home(event.team_id) {
                Some(true) => home_points += points,
                Some(false) => away_points += points,
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
        home_points,
        away_points,
        &mut segment_start,
        &mut segments,
    );

    Ok(segments)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineupEntry {
    pub players: Vec<i64>,
    pub seconds: i32,
    pub team_points: i32,
    pub opponent_points: i32,
    pub plus_minus: i32,
}

/// All distinct `size`-player combinations observed on the floor for
/// `team_id`, with at least `min_seconds` together, sorted by plus/minus
/// descending (ties by ascending player ids, so output is stable).
pub fn best_lineups(
    sides: &GameSides,
    events: &[DbPbpEvent],
    starters_by_team: &BTreeMap<i64, Vec<i64>>,
    team_id: i64,
    size: usize,
    min_seconds: i32,
    params: &OnOffParams,
) -> Result<Vec<LineupEntry>, AnalyticsError> {
    if !(2..=5).contains(&size) {
        return Err(AnalyticsError::BadLineupSize(size));
    }

    let segments = lineup_segments(sides, events, starters_by_team, team_id, params)?;

    let mut combos: BTreeMap<Vec<i64>, LineupStats> = BTreeMap::new();
    for (unit, stats) in &segments {
        for combo in unit.iter().copied().combinations(size) {
            let entry = combos.entry(combo).or_default();
            entry.seconds += stats.seconds;
            entry.team_points += stats.team_points;
            entry.opponent_points += stats.opponent_points;
        }
    }

    let mut entries: Vec<LineupEntry> = combos
        .into_iter()
        .filter(|(_, stats)| stats.seconds >= min_seconds)
        .map(|(players, stats)| LineupEntry {
            players,
            seconds: stats.seconds,
            team_points: stats.team_points,
            opponent_points: stats.opponent_points,
            plus_minus: stats.plus_minus(),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.plus_minus
            .cmp(&a.plus_minus)
            .then_with(|| a.players.cmp(&b.players))
    });
    Ok(entries)
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
    fn segments_track_five_man_units() {
        let events = vec![
            shot(1, 1, "08:00", 10, 101, 2, true),
            shot(2, 1, "06:00", 20, 201, 3, true),
            substitution(3, 1, "05:00", 10, 106, 105),
            shot(4, 1, "03:00", 10, 106, 2, true),
            period_end(5, 1, 10),
        ];
        let segments =
            lineup_segments(&SIDES, &events, &starters(), 10, &OnOffParams::default()).unwrap();
        assert_eq!(segments.len(), 2);

        let first = &segments[&vec![101, 102, 103, 104, 105]];
        assert_eq!(first.seconds, 300);
        assert_eq!(first.team_points, 2);
        assert_eq!(first.opponent_points, 3);

        let second = &segments[&vec![101, 102, 103, 104, 106]];
        assert_eq!(second.seconds, 300);
        assert_eq!(second.plus_minus(), 2);
    }

    #[test]
    fn best_lineups_aggregates_combinations_across_units() {
        let events = vec![
            shot(1, 1, "08:00", 10, 101, 2, true),
            substitution(2, 1, "05:00", 10, 106, 105),
            shot(3, 1, "03:00", 20, 201, 2, true),
            period_end(4, 1, 10),
        ];
        let pairs = best_lineups(
            &SIDES,
            &events,
            &starters(),
            10,
            2,
            0,
            &OnOffParams::default(),
        )
        .unwrap();

        // 101 and 102 were together the whole period, net 0.
        let together = pairs
            .iter()
            .find(|entry| entry.players == vec![101, 102])
            .unwrap();
        assert_eq!(together.seconds, 600);
        assert_eq!(together.plus_minus, 0);

        // 104+105 only existed before the sub, when the team was +2.
        let early = pairs
            .iter()
            .find(|entry| entry.players == vec![104, 105])
            .unwrap();
        assert_eq!(early.seconds, 300);
        assert_eq!(early.plus_minus, 2);

        // 104+106 only existed after the sub, when the team was -2.
        let late = pairs
            .iter()
            .find(|entry| entry.players == vec![104, 106])
            .unwrap();
        assert_eq!(late.seconds, 300);
        assert_eq!(late.plus_minus, -2);
    }

    #[test]
    fn sorted_by_plus_minus_with_stable_ties() {
        let events = vec![
            shot(1, 1, "08:00", 10, 101, 2, true),
            period_end(2, 1, 10),
        ];
        let pairs = best_lineups(
            &SIDES,
            &events,
            &starters(),
            10,
            2,
            0,
            &OnOffParams::default(),
        )
        .unwrap();
        // All pairs have identical stats; order must be ascending by ids.
        let players: Vec<&Vec<i64>> = pairs.iter().map(|entry| &entry.players).collect();
        let mut sorted = players.clone();
        sorted.sort();
        assert_eq!(players, sorted);
        assert_eq!(pairs.len(), 10);
    }

    #[test]
    fn min_seconds_filters_short_stints() {
        let events = vec![
            substitution(1, 1, "09:40", 10, 106, 105),
            period_end(2, 1, 10),
        ];
        let pairs = best_lineups(
            &SIDES,
            &events,
            &starters(),
            10,
            2,
            60,
            &OnOffParams::default(),
        )
        .unwrap();
        // The pre-sub unit lasted 20 seconds; only post-sub pairs survive.
        assert!(pairs.iter().all(|entry| !entry.players.contains(&105)));
    }

    #[test]
    fn size_out_of_range_is_rejected() {
        let events = vec![period_end(1, 1, 10)];
        assert!(matches!(
            best_lineups(
                &SIDES,
                &events,
                &starters(),
                10,
                6,
                0,
                &OnOffParams::default(),
            ),
            Err(AnalyticsError::BadLineupSize(6))
        ));
    }
}
