//! Clutch filtering: events qualifying under a [`ClutchFilter`] and
//! per-player stat bundles over them.

use super::filters::ClutchFilter;
use super::score::{score_timeline, GameSides};
use super::AnalyticsError;
use crate::models::DbPbpEvent;
use serde::Serialize;
use std::collections::BTreeMap;

/// The qualifying events, in input (`event_number`) order.
pub fn clutch_events<'a>(
    sides: &GameSides,
    events: &'a [DbPbpEvent],
    filter: &ClutchFilter,
) -> Result<Vec<&'a DbPbpEvent>, AnalyticsError> {
    let timeline = score_timeline(sides, events)?;
    Ok(timeline
        .iter()
        .filter(|scored| {
            filter.matches(
                scored.event.period,
                scored.clock_seconds,
                scored.before.margin(),
            )
        })
        .map(|scored| scored.event)
        .collect())
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ClutchLine {
    pub points: i32,
    pub fgm: i32,
    pub fga: i32,
    pub three_pm: i32,
    pub three_pa: i32,
    pub ftm: i32,
    pub fta: i32,
    pub rebounds: i32,
    pub assists: i32,
    pub steals: i32,
    pub blocks: i32,
    pub turnovers: i32,
}

/// Per-player stat bundle over the clutch events of one game. Keyed by
/// player id; BTreeMap keeps output order deterministic.
pub fn clutch_stats(
    sides: &GameSides,
    events: &[DbPbpEvent],
    filter: &ClutchFilter,
) -> Result<BTreeMap<i64, ClutchLine>, AnalyticsError> {
    let mut lines: BTreeMap<i64, ClutchLine> = BTreeMap::new();
    for event in clutch_events(sides, events, filter)? {
        let Some(player_id) = event.player_id else {
            continue;
        };
        let line = lines.entry(player_id).or_default();
        let made = event.success == Some(true);
        match event.event_type.as_str() {
            "SHOT" => {
                let value = event
                    .attributes
                    .get("shot_value")
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or(2) as i32;
                line.fga += 1;
                if value == 3 {
                    line.three_pa += 1;
                }
                if made {
                    line.fgm += 1;
                    line.points += value;
                    if value == 3 {
                        line.three_pm += 1;
                    }
                }
            }
            "FREE_THROW" => {
                line.fta += 1;
                if made {
                    line.ftm += 1;
                    line.points += 1;
                }
            }
            "REBOUND" => line.rebounds += 1,
            "ASSIST" => line.assists += 1,
            "STEAL" => line.steals += 1,
            "BLOCK" => line.blocks += 1,
            "TURNOVER" => line.turnovers += 1,
            _ => {}
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testutil::{event, free_throw, shot, EventSpec};
    use serde_json::Map;

    const SIDES: GameSides = GameSides {
        game_id: 1,
        home_team_id: 10,
        away_team_id: 20,
    };

    /// Spec scenario: a game where exactly three events land in Q4 with
    /// <= 300 s on the clock and |margin| <= 5; the rest of the events are
    /// either early, lopsided, or out of period.
    #[test]
    fn default_filter_selects_exactly_the_qualifying_events_in_order() {
        let mut events = Vec::new();
        // Q1 action: never clutch regardless of margin.
        events.push(shot(1, 1, "04:00", 10, 101, 2, true));
        events.push(shot(2, 1, "02:00", 20, 201, 2, true));
        // Q4, early clock (not within 300s).
        events.push(shot(3, 4, "08:00", 10, 101, 2, true));
        // Q4, inside 300s, margin 2 (home 4-2): qualifies.
        events.push(shot(4, 4, "04:30", 20, 201, 3, true));
        // Margin -1 (home 4-5): qualifies.
        events.push(free_throw(5, 4, "02:10", 10, 102, true));
        // Margins 0, 3, 5 before each: all qualify, and the home run
        // pushes the margin to 7.
        events.push(shot(6, 4, "01:40", 10, 101, 3, true));
        events.push(shot(7, 4, "01:20", 10, 102, 2, true));
        events.push(shot(8, 4, "01:00", 10, 101, 2, true));
        // Margin 7 (home 12-5): no longer clutch.
        events.push(shot(9, 4, "00:30", 20, 202, 2, true));

        let clutch = clutch_events(&SIDES, &events, &ClutchFilter::default()).unwrap();
        let numbers: Vec<i32> = clutch.iter().map(|e| e.event_number).collect();
        assert_eq!(numbers, vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn three_qualifying_events_of_a_hundred() {
        let mut events = Vec::new();
        // 96 filler events across Q1-Q3, all far from clutch, scoring kept
        // level so Q4 starts tied.
        let mut number = 1;
        for period in 1..=3 {
            for i in 0..32 {
                let team = if i % 2 == 0 { 10 } else { 20 };
                let player = if team == 10 { 101 } else { 201 };
                events.push(shot(number, period, "06:00", team, player, 2, i % 4 <= 1));
                number += 1;
            }
        }
        // Q4: one event outside the window, three inside.
        events.push(shot(number, 4, "07:30", 10, 101, 2, true));
        number += 1;
        events.push(shot(number, 4, "04:59", 20, 201, 2, true));
        let first_clutch = number;
        number += 1;
        events.push(free_throw(number, 4, "02:00", 10, 102, false));
        let second_clutch = number;
        number += 1;
        events.push(shot(number, 4, "00:12", 20, 202, 3, true));
        let third_clutch = number;
        number += 1;
        assert_eq!(events.len(), 100);
        let _ = number;

        let clutch = clutch_events(&SIDES, &events, &ClutchFilter::default()).unwrap();
        let numbers: Vec<i32> = clutch.iter().map(|e| e.event_number).collect();
        assert_eq!(numbers, vec![first_clutch, second_clutch, third_clutch]);
    }

    #[test]
    fn stats_bundle_counts_per_player() {
        let events = vec![
            shot(1, 4, "03:00", 10, 101, 3, true),
            free_throw(2, 4, "02:30", 10, 101, true),
            shot(3, 4, "01:50", 20, 201, 2, false),
            event(EventSpec {
                number: 4,
                period: 4,
                clock: "01:49",
                event_type: "REBOUND",
                player_id: Some(102),
                team_id: 10,
                success: None,
                attributes: Map::new(),
            }),
        ];
        let stats = clutch_stats(&SIDES, &events, &ClutchFilter::default()).unwrap();
        let p101 = &stats[&101];
        assert_eq!(p101.points, 4);
        assert_eq!(p101.three_pm, 1);
        assert_eq!(p101.fta, 1);
        let p201 = &stats[&201];
        assert_eq!(p201.fga, 1);
        assert_eq!(p201.fgm, 0);
        assert_eq!(stats[&102].rebounds, 1);
    }
}
