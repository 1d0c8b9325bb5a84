//! Quarter-by-quarter rollups: one stat bundle per period for a player,
//! plus a merged overtime bundle covering periods beyond the fourth.

use crate::models::DbPbpEvent;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodLine {
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
    pub fouls: i32,
}

impl PeriodLine {
    fn absorb(&mut self, event: &DbPbpEvent) {
        let made = event.success == Some(true);
        match event.event_type.as_str() {
            "SHOT" => {
                let value = event
                    .attributes
                    .get("shot_value")
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or(2) as i32;
                self.fga += 1;
                if value == 3 {
                    self.three_pa += 1;
                }
                if made {
                    self.fgm += 1;
                    self.points += value;
                    if value == 3 {
                        self.three_pm += 1;
                    }
                }
            }
            "FREE_THROW" => {
                self.fta += 1;
                if made {
                    self.ftm += 1;
                    self.points += 1;
                }
            }
            "REBOUND" => self.rebounds += 1,
            "ASSIST" => self.assists += 1,
            "STEAL" => self.steals += 1,
            "BLOCK" => self.blocks += 1,
            "TURNOVER" => self.turnovers += 1,
            "FOUL" => self.fouls += 1,
            _ => {}
        }
    }

    fn merge(&mut self, other: &PeriodLine) {
        self.points += other.points;
        self.fgm += other.fgm;
        self.fga += other.fga;
        self.three_pm += other.three_pm;
        self.three_pa += other.three_pa;
        self.ftm += other.ftm;
        self.fta += other.fta;
        self.rebounds += other.rebounds;
        self.assists += other.assists;
        self.steals += other.steals;
        self.blocks += other.blocks;
        self.turnovers += other.turnovers;
        self.fouls += other.fouls;
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterSplits {
    /// One bundle per period actually played, keyed by period number.
    pub periods: BTreeMap<i32, PeriodLine>,
    /// Merged bundle over all periods > 4; absent when the game ended in
    /// regulation.
    pub overtime: Option<PeriodLine>,
}

pub fn quarter_splits(events: &[DbPbpEvent], player_id: i64) -> QuarterSplits {
    let mut splits = QuarterSplits::default();
    for event in events {
        if event.player_id != Some(player_id) {
            continue;
        }
        splits
            .periods
            .entry(event.period)
            .or_default()
            .absorb(event);
    }

    let mut overtime: Option<PeriodLine> = None;
    for (period, line) in &splits.periods {
        if *period > 4 {
            overtime.get_or_insert_with(PeriodLine::default).merge(line);
        }
    }
    splits.overtime = overtime;
    splits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testutil::{event, free_throw, shot, EventSpec};
    use serde_json::Map;

    #[test]
    fn buckets_by_period_and_merges_overtime() {
        let events = vec![
            shot(1, 1, "08:00", 10, 101, 2, true),
            shot(2, 1, "04:00", 10, 101, 3, false),
            free_throw(3, 2, "05:00", 10, 101, true),
            // Someone else's stats never leak in.
            shot(4, 2, "03:00", 10, 102, 2, true),
            shot(5, 4, "01:00", 10, 101, 2, true),
            shot(6, 5, "02:00", 10, 101, 3, true),
            free_throw(7, 6, "00:30", 10, 101, true),
        ];
        let splits = quarter_splits(&events, 101);

        assert_eq!(splits.periods[&1].points, 2);
        assert_eq!(splits.periods[&1].fga, 2);
        assert_eq!(splits.periods[&1].three_pa, 1);
        assert_eq!(splits.periods[&2].points, 1);
        assert_eq!(splits.periods[&2].fga, 0);
        assert_eq!(splits.periods[&4].points, 2);

        let overtime = splits.overtime.as_ref().unwrap();
        assert_eq!(overtime.points, 4);
        assert_eq!(overtime.three_pm, 1);
        assert_eq!(overtime.ftm, 1);
    }

    #[test]
    fn regulation_game_has_no_overtime_bundle() {
        let events = vec![shot(1, 4, "01:00", 10, 101, 2, true)];
        let splits = quarter_splits(&events, 101);
        assert!(splits.overtime.is_none());
    }

    #[test]
    fn counting_events_land_in_their_period() {
        let events = vec![
            event(EventSpec {
                number: 1,
                period: 3,
                clock: "06:00",
                event_type: "STEAL",
                player_id: Some(101),
                team_id: 10,
                success: None,
                attributes: Map::new(),
            }),
            event(EventSpec {
                number: 2,
                period: 3,
                clock: "05:40",
                event_type: "TURNOVER",
                player_id: Some(101),
                team_id: 10,
                success: None,
                attributes: Map::new(),
            }),
            event(EventSpec {
                number: 3,
                period: 3,
                clock: "05:00",
                event_type: "FOUL",
                player_id: Some(101),
                team_id: 10,
                success: None,
                attributes: Map::new(),
            }),
        ];
        let splits = quarter_splits(&events, 101);
        let q3 = &splits.periods[&3];
        assert_eq!(q3.steals, 1);
        assert_eq!(q3.turnovers, 1);
        assert_eq!(q3.fouls, 1);
        assert_eq!(q3.points, 0);
    }
}
