//! Situational shot splits: shooting lines over SHOT events constrained by
//! attribute equality (fast break, second chance, contested, shot type).

use super::filters::SituationalFilter;
use crate::models::DbPbpEvent;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct ShotSplit {
    pub attempts: i32,
    pub makes: i32,
    pub points: i32,
}

impl ShotSplit {
    pub fn pct(&self) -> Option<f64> {
        if self.attempts == 0 {
            None
        } else {
            Some(f64::from(self.makes) / f64::from(self.attempts))
        }
    }

    fn absorb(&mut self, event: &DbPbpEvent) {
        let value = event
            .attributes
            .get("shot_value")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(2) as i32;
        self.attempts += 1;
        if event.success == Some(true) {
            self.makes += 1;
            self.points += value;
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SituationalReport {
    pub overall: ShotSplit,
    /// Breakdown by `shot_type` attribute, for the shots that carry one.
    pub by_shot_type: BTreeMap<String, ShotSplit>,
}

/// Shooting split over a game's SHOT events. `player_id = None` covers the
/// whole game (both teams).
pub fn situational_shots(
    events: &[DbPbpEvent],
    player_id: Option<i64>,
    filter: &SituationalFilter,
) -> SituationalReport {
    let mut report = SituationalReport::default();
    for event in events {
        if let Some(player_id) = player_id {
            if event.player_id != Some(player_id) {
                continue;
            }
        }
        if !filter.matches(event) {
            continue;
        }
        report.overall.absorb(event);
        if let Some(shot_type) = event
            .attributes
            .get("shot_type")
            .and_then(serde_json::Value::as_str)
        {
            report
                .by_shot_type
                .entry(shot_type.to_string())
                .or_default()
                .absorb(event);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::analytics::testutil::shot;
    use crate::models::DbPbpEvent;

    fn tagged_shot(
        number: i32,
        player: i64,
        made: bool,
        value: i64,
        fast_break: bool,
        shot_type: &str,
    ) -> DbPbpEvent {
        let mut event = shot(number, 1, "05:00", 10, player, value, made);
        let attributes = event.attributes.as_object_mut().unwrap();
        attributes.insert("fast_break".to_string(), json!(fast_break));
        attributes.insert("shot_type".to_string(), json!(shot_type));
        event
    }

    #[test]
    fn unconstrained_filter_covers_all_player_shots() {
        let events = vec![
            tagged_shot(1, 101, true, 2, true, "layup"),
            tagged_shot(2, 101, false, 3, false, "jump_shot"),
            tagged_shot(3, 102, true, 2, false, "dunk"),
        ];
        let report = situational_shots(&events, Some(101), &SituationalFilter::default());
        assert_eq!(report.overall.attempts, 2);
        assert_eq!(report.overall.makes, 1);
        assert_eq!(report.overall.points, 2);
        assert_eq!(report.overall.pct(), Some(0.5));
        assert_eq!(report.by_shot_type.len(), 2);
    }

    #[test]
    fn fast_break_constraint_applies_as_equality() {
        let events = vec![
            tagged_shot(1, 101, true, 2, true, "layup"),
            tagged_shot(2, 101, true, 2, false, "layup"),
        ];
        let filter = SituationalFilter {
            fast_break: Some(true),
            ..Default::default()
        };
        let report = situational_shots(&events, Some(101), &filter);
        assert_eq!(report.overall.attempts, 1);
        assert_eq!(report.by_shot_type["layup"].attempts, 1);
    }

    #[test]
    fn shot_type_constraint_and_whole_game_scope() {
        let events = vec![
            tagged_shot(1, 101, true, 3, false, "jump_shot"),
            tagged_shot(2, 102, false, 3, false, "jump_shot"),
            tagged_shot(3, 103, true, 2, false, "dunk"),
        ];
        let filter = SituationalFilter {
            shot_type: Some("jump_shot".to_string()),
            ..Default::default()
        };
        let report = situational_shots(&events, None, &filter);
        assert_eq!(report.overall.attempts, 2);
        assert_eq!(report.overall.makes, 1);
        assert_eq!(report.overall.points, 3);
    }

    #[test]
    fn zero_attempts_yields_null_percentage() {
        let report = situational_shots(&[], Some(101), &SituationalFilter::default());
        assert_eq!(report.overall.pct(), None);
    }
}
