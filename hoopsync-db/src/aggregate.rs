//! Season aggregation: `player_season_stats` rows derived from per-game
//! stats. Totals are the source of truth here; averages and percentages are
//! always recomputed from them and never edited in place.

use crate::db::{self, QueryError};
use crate::models::{DbPlayerGameStats, NewPlayerSeasonStats};
use chrono::{DateTime, Utc};
use diesel::PgConnection;
use log::debug;

/// The computed aggregate for one `(player, team, season)` tuple.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SeasonLine {
    pub games_played: i32,
    pub games_started: i32,
    pub seconds_played: i32,
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
    pub plus_minus: i32,
    pub efficiency: i32,
    pub avg_seconds: f64,
    pub avg_points: f64,
    pub avg_rebounds: f64,
    pub avg_assists: f64,
    pub avg_steals: f64,
    pub avg_blocks: f64,
    pub avg_turnovers: f64,
    pub avg_fouls: f64,
    pub avg_efficiency: f64,
    pub fg_pct: Option<f64>,
    pub two_pct: Option<f64>,
    pub three_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub ts_pct: Option<f64>,
    pub efg_pct: Option<f64>,
    pub ast_to_ratio: f64,
}

/// `made / attempted` in [0, 1]; `None` when nothing was attempted.
fn pct(made: i32, attempted: i32) -> Option<f64> {
    if attempted == 0 {
        None
    } else {
        Some(f64::from(made) / f64::from(attempted))
    }
}

pub fn compute_season_line(rows: &[DbPlayerGameStats]) -> SeasonLine {
    let games_played = rows.len() as i32;
    let games_started = rows.iter().filter(|row| row.is_starter).count() as i32;

    let sum = |field: fn(&DbPlayerGameStats) -> i32| -> i32 { rows.iter().map(field).sum() };

    let seconds_played = sum(|r| r.seconds_played);
    let points = sum(|r| r.points);
    let fgm = sum(|r| r.fgm);
    let fga = sum(|r| r.fga);
    let two_pm = sum(|r| r.two_pm);
    let two_pa = sum(|r| r.two_pa);
    let three_pm = sum(|r| r.three_pm);
    let three_pa = sum(|r| r.three_pa);
    let ftm = sum(|r| r.ftm);
    let fta = sum(|r| r.fta);
    let oreb = sum(|r| r.oreb);
    let dreb = sum(|r| r.dreb);
    let treb = sum(|r| r.treb);
    let ast = sum(|r| r.ast);
    let tov = sum(|r| r.tov);
    let stl = sum(|r| r.stl);
    let blk = sum(|r| r.blk);
    let pf = sum(|r| r.pf);
    let plus_minus = sum(|r| r.plus_minus);
    let efficiency = sum(|r| r.efficiency);

    let avg = |total: i32| -> f64 {
        if games_played == 0 {
            0.0
        } else {
            f64::from(total) / f64::from(games_played)
        }
    };

    let ts_denominator = 2.0 * (f64::from(fga) + 0.44 * f64::from(fta));
    let ts_pct = if ts_denominator == 0.0 {
        None
    } else {
        Some(f64::from(points) / ts_denominator)
    };
    let efg_pct = if fga == 0 {
        None
    } else {
        Some((f64::from(fgm) + 0.5 * f64::from(three_pm)) / f64::from(fga))
    };
    let ast_to_ratio = if tov > 0 {
        f64::from(ast) / f64::from(tov)
    } else {
        // No turnovers: the ratio degenerates to the assist count itself
        // (0.0 when both are zero).
        f64::from(ast)
    };

    SeasonLine {
        games_played,
        games_started,
        seconds_played,
        points,
        fgm,
        fga,
        two_pm,
        two_pa,
        three_pm,
        three_pa,
        ftm,
        fta,
        oreb,
        dreb,
        treb,
        ast,
        tov,
        stl,
        blk,
        pf,
        plus_minus,
        efficiency,
        avg_seconds: avg(seconds_played),
        avg_points: avg(points),
        avg_rebounds: avg(treb),
        avg_assists: avg(ast),
        avg_steals: avg(stl),
        avg_blocks: avg(blk),
        avg_turnovers: avg(tov),
        avg_fouls: avg(pf),
        avg_efficiency: avg(efficiency),
        fg_pct: pct(fgm, fga),
        two_pct: pct(two_pm, two_pa),
        three_pct: pct(three_pm, three_pa),
        ft_pct: pct(ftm, fta),
        ts_pct,
        efg_pct,
        ast_to_ratio,
    }
}

impl SeasonLine {
    pub fn into_row(
        self,
        player_id: i64,
        team_id: i64,
        season_id: i64,
        at: DateTime<Utc>,
    ) -> NewPlayerSeasonStats {
        NewPlayerSeasonStats {
            player_id,
            team_id,
            season_id,
            games_played: self.games_played,
            games_started: self.games_started,
            seconds_played: self.seconds_played,
            points: self.points,
            fgm: self.fgm,
            fga: self.fga,
            two_pm: self.two_pm,
            two_pa: self.two_pa,
            three_pm: self.three_pm,
            three_pa: self.three_pa,
            ftm: self.ftm,
            fta: self.fta,
            oreb: self.oreb,
            dreb: self.dreb,
            treb: self.treb,
            ast: self.ast,
            tov: self.tov,
            stl: self.stl,
            blk: self.blk,
            pf: self.pf,
            plus_minus: self.plus_minus,
            efficiency: self.efficiency,
            avg_seconds: self.avg_seconds,
            avg_points: self.avg_points,
            avg_rebounds: self.avg_rebounds,
            avg_assists: self.avg_assists,
            avg_steals: self.avg_steals,
            avg_blocks: self.avg_blocks,
            avg_turnovers: self.avg_turnovers,
            avg_fouls: self.avg_fouls,
            avg_efficiency: self.avg_efficiency,
            fg_pct: self.fg_pct,
            two_pct: self.two_pct,
            three_pct: self.three_pct,
            ft_pct: self.ft_pct,
            ts_pct: self.ts_pct,
            efg_pct: self.efg_pct,
            ast_to_ratio: self.ast_to_ratio,
            last_calculated: at.naive_utc(),
        }
    }
}

/// Recompute one tuple's season row from its game stats.
pub fn recalculate_tuple(
    conn: &mut PgConnection,
    player_id: i64,
    team_id: i64,
    season_id: i64,
    at: DateTime<Utc>,
) -> Result<(), QueryError> {
    let rows = db::player_game_rows_for_tuple(conn, player_id, team_id, season_id)?;
    if rows.is_empty() {
        debug!(
            "player {player_id} has no game stats on team {team_id} in season {season_id}; \
            nothing to aggregate",
        );
        return Ok(());
    }
    let line = compute_season_line(&rows);
    db::replace_player_season_stats(conn, &line.into_row(player_id, team_id, season_id, at))
}

pub fn recalculate_for_player(
    conn: &mut PgConnection,
    player_id: i64,
    at: DateTime<Utc>,
) -> Result<usize, QueryError> {
    let tuples = db::tuples_for_player(conn, player_id)?;
    for (team_id, season_id) in &tuples {
        recalculate_tuple(conn, player_id, *team_id, *season_id, at)?;
    }
    Ok(tuples.len())
}

pub fn recalculate_for_season(
    conn: &mut PgConnection,
    season_id: i64,
    at: DateTime<Utc>,
) -> Result<usize, QueryError> {
    let tuples = db::tuples_for_season(conn, season_id)?;
    for (player_id, team_id) in &tuples {
        recalculate_tuple(conn, *player_id, *team_id, season_id, at)?;
    }
    Ok(tuples.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_row(
        game_id: i64,
        points: i32,
        fgm: i32,
        fga: i32,
        three_pm: i32,
        three_pa: i32,
        ftm: i32,
        fta: i32,
        is_starter: bool,
    ) -> DbPlayerGameStats {
        let two_pm = fgm - three_pm;
        let two_pa = fga - three_pa;
        DbPlayerGameStats {
            id: game_id,
            game_id,
            player_id: 1,
            team_id: 1,
            seconds_played: 30 * 60,
            is_starter,
            points,
            fgm,
            fga,
            two_pm,
            two_pa,
            three_pm,
            three_pa,
            ftm,
            fta,
            oreb: 1,
            dreb: 3,
            treb: 4,
            ast: 5,
            tov: 2,
            stl: 1,
            blk: 0,
            pf: 2,
            plus_minus: 6,
            efficiency: 15,
            extra: serde_json::json!({}),
        }
    }

    #[test]
    fn totals_and_averages_sum_per_game_counters() {
        let rows = vec![
            game_row(1, 20, 8, 15, 2, 5, 2, 2, true),
            game_row(2, 10, 4, 11, 0, 3, 2, 4, false),
        ];
        let line = compute_season_line(&rows);
        assert_eq!(line.games_played, 2);
        assert_eq!(line.games_started, 1);
        assert_eq!(line.points, 30);
        assert_eq!(line.fga, 26);
        assert_eq!(line.avg_points, 15.0);
        assert_eq!(line.avg_assists, 5.0);
        assert_eq!(line.avg_seconds, 1800.0);
    }

    #[test]
    fn percentages_are_decimals_and_null_on_zero_attempts() {
        let rows = vec![game_row(1, 4, 2, 8, 0, 0, 0, 0, true)];
        let line = compute_season_line(&rows);
        assert_eq!(line.fg_pct, Some(0.25));
        assert_eq!(line.three_pct, None);
        assert_eq!(line.ft_pct, None);
    }

    #[test]
    fn true_shooting_and_efg_follow_the_formulas() {
        let rows = vec![game_row(1, 25, 9, 17, 3, 7, 4, 5, true)];
        let line = compute_season_line(&rows);
        let expected_ts = 25.0 / (2.0 * (17.0 + 0.44 * 5.0));
        assert_eq!(line.ts_pct, Some(expected_ts));
        assert_eq!(line.efg_pct, Some((9.0 + 1.5) / 17.0));
    }

    #[test]
    fn ast_to_ratio_handles_zero_turnovers() {
        let mut row = game_row(1, 0, 0, 0, 0, 0, 0, 0, false);
        row.ast = 7;
        row.tov = 0;
        let line = compute_season_line(&[row.clone()]);
        assert_eq!(line.ast_to_ratio, 7.0);

        row.ast = 0;
        let line = compute_season_line(&[row.clone()]);
        assert_eq!(line.ast_to_ratio, 0.0);

        row.ast = 6;
        row.tov = 3;
        let line = compute_season_line(&[row]);
        assert_eq!(line.ast_to_ratio, 2.0);
    }

    #[test]
    fn recomputation_is_deterministic() {
        let rows = vec![
            game_row(1, 20, 8, 15, 2, 5, 2, 2, true),
            game_row(2, 17, 6, 13, 1, 4, 4, 4, true),
            game_row(3, 8, 3, 9, 2, 6, 0, 1, false),
        ];
        let first = compute_season_line(&rows);
        let second = compute_season_line(&rows);
        assert_eq!(first, second);
        assert_eq!(first.ts_pct.unwrap().to_bits(), second.ts_pct.unwrap().to_bits());
    }

    #[test]
    fn traded_player_tuples_aggregate_independently() {
        // 20 games on team A and 12 on team B: aggregation is keyed on the
        // (player, team, season) tuple, so a trade yields two rows whose
        // games_played sum to the season total.
        let team_a_rows: Vec<_> = (1..=20)
            .map(|game| game_row(game, 10, 4, 9, 0, 2, 2, 2, true))
            .collect();
        let team_b_rows: Vec<_> = (21..=32)
            .map(|game| game_row(game, 16, 7, 12, 2, 4, 0, 0, true))
            .collect();

        let line_a = compute_season_line(&team_a_rows);
        let line_b = compute_season_line(&team_b_rows);
        assert_eq!(line_a.games_played, 20);
        assert_eq!(line_b.games_played, 12);
        assert_eq!(line_a.games_played + line_b.games_played, 32);
        assert_eq!(line_a.avg_points, 10.0);
        assert_eq!(line_b.avg_points, 16.0);
    }

    #[test]
    fn empty_input_aggregates_to_zeroes() {
        let line = compute_season_line(&[]);
        assert_eq!(line.games_played, 0);
        assert_eq!(line.avg_points, 0.0);
        assert_eq!(line.fg_pct, None);
        assert_eq!(line.ts_pct, None);
    }
}
