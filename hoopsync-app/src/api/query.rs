//! Read endpoints: filtered lists with pagination, by-id fetches with
//! their external-id maps, and leader boards.

use crate::api::error::ApiError;
use crate::api::sync::Page;
use crate::Db;
use chrono::Utc;
use hoopsync_db::aggregate;
use hoopsync_db::db::{self, EntityKind};
use hoopsync_db::models::{DbGame, DbPlayerSeasonStats, DbPlayerTeamHistory, DbTeam};
use rocket::serde::json::Json;
use rocket::serde::Serialize;
use rocket::{get, post};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct PlayerView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// Legacy single-position field: the first canonical position.
    pub position: Option<String>,
    pub positions: Vec<String>,
    pub birth_date: Option<chrono::NaiveDate>,
    pub nationality: Option<String>,
    pub height_cm: Option<i32>,
    pub external_ids: HashMap<String, String>,
}

fn player_view(
    conn: &mut hoopsync_db::PgConnection,
    player: hoopsync_db::models::DbPlayer,
) -> Result<PlayerView, diesel::result::Error> {
    let external_ids = db::external_ids_for_entity(conn, EntityKind::Player, player.id)?
        .into_iter()
        .collect();
    Ok(PlayerView {
        id: player.id,
        position: player.primary_position().map(str::to_string),
        positions: player.positions.iter().flatten().cloned().collect(),
        first_name: player.first_name,
        last_name: player.last_name,
        birth_date: player.birth_date,
        nationality: player.nationality,
        height_cm: player.height_cm,
        external_ids,
    })
}

#[get("/players?<search>&<page>&<per_page>")]
pub async fn players(
    db: Db,
    search: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
) -> Result<Json<Page<PlayerView>>, ApiError> {
    let page = page.unwrap_or(0);
    let per_page = per_page.unwrap_or(25).clamp(1, 200);
    let (items, total) = db
        .run(move |conn| {
            let (players, total) = db::players_list(conn, search.as_deref(), page, per_page)?;
            let views = players
                .into_iter()
                .map(|player| player_view(conn, player))
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, diesel::result::Error>((views, total))
        })
        .await?;
    Ok(Json(Page { items, total }))
}

#[derive(Debug, Serialize)]
pub struct PlayerDetail {
    #[serde(flatten)]
    pub player: PlayerView,
    pub history: Vec<DbPlayerTeamHistory>,
}

#[get("/players/<id>")]
pub async fn player_by_id(db: Db, id: i64) -> Result<Json<PlayerDetail>, ApiError> {
    let detail = db
        .run(move |conn| {
            let Some(player) = db::player_by_id(conn, id)? else {
                return Ok(None);
            };
            let view = player_view(conn, player)?;
            let history = db::history_for_player(conn, id)?;
            Ok::<_, diesel::result::Error>(Some(PlayerDetail {
                player: view,
                history,
            }))
        })
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(detail))
}

#[derive(Debug, Serialize)]
pub struct TeamView {
    #[serde(flatten)]
    pub team: DbTeam,
    pub external_ids: HashMap<String, String>,
}

#[get("/teams?<search>&<page>&<per_page>")]
pub async fn teams(
    db: Db,
    search: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
) -> Result<Json<Page<TeamView>>, ApiError> {
    let page = page.unwrap_or(0);
    let per_page = per_page.unwrap_or(25).clamp(1, 200);
    let (items, total) = db
        .run(move |conn| {
            let (teams, total) = db::teams_list(conn, search.as_deref(), page, per_page)?;
            let views = teams
                .into_iter()
                .map(|team| {
                    let external_ids =
                        db::external_ids_for_entity(conn, EntityKind::Team, team.id)?
                            .into_iter()
                            .collect();
                    Ok(TeamView { team, external_ids })
                })
                .collect::<Result<Vec<_>, diesel::result::Error>>()?;
            Ok::<_, diesel::result::Error>((views, total))
        })
        .await?;
    Ok(Json(Page { items, total }))
}

#[get("/games?<season_id>&<team_id>&<page>&<per_page>")]
pub async fn games(
    db: Db,
    season_id: Option<i64>,
    team_id: Option<i64>,
    page: Option<i64>,
    per_page: Option<i64>,
) -> Result<Json<Page<DbGame>>, ApiError> {
    let page = page.unwrap_or(0);
    let per_page = per_page.unwrap_or(25).clamp(1, 200);
    let (items, total) = db
        .run(move |conn| db::games_list(conn, season_id, team_id, page, per_page))
        .await?;
    Ok(Json(Page { items, total }))
}

#[derive(Debug, Serialize)]
pub struct RecalculatedView {
    pub tuples_recalculated: usize,
}

/// Explicit aggregation triggers; the sync workflows also recompute
/// implicitly after each game.
#[post("/stats/recalculate/player/<player_id>")]
pub async fn recalculate_player(
    db: Db,
    player_id: i64,
) -> Result<Json<RecalculatedView>, ApiError> {
    let tuples = db
        .run(move |conn| {
            if db::player_by_id(conn, player_id)?.is_none() {
                return Err(ApiError::NotFound);
            }
            Ok(aggregate::recalculate_for_player(conn, player_id, Utc::now())?)
        })
        .await?;
    Ok(Json(RecalculatedView {
        tuples_recalculated: tuples,
    }))
}

#[post("/stats/recalculate/season/<season_id>")]
pub async fn recalculate_season(
    db: Db,
    season_id: i64,
) -> Result<Json<RecalculatedView>, ApiError> {
    let tuples = db
        .run(move |conn| {
            if db::season_by_id(conn, season_id)?.is_none() {
                return Err(ApiError::NotFound);
            }
            Ok(aggregate::recalculate_for_season(conn, season_id, Utc::now())?)
        })
        .await?;
    Ok(Json(RecalculatedView {
        tuples_recalculated: tuples,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeaderCategory {
    Points,
    Rebounds,
    Assists,
    Steals,
    Blocks,
    FgPct,
    ThreePtPct,
    FtPct,
    Minutes,
    Efficiency,
}

impl LeaderCategory {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "points" => LeaderCategory::Points,
            "rebounds" => LeaderCategory::Rebounds,
            "assists" => LeaderCategory::Assists,
            "steals" => LeaderCategory::Steals,
            "blocks" => LeaderCategory::Blocks,
            "fg_pct" => LeaderCategory::FgPct,
            "3pt_pct" | "three_pt_pct" => LeaderCategory::ThreePtPct,
            "ft_pct" => LeaderCategory::FtPct,
            "minutes" => LeaderCategory::Minutes,
            "efficiency" => LeaderCategory::Efficiency,
            _ => return None,
        })
    }

    /// The ranked value. Percentages are scaled to 0-100 here; the store
    /// keeps them as decimals. `None` drops the row from the board.
    fn value(self, row: &DbPlayerSeasonStats) -> Option<f64> {
        match self {
            LeaderCategory::Points => Some(row.avg_points),
            LeaderCategory::Rebounds => Some(row.avg_rebounds),
            LeaderCategory::Assists => Some(row.avg_assists),
            LeaderCategory::Steals => Some(row.avg_steals),
            LeaderCategory::Blocks => Some(row.avg_blocks),
            LeaderCategory::FgPct => row.fg_pct.map(|pct| pct * 100.0),
            LeaderCategory::ThreePtPct => row.three_pct.map(|pct| pct * 100.0),
            LeaderCategory::FtPct => row.ft_pct.map(|pct| pct * 100.0),
            LeaderCategory::Minutes => Some(row.avg_seconds / 60.0),
            LeaderCategory::Efficiency => Some(row.avg_efficiency),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderEntry {
    pub player_id: i64,
    pub team_id: i64,
    pub games_played: i32,
    pub value: f64,
}

/// Deterministic ordering: value descending, then `player_id` ascending so
/// ties come out the same on every call.
fn rank_leaders(
    rows: &[DbPlayerSeasonStats],
    category: LeaderCategory,
    limit: usize,
) -> Vec<LeaderEntry> {
    let mut entries: Vec<LeaderEntry> = rows
        .iter()
        .filter_map(|row| {
            category.value(row).map(|value| LeaderEntry {
                player_id: row.player_id,
                team_id: row.team_id,
                games_played: row.games_played,
                value,
            })
        })
        .collect();
    entries.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    entries.truncate(limit);
    entries
}

#[get("/leaders?<season_id>&<category>&<limit>&<min_games>")]
pub async fn leaders(
    db: Db,
    season_id: i64,
    category: &str,
    limit: Option<usize>,
    min_games: Option<i32>,
) -> Result<Json<Vec<LeaderEntry>>, ApiError> {
    let category = LeaderCategory::parse(category)
        .ok_or_else(|| ApiError::Validation(format!("unknown leader category {category:?}")))?;
    let limit = limit.unwrap_or(10).clamp(1, 100);
    let min_games = min_games.unwrap_or(0);

    let rows = db
        .run(move |conn| db::season_stats_rows(conn, season_id, min_games))
        .await?;
    Ok(Json(rank_leaders(&rows, category, limit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn season_row(player_id: i64, avg_points: f64, three_pct: Option<f64>) -> DbPlayerSeasonStats {
        DbPlayerSeasonStats {
            id: player_id,
            player_id,
            team_id: 1,
            season_id: 1,
            games_played: 20,
            games_started: 20,
            seconds_played: 36_000,
            points: 0,
            fgm: 0,
            fga: 0,
            two_pm: 0,
            two_pa: 0,
            three_pm: 0,
            three_pa: 0,
            ftm: 0,
            fta: 0,
            oreb: 0,
            dreb: 0,
            treb: 0,
            ast: 0,
            tov: 0,
            stl: 0,
            blk: 0,
            pf: 0,
            plus_minus: 0,
            efficiency: 0,
            avg_seconds: 1800.0,
            avg_points,
            avg_rebounds: 0.0,
            avg_assists: 0.0,
            avg_steals: 0.0,
            avg_blocks: 0.0,
            avg_turnovers: 0.0,
            avg_fouls: 0.0,
            avg_efficiency: 0.0,
            fg_pct: None,
            two_pct: None,
            three_pct,
            ft_pct: None,
            ts_pct: None,
            efg_pct: None,
            ast_to_ratio: 0.0,
            last_calculated: NaiveDateTime::default(),
        }
    }

    #[test]
    fn ties_break_by_ascending_player_id_every_time() {
        let rows = vec![
            season_row(42, 21.5, None),
            season_row(7, 21.5, None),
            season_row(13, 18.0, None),
        ];
        for _ in 0..3 {
            let board = rank_leaders(&rows, LeaderCategory::Points, 10);
            let ids: Vec<i64> = board.iter().map(|entry| entry.player_id).collect();
            assert_eq!(ids, vec![7, 42, 13]);
        }
    }

    #[test]
    fn percentage_categories_scale_to_hundred_and_drop_nulls() {
        let rows = vec![
            season_row(1, 0.0, Some(0.413)),
            season_row(2, 0.0, None),
        ];
        let board = rank_leaders(&rows, LeaderCategory::ThreePtPct, 10);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].player_id, 1);
        assert!((board[0].value - 41.3).abs() < 1e-9);
    }

    #[test]
    fn limit_truncates_the_board() {
        let rows: Vec<_> = (1..=20)
            .map(|id| season_row(id, f64::from(id as i32), None))
            .collect();
        let board = rank_leaders(&rows, LeaderCategory::Points, 5);
        assert_eq!(board.len(), 5);
        assert_eq!(board[0].player_id, 20);
    }
}
