//! Analytics endpoints: thin loaders over the pure engine in
//! `hoopsync_db::analytics`. Each handler fetches the game's canonical rows
//! and hands them to the corresponding analysis with a filter built from
//! the query string.

use crate::api::error::ApiError;
use crate::Db;
use hoopsync_db::aggregate::{compute_season_line, SeasonLine};
use hoopsync_db::analytics::clutch::{clutch_events, clutch_stats, ClutchLine};
use hoopsync_db::analytics::lineups::{best_lineups, LineupEntry};
use hoopsync_db::analytics::onoff::{on_off, LineupPolicy, OnOffParams, OnOffReport};
use hoopsync_db::analytics::quarters::{quarter_splits, QuarterSplits};
use hoopsync_db::analytics::score::score_timeline;
use hoopsync_db::analytics::situational::{situational_shots, SituationalReport};
use hoopsync_db::analytics::{
    ClutchFilter, GameSides, OpponentFilter, SituationalFilter, TimeFilter,
};
use hoopsync_db::db;
use hoopsync_db::models::{DbGame, DbPbpEvent, DbPlayerGameStats};
use rocket::serde::json::Json;
use rocket::serde::Serialize;
use rocket::get;
use std::collections::BTreeMap;

struct GameRows {
    game: DbGame,
    events: Vec<DbPbpEvent>,
    stats: Vec<DbPlayerGameStats>,
}

fn load_game_rows(
    conn: &mut hoopsync_db::PgConnection,
    game_id: i64,
) -> Result<GameRows, ApiError> {
    let game = db::game_by_id(conn, game_id)?.ok_or(ApiError::NotFound)?;
    let events = db::pbp_events_for_game(conn, game_id)?;
    let stats = db::player_game_stats_for_game(conn, game_id)?;
    Ok(GameRows {
        game,
        events,
        stats,
    })
}

fn starters_by_team(stats: &[DbPlayerGameStats]) -> BTreeMap<i64, Vec<i64>> {
    let mut starters: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for row in stats {
        if row.is_starter {
            starters.entry(row.team_id).or_default().push(row.player_id);
        }
    }
    starters
}

fn onoff_params(
    policy: Option<&str>,
    regulation_period_seconds: Option<i32>,
    overtime_period_seconds: Option<i32>,
) -> Result<OnOffParams, ApiError> {
    let lineup_policy = match policy {
        None | Some("drop") => LineupPolicy::DropSegments,
        Some("degrade") => LineupPolicy::Degrade,
        Some(other) => {
            return Err(ApiError::Validation(format!(
                "unknown lineup policy {other:?} (expected \"drop\" or \"degrade\")",
            )));
        }
    };
    let defaults = OnOffParams::default();
    Ok(OnOffParams {
        regulation_period_seconds: regulation_period_seconds
            .unwrap_or(defaults.regulation_period_seconds),
        overtime_period_seconds: overtime_period_seconds
            .unwrap_or(defaults.overtime_period_seconds),
        lineup_policy,
    })
}

#[derive(Debug, Serialize)]
pub struct ClutchView {
    pub game_id: i64,
    pub filter: ClutchFilter,
    pub events: Vec<DbPbpEvent>,
    pub player_stats: BTreeMap<i64, ClutchLine>,
}

#[get(
    "/analytics/clutch/<game_id>?<time_remaining_seconds>&<score_margin>&<include_overtime>&<min_period>"
)]
pub async fn clutch(
    db: Db,
    game_id: i64,
    time_remaining_seconds: Option<i32>,
    score_margin: Option<i32>,
    include_overtime: Option<bool>,
    min_period: Option<i32>,
) -> Result<Json<ClutchView>, ApiError> {
    let defaults = ClutchFilter::default();
    let filter = ClutchFilter {
        time_remaining_seconds: time_remaining_seconds
            .unwrap_or(defaults.time_remaining_seconds),
        score_margin: score_margin.unwrap_or(defaults.score_margin),
        include_overtime: include_overtime.unwrap_or(defaults.include_overtime),
        min_period: min_period.unwrap_or(defaults.min_period),
    };

    let view = db
        .run(move |conn| {
            let rows = load_game_rows(conn, game_id)?;
            let sides = GameSides::of(&rows.game);
            let events = clutch_events(&sides, &rows.events, &filter)?
                .into_iter()
                .cloned()
                .collect();
            let player_stats = clutch_stats(&sides, &rows.events, &filter)?;
            Ok::<_, ApiError>(ClutchView {
                game_id,
                filter,
                events,
                player_stats,
            })
        })
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Serialize)]
pub struct OnOffView {
    pub game_id: i64,
    pub player_id: i64,
    pub report: OnOffReport,
}

#[get(
    "/analytics/onoff/<game_id>/<player_id>?<policy>&<regulation_period_seconds>&<overtime_period_seconds>"
)]
pub async fn onoff(
    db: Db,
    game_id: i64,
    player_id: i64,
    policy: Option<String>,
    regulation_period_seconds: Option<i32>,
    overtime_period_seconds: Option<i32>,
) -> Result<Json<OnOffView>, ApiError> {
    let params = onoff_params(
        policy.as_deref(),
        regulation_period_seconds,
        overtime_period_seconds,
    )?;

    let view = db
        .run(move |conn| {
            let rows = load_game_rows(conn, game_id)?;
            let player_team_id = rows
                .stats
                .iter()
                .find(|row| row.player_id == player_id)
                .map(|row| row.team_id)
                .ok_or(ApiError::NotFound)?;
            let sides = GameSides::of(&rows.game);
            let starters = starters_by_team(&rows.stats);
            let report = on_off(
                &sides,
                &rows.events,
                &starters,
                player_id,
                player_team_id,
                &params,
            )?;
            Ok::<_, ApiError>(OnOffView {
                game_id,
                player_id,
                report,
            })
        })
        .await?;
    Ok(Json(view))
}

#[get("/analytics/lineups/<game_id>/<team_id>?<size>&<min_minutes>&<policy>")]
pub async fn lineups(
    db: Db,
    game_id: i64,
    team_id: i64,
    size: Option<usize>,
    min_minutes: Option<i32>,
    policy: Option<String>,
) -> Result<Json<Vec<LineupEntry>>, ApiError> {
    let size = size.unwrap_or(5);
    let min_seconds = min_minutes.unwrap_or(0) * 60;
    let params = onoff_params(policy.as_deref(), None, None)?;

    let entries = db
        .run(move |conn| {
            let rows = load_game_rows(conn, game_id)?;
            let sides = GameSides::of(&rows.game);
            let starters = starters_by_team(&rows.stats);
            Ok::<_, ApiError>(best_lineups(
                &sides,
                &rows.events,
                &starters,
                team_id,
                size,
                min_seconds,
                &params,
            )?)
        })
        .await?;
    Ok(Json(entries))
}

#[derive(Debug, Serialize)]
pub struct QuartersView {
    pub game_id: i64,
    pub player_id: i64,
    pub splits: QuarterSplits,
}

#[get("/analytics/quarters/<game_id>/<player_id>")]
pub async fn quarters(
    db: Db,
    game_id: i64,
    player_id: i64,
) -> Result<Json<QuartersView>, ApiError> {
    let view = db
        .run(move |conn| {
            let rows = load_game_rows(conn, game_id)?;
            Ok::<_, ApiError>(QuartersView {
                game_id,
                player_id,
                splits: quarter_splits(&rows.events, player_id),
            })
        })
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Serialize)]
pub struct OpponentSplitView {
    pub season_id: i64,
    pub player_id: i64,
    pub filter: OpponentFilter,
    pub games: usize,
    pub line: SeasonLine,
}

/// A player's season line restricted to games matching the opponent
/// filter (specific opponent, home-only, away-only).
#[get("/analytics/splits/<season_id>/<player_id>?<opponent_team_id>&<home_only>&<away_only>")]
pub async fn opponent_splits(
    db: Db,
    season_id: i64,
    player_id: i64,
    opponent_team_id: Option<i64>,
    home_only: Option<bool>,
    away_only: Option<bool>,
) -> Result<Json<OpponentSplitView>, ApiError> {
    let filter = OpponentFilter {
        opponent_team_id,
        home_only: home_only.unwrap_or(false),
        away_only: away_only.unwrap_or(false),
    };
    filter.validate()?;

    let view = db
        .run(move |conn| {
            let rows = db::player_game_rows_with_games(conn, player_id, season_id)?;
            if rows.is_empty() {
                return Err(ApiError::NotFound);
            }
            let selected: Vec<DbPlayerGameStats> = rows
                .into_iter()
                .filter(|(stats, game)| filter.game_matches(game, stats.team_id))
                .map(|(stats, _)| stats)
                .collect();
            Ok::<_, ApiError>(OpponentSplitView {
                season_id,
                player_id,
                filter,
                games: selected.len(),
                line: compute_season_line(&selected),
            })
        })
        .await?;
    Ok(Json(view))
}

/// PBP events of one game surviving a time filter (periods, garbage time,
/// clock window).
#[get(
    "/analytics/events/<game_id>?<period>&<periods>&<exclude_garbage_time>&<min_time_remaining>&<max_time_remaining>"
)]
pub async fn filtered_events(
    db: Db,
    game_id: i64,
    period: Option<i32>,
    periods: Option<Vec<i32>>,
    exclude_garbage_time: Option<bool>,
    min_time_remaining: Option<i32>,
    max_time_remaining: Option<i32>,
) -> Result<Json<Vec<DbPbpEvent>>, ApiError> {
    let filter = TimeFilter {
        period,
        periods,
        exclude_garbage_time: exclude_garbage_time.unwrap_or(false),
        min_time_remaining,
        max_time_remaining,
    };
    filter.validate()?;

    let events = db
        .run(move |conn| {
            let rows = load_game_rows(conn, game_id)?;
            let sides = GameSides::of(&rows.game);
            let timeline = score_timeline(&sides, &rows.events)?;
            let selected: Vec<DbPbpEvent> = timeline
                .iter()
                .filter(|scored| {
                    filter.matches(
                        scored.event.period,
                        scored.clock_seconds,
                        scored.before.margin(),
                    )
                })
                .map(|scored| scored.event.clone())
                .collect();
            Ok::<_, ApiError>(selected)
        })
        .await?;
    Ok(Json(events))
}

#[get(
    "/analytics/situational/<game_id>?<player_id>&<fast_break>&<second_chance>&<contested>&<shot_type>"
)]
pub async fn situational(
    db: Db,
    game_id: i64,
    player_id: Option<i64>,
    fast_break: Option<bool>,
    second_chance: Option<bool>,
    contested: Option<bool>,
    shot_type: Option<String>,
) -> Result<Json<SituationalReport>, ApiError> {
    let filter = SituationalFilter {
        fast_break,
        second_chance,
        contested,
        shot_type,
    };

    let report = db
        .run(move |conn| {
            let rows = load_game_rows(conn, game_id)?;
            Ok::<_, ApiError>(situational_shots(&rows.events, player_id, &filter))
        })
        .await?;
    Ok(Json(report))
}
