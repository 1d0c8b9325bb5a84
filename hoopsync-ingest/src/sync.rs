//! Sync workflows: season, single-game, and teams. Each run opens a sync
//! log, fans out fetches under the adapter's rate budget, persists each
//! game in its own transaction through a single writer, and closes the log
//! with exact per-record accounting. Record failures never abort a run;
//! run-level failures mark the log FAILED and propagate.

use crate::config::IngestConfig;
use crate::resolve;
use chrono::Utc;
use futures::{pin_mut, StreamExt};
use hashbrown::HashMap;
use hoopsync_db::aggregate;
use hoopsync_db::db::{self, EntityKind, EventLinkSpec, StoreError, SyncCounts};
use hoopsync_db::models::{
    DbSyncLog, NewPbpEvent, NewPlayerGameStats, NewPlayerTeamHistory, NewTeamGameStats,
};
use hoopsync_db::{Connection, ConnectionPool, PgConnection, PoolError};
use itertools::Itertools;
use log::{debug, error, info, warn};
use miette::Diagnostic;
use providers::cache::ResponseCache;
use providers::normalize::parse_clock;
use providers::raw::{RawBoxScore, RawGame, RawPbpEvent};
use providers::taxa::{EventType, SyncStatus};
use providers::{AdapterError, SourceAdapter, Sourced};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Run-level failure: the whole sync run could not proceed. Persisted on
/// the log as FAILED and propagated to the trigger caller.
#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Adapter(#[from] AdapterError),

    #[error("couldn't get a database connection")]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Query(#[from] db::QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error("{source_name} does not know season {season_external_id:?}")]
    UnknownSeason {
        source_name: &'static str,
        season_external_id: String,
    },

    #[error("sync log {0} disappeared mid-run")]
    LogVanished(i64),
}

/// Record-level failure: one game/team/record is skipped and accounted
/// for; the run continues.
#[derive(Debug, Error)]
enum RecordError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Inconsistent(String),
}

impl From<db::QueryError> for RecordError {
    fn from(err: db::QueryError) -> Self {
        RecordError::Store(StoreError::Query(err))
    }
}

impl RecordError {
    fn kind(&self) -> &'static str {
        match self {
            RecordError::Adapter(AdapterError::Fetch(_)) => "transport",
            RecordError::Adapter(AdapterError::Map(_)) => "schema",
            RecordError::Store(
                StoreError::IdentityConflict { .. } | StoreError::ExternalIdTaken { .. },
            ) => "identity_conflict",
            RecordError::Store(StoreError::FinalStatusRegression { .. }) => "validation",
            RecordError::Store(_) => "storage",
            RecordError::Inconsistent(_) => "schema",
        }
    }
}

#[derive(Debug, Serialize)]
struct RecordFailure {
    external_id: String,
    kind: &'static str,
    error: String,
}

#[derive(Debug, Default)]
struct RunTally {
    counts: SyncCounts,
    failures: Vec<RecordFailure>,
    notes: Vec<String>,
    cancelled: bool,
}

impl RunTally {
    fn status(&self) -> SyncStatus {
        if self.cancelled || !self.failures.is_empty() {
            SyncStatus::Partial
        } else {
            SyncStatus::Completed
        }
    }

    fn record_failure(&mut self, external_id: &str, err: &RecordError) {
        error!("record {external_id} failed ({}): {err}", err.kind());
        self.failures.push(RecordFailure {
            external_id: external_id.to_string(),
            kind: err.kind(),
            error: err.to_string(),
        });
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        if self.failures.is_empty() && self.notes.is_empty() && !self.cancelled {
            return None;
        }
        let mut details = serde_json::Map::new();
        if !self.failures.is_empty() {
            details.insert("records".to_string(), json!(self.failures));
        }
        if !self.notes.is_empty() {
            details.insert("notes".to_string(), json!(self.notes));
        }
        if self.cancelled {
            details.insert("cancelled".to_string(), json!(true));
        }
        Some(serde_json::Value::Object(details))
    }
}

enum GameOutcome {
    Created,
    Updated,
    SkippedUnchanged,
}

struct GamePayload {
    box_score: Sourced<RawBoxScore>,
    pbp: Option<Sourced<Vec<RawPbpEvent>>>,
}

struct GamePersisted {
    outcome: GameOutcome,
    /// `(player_id, team_id)` tuples whose season aggregates need a
    /// recompute.
    tuples: Vec<(i64, i64)>,
    notes: Vec<String>,
}

pub struct Syncer<A> {
    adapter: A,
    pool: ConnectionPool,
    cache: Option<Arc<ResponseCache>>,
    statement_timeout_s: i64,
    fetch_concurrency: usize,
}

impl<A: SourceAdapter> Syncer<A> {
    pub fn new(
        adapter: A,
        pool: ConnectionPool,
        cache: Option<Arc<ResponseCache>>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            adapter,
            pool,
            cache,
            statement_timeout_s: config.statement_timeout_s,
            fetch_concurrency: config.game_fetch_concurrency.max(1),
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.adapter.source_name()
    }

    fn conn(&self) -> Result<hoopsync_db::PooledConnection, SyncError> {
        let mut conn = self.pool.get()?;
        db::set_statement_timeout(&mut conn, self.statement_timeout_s)?;
        Ok(conn)
    }

    /// Resolve a season's canonical id, discovering it from the provider's
    /// season list on first sight.
    async fn ensure_season(
        &self,
        conn: &mut PgConnection,
        season_external_id: &str,
    ) -> Result<i64, SyncError> {
        let source = self.adapter.source_name();
        if let Some(id) =
            db::lookup_external_id(conn, EntityKind::Season, source, season_external_id)?
        {
            return Ok(id);
        }

        info!("{source} season {season_external_id:?} is new; fetching the season list");
        let seasons = self.adapter.get_seasons().await?;
        for entry in seasons.into_iter() {
            let season = match entry {
                Ok(season) => season,
                Err(err) => {
                    warn!("{source} sent an unmappable season entry: {err}");
                    continue;
                }
            };
            if season.external_id != season_external_id {
                continue;
            }
            let league_id = db::upsert_league(
                conn,
                &season.league_code,
                &season.league_name,
                season.league_country.as_deref(),
            )?;
            let upserted = db::upsert_season(conn, source, league_id, &season)?;
            return Ok(upserted.id);
        }

        Err(SyncError::UnknownSeason {
            source_name: source,
            season_external_id: season_external_id.to_string(),
        })
    }

    fn finalize(
        &self,
        conn: &mut PgConnection,
        log_id: i64,
        body_result: Result<RunTally, SyncError>,
    ) -> Result<DbSyncLog, SyncError> {
        match body_result {
            Ok(tally) => {
                let status = tally.status();
                db::finish_sync_log(
                    conn,
                    log_id,
                    status,
                    tally.counts,
                    None,
                    tally.error_details(),
                    Utc::now(),
                )?;
                info!(
                    "{} sync log {log_id} finished {status}: {:?}",
                    self.adapter.source_name(),
                    tally.counts,
                );
                db::sync_log_by_id(conn, log_id)?.ok_or(SyncError::LogVanished(log_id))
            }
            Err(err) => {
                error!(
                    "{} sync log {log_id} failed: {err}",
                    self.adapter.source_name(),
                );
                if let Err(finish_err) = db::finish_sync_log(
                    conn,
                    log_id,
                    SyncStatus::Failed,
                    SyncCounts::default(),
                    Some(&err.to_string()),
                    None,
                    Utc::now(),
                ) {
                    error!("couldn't persist FAILED status on sync log {log_id}: {finish_err}");
                }
                Err(err)
            }
        }
    }

    /// Sync every final, not-yet-synced game of one season.
    pub async fn sync_season(
        &self,
        season_external_id: &str,
        include_pbp: bool,
        cancel: &CancellationToken,
    ) -> Result<DbSyncLog, SyncError> {
        let source = self.adapter.source_name();
        if let Some(cache) = &self.cache {
            cache.begin_run();
        }
        let mut conn = self.conn()?;
        let log_id =
            db::start_sync_log(&mut conn, source, "game", None, None, Utc::now())?;

        let body = self
            .season_body(&mut conn, log_id, season_external_id, include_pbp, cancel)
            .await;
        self.finalize(&mut conn, log_id, body)
    }

    async fn season_body(
        &self,
        conn: &mut PgConnection,
        log_id: i64,
        season_external_id: &str,
        include_pbp: bool,
        cancel: &CancellationToken,
    ) -> Result<RunTally, SyncError> {
        let source = self.adapter.source_name();
        let season_id = self.ensure_season(conn, season_external_id).await?;
        db::attach_sync_log_season(conn, log_id, season_id)?;

        let mut tally = RunTally::default();

        let schedule = self.adapter.get_schedule(season_external_id).await?;
        let mut final_games = Vec::new();
        for (index, entry) in schedule.into_iter().enumerate() {
            match entry {
                Ok(game) => {
                    if self.adapter.is_game_final(&game) {
                        final_games.push(game);
                    } else {
                        debug!(
                            "{source} game {} is {}; not syncing",
                            game.external_id, game.status,
                        );
                    }
                }
                Err(err) => {
                    tally.counts.processed += 1;
                    tally.counts.skipped += 1;
                    tally.record_failure(
                        &format!("schedule[{index}]"),
                        &RecordError::Adapter(err.into()),
                    );
                }
            }
        }

        // Incremental skip: a game whose external id is already mapped has
        // been synced before.
        let mut pending = Vec::new();
        for game in final_games {
            if db::lookup_external_id(conn, EntityKind::Game, source, &game.external_id)?
                .is_some()
            {
                debug!("{source} game {} already synced; skipping", game.external_id);
                tally.counts.processed += 1;
                tally.counts.skipped += 1;
            } else {
                pending.push(game);
            }
        }
        info!(
            "{source} season {season_external_id:?}: {} game(s) to sync",
            pending.len(),
        );

        // Fetch concurrently (the token bucket is the throttle), persist
        // serially in completion order: one writer, one transaction per
        // game. Games within a season are order-independent, so a slow
        // fetch must not hold up ones that already finished.
        let fetches = futures::stream::iter(pending.into_iter().map(|game| async move {
            let payload = self.fetch_game(&game, include_pbp).await;
            (game, payload)
        }))
        .buffer_unordered(self.fetch_concurrency);
        pin_mut!(fetches);

        while let Some((game, payload)) = fetches.next().await {
            if cancel.is_cancelled() {
                info!("{source} sync cancelled; closing log {log_id} as PARTIAL");
                tally.cancelled = true;
                break;
            }
            tally.counts.processed += 1;
            let persisted = match payload {
                Ok(payload) => self.persist_game(conn, season_id, &game, payload),
                Err(err) => Err(err),
            };
            match persisted {
                Ok(result) => {
                    match result.outcome {
                        GameOutcome::Created => tally.counts.created += 1,
                        GameOutcome::Updated => tally.counts.updated += 1,
                        GameOutcome::SkippedUnchanged => tally.counts.skipped += 1,
                    }
                    tally.notes.extend(result.notes);
                    self.recalculate(conn, season_id, &result.tuples, &mut tally);
                }
                Err(err) => {
                    tally.counts.skipped += 1;
                    tally.record_failure(&game.external_id, &err);
                }
            }
        }

        Ok(tally)
    }

    /// Sync one game by external id, regardless of season state.
    pub async fn sync_game(
        &self,
        game_external_id: &str,
        include_pbp: bool,
        cancel: &CancellationToken,
    ) -> Result<DbSyncLog, SyncError> {
        let source = self.adapter.source_name();
        if let Some(cache) = &self.cache {
            cache.begin_run();
        }
        let mut conn = self.conn()?;
        let log_id = db::start_sync_log(&mut conn, source, "game", None, None, Utc::now())?;

        let body = self
            .game_body(&mut conn, log_id, game_external_id, include_pbp, cancel)
            .await;
        self.finalize(&mut conn, log_id, body)
    }

    async fn game_body(
        &self,
        conn: &mut PgConnection,
        log_id: i64,
        game_external_id: &str,
        include_pbp: bool,
        cancel: &CancellationToken,
    ) -> Result<RunTally, SyncError> {
        let source = self.adapter.source_name();
        let mut tally = RunTally::default();

        // The boxscore is the authority for which season this game is in.
        let box_score = self.adapter.get_game_boxscore(game_external_id, false).await?;
        let season_id = self
            .ensure_season(conn, &box_score.value.game.season_external_id)
            .await?;
        db::attach_sync_log_season(conn, log_id, season_id)?;

        if cancel.is_cancelled() {
            tally.cancelled = true;
            return Ok(tally);
        }

        let pbp = if include_pbp {
            Some(self.adapter.get_game_pbp(game_external_id, false).await?)
        } else {
            None
        };

        let game = box_score.value.game.clone();
        tally.counts.processed += 1;
        match self.persist_game(conn, season_id, &game, GamePayload { box_score, pbp }) {
            Ok(result) => {
                match result.outcome {
                    GameOutcome::Created => tally.counts.created += 1,
                    GameOutcome::Updated => tally.counts.updated += 1,
                    GameOutcome::SkippedUnchanged => tally.counts.skipped += 1,
                }
                tally.notes.extend(result.notes);
                if let Some(game_id) =
                    db::lookup_external_id(conn, EntityKind::Game, source, game_external_id)?
                {
                    db::attach_sync_log_game(conn, log_id, game_id)?;
                }
                self.recalculate(conn, season_id, &result.tuples, &mut tally);
            }
            Err(err) => {
                tally.counts.skipped += 1;
                tally.record_failure(game_external_id, &err);
            }
        }

        Ok(tally)
    }

    /// Resolve teams (with rosters) into the canonical store and record
    /// season membership.
    pub async fn sync_teams(
        &self,
        season_external_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DbSyncLog, SyncError> {
        let source = self.adapter.source_name();
        if let Some(cache) = &self.cache {
            cache.begin_run();
        }
        let mut conn = self.conn()?;
        let log_id = db::start_sync_log(&mut conn, source, "team", None, None, Utc::now())?;

        let body = self
            .teams_body(&mut conn, log_id, season_external_id, cancel)
            .await;
        self.finalize(&mut conn, log_id, body)
    }

    async fn teams_body(
        &self,
        conn: &mut PgConnection,
        log_id: i64,
        season_external_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RunTally, SyncError> {
        let source = self.adapter.source_name();
        let season_id = self.ensure_season(conn, season_external_id).await?;
        db::attach_sync_log_season(conn, log_id, season_id)?;

        let mut tally = RunTally::default();
        let teams = self.adapter.get_teams(season_external_id).await?;

        for (index, entry) in teams.into_iter().enumerate() {
            if cancel.is_cancelled() {
                tally.cancelled = true;
                break;
            }
            tally.counts.processed += 1;
            let raw_team = match entry {
                Ok(team) => team,
                Err(err) => {
                    tally.counts.skipped += 1;
                    tally.record_failure(
                        &format!("teams[{index}]"),
                        &RecordError::Adapter(err.into()),
                    );
                    continue;
                }
            };

            let result: Result<(bool, Vec<String>), RecordError> = conn.transaction(|conn| {
                let mut notes = Vec::new();
                let team = resolve::resolve_team(conn, source, &raw_team)?;
                notes.extend(team.note.clone());
                db::ensure_team_season(conn, team.id, season_id)?;
                for player in &raw_team.roster {
                    let resolved = resolve::resolve_player(conn, source, player, Some(team.id))?;
                    notes.extend(resolved.note);
                    let position = player.positions.first().map(ToString::to_string);
                    db::ensure_player_team_history(
                        conn,
                        &NewPlayerTeamHistory {
                            player_id: resolved.id,
                            team_id: team.id,
                            season_id,
                            jersey_number: player.jersey_number,
                            position: position.as_deref(),
                        },
                    )?;
                }
                Ok((team.created, notes))
            });

            match result {
                Ok((created, notes)) => {
                    if created {
                        tally.counts.created += 1;
                    } else {
                        tally.counts.updated += 1;
                    }
                    tally.notes.extend(notes);
                }
                Err(err) => {
                    tally.counts.skipped += 1;
                    tally.record_failure(&raw_team.external_id, &err);
                }
            }
        }

        Ok(tally)
    }

    async fn fetch_game(
        &self,
        game: &RawGame,
        include_pbp: bool,
    ) -> Result<GamePayload, RecordError> {
        let box_score = self
            .adapter
            .get_game_boxscore(&game.external_id, false)
            .await?;
        let pbp = if include_pbp {
            Some(self.adapter.get_game_pbp(&game.external_id, false).await?)
        } else {
            None
        };
        Ok(GamePayload { box_score, pbp })
    }

    /// Persist one game's full payload inside its own transaction.
    fn persist_game(
        &self,
        conn: &mut PgConnection,
        season_id: i64,
        schedule_game: &RawGame,
        payload: GamePayload,
    ) -> Result<GamePersisted, RecordError> {
        let source = self.adapter.source_name();

        // Content-hash short-circuit: if nothing changed since the last
        // fetch and the game is already in the store, skip downstream work.
        let unchanged = !payload.box_score.changed
            && payload.pbp.as_ref().is_none_or(|pbp| !pbp.changed);
        if unchanged
            && db::lookup_external_id(
                conn,
                EntityKind::Game,
                source,
                &schedule_game.external_id,
            )?
            .is_some()
        {
            debug!(
                "{source} game {} is unchanged since the last sync",
                schedule_game.external_id,
            );
            return Ok(GamePersisted {
                outcome: GameOutcome::SkippedUnchanged,
                tuples: Vec::new(),
                notes: Vec::new(),
            });
        }

        let box_score = payload.box_score.value;
        let pbp_events = payload.pbp.map(|pbp| pbp.value);

        conn.transaction(|conn| {
            let mut notes = Vec::new();
            let game_record = &box_score.game;

            let home =
                resolve::resolve_team_ref(conn, source, &game_record.home_team_external_id)?;
            let away =
                resolve::resolve_team_ref(conn, source, &game_record.away_team_external_id)?;
            let upserted =
                db::upsert_game(conn, source, season_id, home.id, away.id, game_record)?;
            let game_id = upserted.id;
            db::ensure_team_season(conn, home.id, season_id)?;
            db::ensure_team_season(conn, away.id, season_id)?;

            let mut team_ids: HashMap<&str, i64> = HashMap::new();
            team_ids.insert(game_record.home_team_external_id.as_str(), home.id);
            team_ids.insert(game_record.away_team_external_id.as_str(), away.id);

            let mut player_ids: HashMap<String, i64> = HashMap::new();
            let mut player_rows = Vec::with_capacity(box_score.player_lines.len());
            let mut tuples = Vec::new();
            for line in &box_score.player_lines {
                let team_id = *team_ids.get(line.team_external_id.as_str()).ok_or_else(|| {
                    RecordError::Inconsistent(format!(
                        "player line for {:?} references team {:?}, which is neither side \
                        of the game",
                        line.player.external_id, line.team_external_id,
                    ))
                })?;
                let resolved = resolve::resolve_player(conn, source, &line.player, Some(team_id))?;
                notes.extend(resolved.note.clone());
                if player_ids
                    .insert(line.player.external_id.clone(), resolved.id)
                    .is_some()
                {
                    return Err(RecordError::Inconsistent(format!(
                        "duplicate box score line for player {:?}",
                        line.player.external_id,
                    )));
                }
                let position = line.player.positions.first().map(ToString::to_string);
                db::ensure_player_team_history(
                    conn,
                    &NewPlayerTeamHistory {
                        player_id: resolved.id,
                        team_id,
                        season_id,
                        jersey_number: line.player.jersey_number,
                        position: position.as_deref(),
                    },
                )?;
                tuples.push((resolved.id, team_id));
                player_rows.push(NewPlayerGameStats {
                    game_id,
                    player_id: resolved.id,
                    team_id,
                    seconds_played: line.seconds_played,
                    is_starter: line.is_starter,
                    points: line.counters.points,
                    fgm: line.counters.fgm,
                    fga: line.counters.fga,
                    two_pm: line.counters.two_pm,
                    two_pa: line.counters.two_pa,
                    three_pm: line.counters.three_pm,
                    three_pa: line.counters.three_pa,
                    ftm: line.counters.ftm,
                    fta: line.counters.fta,
                    oreb: line.counters.oreb,
                    dreb: line.counters.dreb,
                    treb: line.counters.treb,
                    ast: line.counters.ast,
                    tov: line.counters.tov,
                    stl: line.counters.stl,
                    blk: line.counters.blk,
                    pf: line.counters.pf,
                    plus_minus: line.plus_minus,
                    efficiency: line.efficiency,
                    extra: serde_json::Value::Object(line.extra.clone()),
                });
            }

            let team_rows = box_score
                .team_lines
                .iter()
                .map(|line| {
                    let team_id =
                        *team_ids.get(line.team_external_id.as_str()).ok_or_else(|| {
                            RecordError::Inconsistent(format!(
                                "team line references team {:?}, which is neither side of \
                                the game",
                                line.team_external_id,
                            ))
                        })?;
                    Ok(NewTeamGameStats {
                        game_id,
                        team_id,
                        points: line.counters.points,
                        fgm: line.counters.fgm,
                        fga: line.counters.fga,
                        two_pm: line.counters.two_pm,
                        two_pa: line.counters.two_pa,
                        three_pm: line.counters.three_pm,
                        three_pa: line.counters.three_pa,
                        ftm: line.counters.ftm,
                        fta: line.counters.fta,
                        oreb: line.counters.oreb,
                        dreb: line.counters.dreb,
                        treb: line.counters.treb,
                        ast: line.counters.ast,
                        tov: line.counters.tov,
                        stl: line.counters.stl,
                        blk: line.counters.blk,
                        pf: line.counters.pf,
                        fast_break_points: line.fast_break_points,
                        points_in_paint: line.points_in_paint,
                        second_chance_points: line.second_chance_points,
                        bench_points: line.bench_points,
                        biggest_lead: line.biggest_lead,
                        seconds_leading: line.seconds_leading,
                        extra: serde_json::Value::Object(line.extra.clone()),
                    })
                })
                .collect::<Result<Vec<_>, RecordError>>()?;

            let (event_rows, link_specs) = match &pbp_events {
                Some(events) => {
                    build_pbp_rows(conn, source, game_id, events, &player_ids, &team_ids)?
                }
                None => (Vec::new(), Vec::new()),
            };

            db::insert_game_bundle(
                conn,
                game_id,
                &player_rows,
                &team_rows,
                &event_rows,
                &link_specs,
            )?;

            Ok(GamePersisted {
                outcome: if upserted.created {
                    GameOutcome::Created
                } else {
                    GameOutcome::Updated
                },
                tuples,
                notes,
            })
        })
    }

    /// Implicit aggregation trigger: recompute every `(player, team)` tuple
    /// the persisted game touched. Failures are recorded, not fatal.
    fn recalculate(
        &self,
        conn: &mut PgConnection,
        season_id: i64,
        tuples: &[(i64, i64)],
        tally: &mut RunTally,
    ) {
        for (player_id, team_id) in tuples.iter().unique() {
            if let Err(err) =
                aggregate::recalculate_tuple(conn, *player_id, *team_id, season_id, Utc::now())
            {
                tally.record_failure(
                    &format!("aggregate:{player_id}:{team_id}"),
                    &RecordError::from(err),
                );
            }
        }
    }
}

/// Convert raw PBP events into insertable rows, resolving player/team
/// references and rewriting substitution attributes to canonical ids.
fn build_pbp_rows(
    conn: &mut PgConnection,
    source: &str,
    game_id: i64,
    events: &[RawPbpEvent],
    player_ids: &HashMap<String, i64>,
    team_ids: &HashMap<&str, i64>,
) -> Result<(Vec<NewPbpEvent>, Vec<EventLinkSpec>), RecordError> {
    let mut rows = Vec::with_capacity(events.len());
    let mut links = Vec::new();

    let mut last_number = None;
    for event in events {
        if last_number.is_some_and(|last| last >= event.event_number) {
            return Err(RecordError::Inconsistent(format!(
                "play-by-play is not strictly ordered at event {}",
                event.event_number,
            )));
        }
        last_number = Some(event.event_number);

        if parse_clock(&event.clock).is_err() {
            return Err(RecordError::Inconsistent(format!(
                "event {} has malformed clock {:?}",
                event.event_number, event.clock,
            )));
        }

        let team_id = *team_ids
            .get(event.team_external_id.as_str())
            .ok_or_else(|| {
                RecordError::Inconsistent(format!(
                    "event {} references team {:?}, which is neither side of the game",
                    event.event_number, event.team_external_id,
                ))
            })?;

        let mut resolve_player_id = |external: &str| -> Result<Option<i64>, RecordError> {
            if let Some(id) = player_ids.get(external) {
                return Ok(Some(*id));
            }
            Ok(db::lookup_external_id(
                conn,
                EntityKind::Player,
                source,
                external,
            )?)
        };

        let player_id = match &event.player_external_id {
            Some(external) => resolve_player_id(external)?,
            None => None,
        };

        let mut attributes = event.attributes.clone();
        if event.event_type == EventType::Substitution {
            for attribute in ["player_in_id", "player_out_id"] {
                let external = attributes
                    .get(attribute)
                    .and_then(|value| value.as_str())
                    .map(str::to_string);
                if let Some(external) = external {
                    if let Some(canonical) = resolve_player_id(&external)? {
                        attributes.insert(attribute.to_string(), json!(canonical.to_string()));
                    } else {
                        warn!(
                            "event {}: substitution references unknown player {external:?}; \
                            leaving the raw id in place",
                            event.event_number,
                        );
                    }
                }
            }
        }

        for link in &event.links {
            links.push(EventLinkSpec {
                from_event_number: event.event_number,
                to_event_number: link.event_number,
                relation: link.relation.clone(),
            });
        }

        rows.push(NewPbpEvent {
            game_id,
            event_number: event.event_number,
            period: event.period,
            clock: event.clock.clone(),
            event_type: event.event_type.to_string(),
            event_subtype: event.event_subtype.clone(),
            player_id,
            team_id,
            success: event.success,
            coord_x: event.coord_x,
            coord_y: event.coord_y,
            attributes: serde_json::Value::Object(attributes),
        });
    }

    Ok((rows, links))
}
