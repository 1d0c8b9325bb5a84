//! Sync trigger and status endpoints. Triggers run the workflow to
//! completion and return the finished SyncLog snapshot; configuration
//! decides which sources may be synced at all.

use crate::api::error::ApiError;
use crate::{Db, SyncState};
use hoopsync_db::db::{self, SyncLogFilter};
use hoopsync_db::models::DbSyncLog;
use hoopsync_ingest::sync::Syncer;
use providers::build_adapter;
use rocket::serde::json::Json;
use rocket::serde::Serialize;
use rocket::{get, post, State};

fn build_syncer(
    state: &SyncState,
    source: &str,
) -> Result<Syncer<providers::AnyAdapter>, ApiError> {
    let adapter = build_adapter(source, &state.config.sources, state.cache.clone())?;
    Ok(Syncer::new(
        adapter,
        state.pool.clone(),
        state.cache.clone(),
        &state.config,
    ))
}

#[post("/sync/<source>/season/<season_external_id>?<include_pbp>")]
pub async fn sync_season(
    state: &State<SyncState>,
    source: &str,
    season_external_id: &str,
    include_pbp: Option<bool>,
) -> Result<Json<DbSyncLog>, ApiError> {
    let syncer = build_syncer(state, source)?;
    let cancel = state.shutdown.child_token();
    let log = syncer
        .sync_season(season_external_id, include_pbp.unwrap_or(false), &cancel)
        .await?;
    Ok(Json(log))
}

#[post("/sync/<source>/game/<game_external_id>?<include_pbp>")]
pub async fn sync_game(
    state: &State<SyncState>,
    source: &str,
    game_external_id: &str,
    include_pbp: Option<bool>,
) -> Result<Json<DbSyncLog>, ApiError> {
    let syncer = build_syncer(state, source)?;
    let cancel = state.shutdown.child_token();
    let log = syncer
        .sync_game(game_external_id, include_pbp.unwrap_or(false), &cancel)
        .await?;
    Ok(Json(log))
}

#[post("/sync/<source>/teams/<season_external_id>")]
pub async fn sync_teams(
    state: &State<SyncState>,
    source: &str,
    season_external_id: &str,
) -> Result<Json<DbSyncLog>, ApiError> {
    let syncer = build_syncer(state, source)?;
    let cancel = state.shutdown.child_token();
    let log = syncer.sync_teams(season_external_id, &cancel).await?;
    Ok(Json(log))
}

#[derive(Debug, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub enabled: bool,
    pub auto_sync_enabled: bool,
    pub sync_interval_minutes: u32,
    pub running_syncs: i64,
    pub latest_season_sync: Option<DbSyncLog>,
    pub latest_game_sync: Option<DbSyncLog>,
}

#[get("/sync/status")]
pub async fn sync_status(
    state: &State<SyncState>,
    db: Db,
) -> Result<Json<Vec<SourceStatus>>, ApiError> {
    let configured: Vec<(String, bool, bool, u32)> = state
        .config
        .sources
        .sources_in_priority_order()
        .into_iter()
        .filter_map(|name| {
            state.config.sources.get(name).map(|source_config| {
                (
                    name.to_string(),
                    source_config.enabled,
                    source_config.auto_sync_enabled,
                    source_config.sync_interval_minutes,
                )
            })
        })
        .collect();

    let statuses = db
        .run(move |conn| {
            configured
                .into_iter()
                .map(|(name, enabled, auto_sync_enabled, sync_interval_minutes)| {
                    Ok(SourceStatus {
                        running_syncs: db::running_sync_count(conn, &name)?,
                        latest_season_sync: db::latest_season_sync_log(conn, &name)?,
                        latest_game_sync: db::latest_game_sync_log(conn, &name)?,
                        name,
                        enabled,
                        auto_sync_enabled,
                        sync_interval_minutes,
                    })
                })
                .collect::<Result<Vec<_>, diesel::result::Error>>()
        })
        .await?;

    Ok(Json(statuses))
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[get("/sync/logs?<source>&<entity_type>&<status>&<page>&<per_page>")]
pub async fn sync_logs(
    db: Db,
    source: Option<String>,
    entity_type: Option<String>,
    status: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
) -> Result<Json<Page<DbSyncLog>>, ApiError> {
    let page = page.unwrap_or(0);
    let per_page = per_page.unwrap_or(25).clamp(1, 200);
    let (items, total) = db
        .run(move |conn| {
            let filter = SyncLogFilter {
                source: source.as_deref(),
                entity_type: entity_type.as_deref(),
                status: status.as_deref(),
            };
            db::sync_logs_list(conn, &filter, page, per_page)
        })
        .await?;
    Ok(Json(Page { items, total }))
}
