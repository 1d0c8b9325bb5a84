//! Auto-sync scheduler: loops over the enabled sources in priority order
//! and keeps their configured seasons in sync on each source's interval.
//! Ctrl-c cancels cooperatively; the in-flight game finishes and its log
//! closes as PARTIAL.

use chrono::Utc;
use hoopsync_ingest::config::IngestConfig;
use hoopsync_ingest::sync::Syncer;
use log::{error, info, warn};
use miette::IntoDiagnostic;
use providers::build_adapter;
use providers::cache::ResponseCache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> miette::Result<()> {
    env_logger::init();

    let config = IngestConfig::config().into_diagnostic()?;

    hoopsync_db::migrations::run_migrations().into_diagnostic()?;
    let pool = hoopsync_db::pool::get_pool(config.db_pool_size).into_diagnostic()?;

    let cache = match &config.sources.cache_dir {
        Some(dir) => Some(Arc::new(ResponseCache::open(dir).into_diagnostic()?)),
        None => None,
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received; finishing the in-flight game and shutting down");
                cancel.cancel();
            }
        }
    });

    let mut next_run: HashMap<&str, Instant> = HashMap::new();

    info!("Scheduler starting");
    while !cancel.is_cancelled() {
        let mut soonest: Option<Instant> = None;

        for source_name in config.sources.sources_in_priority_order() {
            let Some(source_config) = config.sources.get(source_name) else {
                continue;
            };
            if !source_config.enabled || !source_config.auto_sync_enabled {
                continue;
            }

            let now = Instant::now();
            let due = next_run.get(source_name).copied().unwrap_or(now);
            if due > now {
                soonest = Some(soonest.map_or(due, |s| s.min(due)));
                continue;
            }

            run_source(&config, source_name, &pool, cache.clone(), &cancel).await;

            let interval =
                Duration::from_secs(u64::from(source_config.sync_interval_minutes) * 60);
            let next = Instant::now() + interval;
            next_run.insert(source_name, next);
            soonest = Some(soonest.map_or(next, |s| s.min(next)));

            if cancel.is_cancelled() {
                break;
            }
        }

        let sleep_until = soonest.unwrap_or_else(|| Instant::now() + Duration::from_secs(60));
        tokio::select! {
            _ = tokio::time::sleep_until(sleep_until) => {}
            _ = cancel.cancelled() => {}
        }
    }

    info!("Scheduler stopped at {}", Utc::now());
    Ok(())
}

async fn run_source(
    config: &IngestConfig,
    source_name: &str,
    pool: &hoopsync_db::ConnectionPool,
    cache: Option<Arc<ResponseCache>>,
    cancel: &CancellationToken,
) {
    let source_config = match config.sources.get(source_name) {
        Some(source_config) => source_config,
        None => return,
    };
    if source_config.season_external_ids.is_empty() {
        warn!("{source_name} is enabled for auto-sync but has no seasons configured");
        return;
    }

    let adapter = match build_adapter(source_name, &config.sources, cache.clone()) {
        Ok(adapter) => adapter,
        Err(err) => {
            error!("couldn't build {source_name} adapter: {err}");
            return;
        }
    };
    let syncer = Syncer::new(adapter, pool.clone(), cache, config);

    for season_external_id in &source_config.season_external_ids {
        if cancel.is_cancelled() {
            return;
        }
        info!(
            "auto-sync: {} season {season_external_id:?}",
            syncer.source_name(),
        );
        if let Err(err) = syncer.sync_teams(season_external_id, cancel).await {
            error!(
                "{} teams sync for {season_external_id:?} failed: {err}",
                syncer.source_name(),
            );
        }
        match syncer
            .sync_season(season_external_id, source_config.include_pbp, cancel)
            .await
        {
            Ok(log) => info!(
                "{} season {season_external_id:?} finished with status {} \
                ({} processed, {} created, {} updated, {} skipped)",
                syncer.source_name(),
                log.status,
                log.records_processed,
                log.records_created,
                log.records_updated,
                log.records_skipped,
            ),
            Err(err) => error!(
                "{} season sync for {season_external_id:?} failed: {err}",
                syncer.source_name(),
            ),
        }
    }
}
