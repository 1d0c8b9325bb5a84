mod api;

use hoopsync_ingest::config::IngestConfig;
use providers::cache::ResponseCache;
use rocket::fairing::AdHoc;
use rocket::figment::map;
use rocket::{figment, launch, Build, Rocket};
use rocket_sync_db_pools::database as sync_database;
use rocket_sync_db_pools::diesel::PgConnection;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[sync_database("hoopsync")]
pub struct Db(PgConnection);

/// State the sync trigger endpoints need: configuration, a writer pool of
/// our own (sync runs should not starve the read pool), the shared response
/// cache, and a shutdown token that cancels in-flight runs cooperatively.
pub struct SyncState {
    pub config: IngestConfig,
    pub pool: hoopsync_db::ConnectionPool,
    pub cache: Option<Arc<ResponseCache>>,
    pub shutdown: CancellationToken,
}

async fn run_migrations(rocket: Rocket<Build>) -> Rocket<Build> {
    tokio::task::spawn_blocking(|| {
        hoopsync_db::migrations::run_migrations().expect("Failed to apply migrations")
    })
    .await
    .expect("Error joining migrations task");

    rocket
}

fn get_figment_with_constructed_db_url() -> figment::Figment {
    let url = hoopsync_db::database_url().expect("Invalid database configuration");
    rocket::Config::figment().merge(("databases", map!["hoopsync" => map!["url" => url]]))
}

fn build_sync_state() -> SyncState {
    let config = IngestConfig::config().expect("Invalid hoopsync configuration");
    let pool = hoopsync_db::pool::get_pool(config.db_pool_size)
        .expect("Failed to build the sync connection pool");
    let cache = config.sources.cache_dir.as_ref().map(|dir| {
        Arc::new(ResponseCache::open(dir).expect("Failed to open the response cache"))
    });
    SyncState {
        config,
        pool,
        cache,
        shutdown: CancellationToken::new(),
    }
}

#[launch]
fn rocket() -> _ {
    rocket::custom(get_figment_with_constructed_db_url())
        .mount("/api", api::routes())
        .attach(Db::fairing())
        .attach(AdHoc::on_ignite("Migrations", run_migrations))
        .attach(AdHoc::on_ignite("Sync state", |rocket| async {
            rocket.manage(build_sync_state())
        }))
        .attach(AdHoc::on_shutdown("Cancel syncs", |rocket| {
            Box::pin(async {
                if let Some(state) = rocket.state::<SyncState>() {
                    state.shutdown.cancel();
                }
            })
        }))
}
