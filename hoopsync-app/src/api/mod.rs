mod analytics;
mod error;
mod query;
mod sync;

pub use error::ApiError;

#[rocket::get("/")]
pub async fn index() -> &'static str {
    "This is the hoopsync API."
}

pub fn routes() -> Vec<rocket::Route> {
    rocket::routes![
        index,
        sync::sync_season,
        sync::sync_game,
        sync::sync_teams,
        sync::sync_status,
        sync::sync_logs,
        query::players,
        query::player_by_id,
        query::teams,
        query::games,
        query::leaders,
        query::recalculate_player,
        query::recalculate_season,
        analytics::clutch,
        analytics::onoff,
        analytics::lineups,
        analytics::quarters,
        analytics::situational,
        analytics::opponent_splits,
        analytics::filtered_events,
    ]
}
