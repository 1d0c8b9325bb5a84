//! Repository operations over the canonical store. Everything here is a
//! free function over `&mut PgConnection`; multi-statement operations either
//! open their own transaction (merges, season current-flag swaps) or state
//! that they expect the caller's (game bundles).

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::{sql_query, PgConnection};
use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;
use miette::Diagnostic;
use providers::normalize::fold_name;
use providers::raw::{RawGame, RawPlayer, RawSeason};
use providers::taxa::SyncStatus;
use serde::Serialize;
use thiserror::Error;

use crate::models::{
    DbExternalId, DbGame, DbLeague, DbPbpEvent, DbPbpEventLink, DbPlayer, DbPlayerGameStats,
    DbPlayerSeasonStats, DbPlayerTeamHistory, DbSeason, DbSyncLog, DbTeam, DbTeamGameStats,
    NewExternalId, NewGame, NewLeague, NewPbpEvent, NewPbpEventLink, NewPlayer,
    NewPlayerGameStats, NewPlayerSeasonStats, NewPlayerTeamHistory, NewSeason, NewSyncLog,
    NewTeam, NewTeamGameStats, NewTeamSeason,
};

pub type QueryError = diesel::result::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(
        "conflicting {entity_type} external id for source {source_name:?}: canonical row \
        {canonical_id} already carries {existing:?}, refusing {incoming:?}"
    )]
    IdentityConflict {
        entity_type: &'static str,
        source_name: String,
        canonical_id: i64,
        existing: String,
        incoming: String,
    },

    #[error(
        "{entity_type} external id {external_id:?} for source {source_name:?} already \
        maps to canonical row {mapped_to}; cannot attach it to row {requested}"
    )]
    ExternalIdTaken {
        entity_type: &'static str,
        source_name: String,
        external_id: String,
        mapped_to: i64,
        requested: i64,
    },

    #[error("game {game_id} is FINAL and cannot revert to {attempted:?}")]
    FinalStatusRegression { game_id: i64, attempted: String },

    #[error("sync log {0} is already in a terminal status")]
    SyncLogAlreadyTerminal(i64),

    #[error("sync log {log_id} cannot transition to non-terminal status {status}")]
    InvalidSyncTransition { log_id: i64, status: SyncStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    League,
    Season,
    Team,
    Player,
    Game,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::League => "league",
            EntityKind::Season => "season",
            EntityKind::Team => "team",
            EntityKind::Player => "player",
            EntityKind::Game => "game",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    pub created: bool,
}

// ------------------------------------------------------------- external ids

pub fn lookup_external_id(
    conn: &mut PgConnection,
    kind: EntityKind,
    source: &str,
    external_id: &str,
) -> QueryResult<Option<i64>> {
    use crate::data_schema::data::external_ids::dsl;

    dsl::external_ids
        .filter(dsl::entity_type.eq(kind.as_str()))
        .filter(dsl::source.eq(source))
        .filter(dsl::external_id.eq(external_id))
        .select(dsl::entity_id)
        .first(conn)
        .optional()
}

/// Attach `(source, external_id)` to a canonical row. Re-registering the
/// same pair is a no-op. A pair that already points at a different row is
/// refused as [`StoreError::ExternalIdTaken`]; a row that already carries a
/// different id for the same source is refused as
/// [`StoreError::IdentityConflict`]. Either way nothing is written.
pub fn register_external_id(
    conn: &mut PgConnection,
    kind: EntityKind,
    source: &str,
    external_id: &str,
    entity_id: i64,
) -> Result<(), StoreError> {
    use crate::data_schema::data::external_ids::dsl;

    if let Some(existing_entity) = lookup_external_id(conn, kind, source, external_id)? {
        if existing_entity == entity_id {
            return Ok(());
        }
        return Err(StoreError::ExternalIdTaken {
            entity_type: kind.as_str(),
            source_name: source.to_string(),
            external_id: external_id.to_string(),
            mapped_to: existing_entity,
            requested: entity_id,
        });
    }

    let existing_for_source: Option<String> = dsl::external_ids
        .filter(dsl::entity_type.eq(kind.as_str()))
        .filter(dsl::source.eq(source))
        .filter(dsl::entity_id.eq(entity_id))
        .select(dsl::external_id)
        .first(conn)
        .optional()?;
    if let Some(existing) = existing_for_source {
        if existing != external_id {
            return Err(StoreError::IdentityConflict {
                entity_type: kind.as_str(),
                source_name: source.to_string(),
                canonical_id: entity_id,
                existing,
                incoming: external_id.to_string(),
            });
        }
        return Ok(());
    }

    NewExternalId {
        entity_type: kind.as_str(),
        source,
        external_id,
        entity_id,
    }
    .insert_into(dsl::external_ids)
    .execute(conn)?;
    Ok(())
}

/// `source -> external_id` map for one canonical row.
pub fn external_ids_for_entity(
    conn: &mut PgConnection,
    kind: EntityKind,
    entity_id: i64,
) -> QueryResult<HashMap<String, String>> {
    use crate::data_schema::data::external_ids::dsl;

    let rows: Vec<DbExternalId> = dsl::external_ids
        .filter(dsl::entity_type.eq(kind.as_str()))
        .filter(dsl::entity_id.eq(entity_id))
        .select(DbExternalId::as_select())
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|row| (row.source, row.external_id))
        .collect())
}

// ---------------------------------------------------------- leagues/seasons

pub fn upsert_league(
    conn: &mut PgConnection,
    code: &str,
    name: &str,
    country: Option<&str>,
) -> QueryResult<i64> {
    use crate::data_schema::data::leagues::dsl;

    let existing: Option<DbLeague> = dsl::leagues
        .filter(dsl::code.eq(code))
        .select(DbLeague::as_select())
        .first(conn)
        .optional()?;

    match existing {
        Some(league) => {
            if league.name != name || league.country.as_deref() != country {
                diesel::update(dsl::leagues.filter(dsl::id.eq(league.id)))
                    .set((dsl::name.eq(name), dsl::country.eq(country)))
                    .execute(conn)?;
            }
            Ok(league.id)
        }
        None => NewLeague {
            code,
            name,
            country,
        }
        .insert_into(dsl::leagues)
        .returning(dsl::id)
        .get_result(conn),
    }
}

/// Upsert one season from a raw provider record, registering the external
/// id and maintaining the per-league `is_current` flag.
pub fn upsert_season(
    conn: &mut PgConnection,
    source: &str,
    league_id: i64,
    raw: &RawSeason,
) -> Result<Upserted, StoreError> {
    use crate::data_schema::data::seasons::dsl;

    let upserted = match lookup_external_id(conn, EntityKind::Season, source, &raw.external_id)? {
        Some(id) => {
            diesel::update(dsl::seasons.filter(dsl::id.eq(id)))
                .set((
                    dsl::name.eq(&raw.name),
                    dsl::start_date.eq(raw.start_date),
                    dsl::end_date.eq(raw.end_date),
                ))
                .execute(conn)?;
            Upserted { id, created: false }
        }
        None => {
            let id = NewSeason {
                league_id,
                name: &raw.name,
                start_date: raw.start_date,
                end_date: raw.end_date,
                is_current: false,
            }
            .insert_into(dsl::seasons)
            .returning(dsl::id)
            .get_result(conn)?;
            register_external_id(conn, EntityKind::Season, source, &raw.external_id, id)?;
            Upserted { id, created: true }
        }
    };

    if raw.is_current {
        set_current_season(conn, league_id, upserted.id)?;
    }
    Ok(upserted)
}

/// At most one current season per league: setting one atomically clears its
/// siblings.
pub fn set_current_season(
    conn: &mut PgConnection,
    league_id: i64,
    season_id: i64,
) -> QueryResult<()> {
    use crate::data_schema::data::seasons::dsl;

    conn.transaction(|conn| {
        diesel::update(
            dsl::seasons
                .filter(dsl::league_id.eq(league_id))
                .filter(dsl::id.ne(season_id)),
        )
        .set(dsl::is_current.eq(false))
        .execute(conn)?;
        diesel::update(dsl::seasons.filter(dsl::id.eq(season_id)))
            .set(dsl::is_current.eq(true))
            .execute(conn)?;
        Ok(())
    })
}

pub fn season_by_id(conn: &mut PgConnection, id: i64) -> QueryResult<Option<DbSeason>> {
    use crate::data_schema::data::seasons::dsl;

    dsl::seasons
        .filter(dsl::id.eq(id))
        .select(DbSeason::as_select())
        .first(conn)
        .optional()
}

// -------------------------------------------------------------------- teams

pub fn insert_team(conn: &mut PgConnection, team: &NewTeam) -> QueryResult<i64> {
    use crate::data_schema::data::teams::dsl;

    team.insert_into(dsl::teams)
        .returning(dsl::id)
        .get_result(conn)
}

pub fn team_by_id(conn: &mut PgConnection, id: i64) -> QueryResult<Option<DbTeam>> {
    use crate::data_schema::data::teams::dsl;

    dsl::teams
        .filter(dsl::id.eq(id))
        .select(DbTeam::as_select())
        .first(conn)
        .optional()
}

pub fn teams_by_name_key(conn: &mut PgConnection, name_key: &str) -> QueryResult<Vec<DbTeam>> {
    use crate::data_schema::data::teams::dsl;

    dsl::teams
        .filter(dsl::name_key.eq(name_key))
        .order_by(dsl::id)
        .select(DbTeam::as_select())
        .load(conn)
}

/// Replace a team's name (used when a provisional row learns its real
/// name).
pub fn rename_team(
    conn: &mut PgConnection,
    team_id: i64,
    name: &str,
    name_key: &str,
) -> QueryResult<()> {
    use crate::data_schema::data::teams::dsl;

    diesel::update(dsl::teams.filter(dsl::id.eq(team_id)))
        .set((dsl::name.eq(name), dsl::name_key.eq(name_key)))
        .execute(conn)
        .map(|_| ())
}

/// Fill still-null descriptive fields from a fresher sighting of the team.
pub fn fill_team_fields(
    conn: &mut PgConnection,
    team: &DbTeam,
    short_name: Option<&str>,
    city: Option<&str>,
    country: Option<&str>,
) -> QueryResult<()> {
    use crate::data_schema::data::teams::dsl;

    let new_short_name = team.short_name.as_deref().or(short_name);
    let new_city = team.city.as_deref().or(city);
    let new_country = team.country.as_deref().or(country);
    if new_short_name != team.short_name.as_deref()
        || new_city != team.city.as_deref()
        || new_country != team.country.as_deref()
    {
        diesel::update(dsl::teams.filter(dsl::id.eq(team.id)))
            .set((
                dsl::short_name.eq(new_short_name),
                dsl::city.eq(new_city),
                dsl::country.eq(new_country),
            ))
            .execute(conn)?;
    }
    Ok(())
}

pub fn ensure_team_season(
    conn: &mut PgConnection,
    team_id: i64,
    season_id: i64,
) -> QueryResult<bool> {
    use crate::data_schema::data::team_seasons::dsl;

    let exists: i64 = dsl::team_seasons
        .filter(dsl::team_id.eq(team_id))
        .filter(dsl::season_id.eq(season_id))
        .count()
        .get_result(conn)?;
    if exists > 0 {
        return Ok(false);
    }
    NewTeamSeason { team_id, season_id }
        .insert_into(dsl::team_seasons)
        .execute(conn)?;
    Ok(true)
}

// ------------------------------------------------------------------ players

pub fn insert_player(conn: &mut PgConnection, player: &NewPlayer) -> QueryResult<i64> {
    use crate::data_schema::data::players::dsl;

    player
        .insert_into(dsl::players)
        .returning(dsl::id)
        .get_result(conn)
}

pub fn player_by_id(conn: &mut PgConnection, id: i64) -> QueryResult<Option<DbPlayer>> {
    use crate::data_schema::data::players::dsl;

    dsl::players
        .filter(dsl::id.eq(id))
        .select(DbPlayer::as_select())
        .first(conn)
        .optional()
}

pub fn players_by_name_key(
    conn: &mut PgConnection,
    name_key: &str,
) -> QueryResult<Vec<DbPlayer>> {
    use crate::data_schema::data::players::dsl;

    dsl::players
        .filter(dsl::name_key.eq(name_key))
        .order_by(dsl::id)
        .select(DbPlayer::as_select())
        .load(conn)
}

/// Players who have ever appeared on `team_id`'s roster (any season) under
/// the given normalized name.
pub fn roster_players_by_name_key(
    conn: &mut PgConnection,
    team_id: i64,
    name_key: &str,
) -> QueryResult<Vec<DbPlayer>> {
    use crate::data_schema::data::player_team_history::dsl as history_dsl;
    use crate::data_schema::data::players::dsl as players_dsl;

    players_dsl::players
        .inner_join(history_dsl::player_team_history)
        .filter(history_dsl::team_id.eq(team_id))
        .filter(players_dsl::name_key.eq(name_key))
        .order_by(players_dsl::id)
        .select(DbPlayer::as_select())
        .distinct()
        .load(conn)
}

/// Fill still-null biographical fields and union positions. Field identity
/// follows first-non-null: a value already present is never overwritten.
pub fn fill_player_bio(
    conn: &mut PgConnection,
    player: &DbPlayer,
    raw: &RawPlayer,
) -> QueryResult<()> {
    use crate::data_schema::data::players::dsl;

    let birth_date = player.birth_date.or(raw.birth_date);
    let nationality = player
        .nationality
        .as_deref()
        .or(raw.nationality.as_deref());
    let height_cm = player.height_cm.or(raw.height_cm);

    let mut positions = player.positions.clone();
    for position in &raw.positions {
        let as_string = Some(position.to_string());
        if !positions.contains(&as_string) {
            positions.push(as_string);
        }
    }

    let unchanged = birth_date == player.birth_date
        && nationality == player.nationality.as_deref()
        && height_cm == player.height_cm
        && positions == player.positions;
    if unchanged {
        return Ok(());
    }

    diesel::update(dsl::players.filter(dsl::id.eq(player.id)))
        .set((
            dsl::birth_date.eq(birth_date),
            dsl::nationality.eq(nationality),
            dsl::height_cm.eq(height_cm),
            dsl::positions.eq(positions),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn ensure_player_team_history(
    conn: &mut PgConnection,
    entry: &NewPlayerTeamHistory,
) -> QueryResult<bool> {
    use crate::data_schema::data::player_team_history::dsl;

    let existing: Option<i64> = dsl::player_team_history
        .filter(dsl::player_id.eq(entry.player_id))
        .filter(dsl::team_id.eq(entry.team_id))
        .filter(dsl::season_id.eq(entry.season_id))
        .select(dsl::id)
        .first(conn)
        .optional()?;
    if let Some(id) = existing {
        // Jersey and position may arrive later than the row itself.
        diesel::update(
            dsl::player_team_history
                .filter(dsl::id.eq(id))
                .filter(dsl::jersey_number.is_null()),
        )
        .set((
            dsl::jersey_number.eq(entry.jersey_number),
            dsl::position.eq(entry.position),
        ))
        .execute(conn)?;
        return Ok(false);
    }
    entry.insert_into(dsl::player_team_history).execute(conn)?;
    Ok(true)
}

pub fn history_for_player(
    conn: &mut PgConnection,
    player_id: i64,
) -> QueryResult<Vec<DbPlayerTeamHistory>> {
    use crate::data_schema::data::player_team_history::dsl;

    dsl::player_team_history
        .filter(dsl::player_id.eq(player_id))
        .order_by(dsl::id)
        .select(DbPlayerTeamHistory::as_select())
        .load(conn)
}

// -------------------------------------------------------------------- games

/// Upsert a game from a raw record, registering its external id. FINAL is
/// terminal: an update that would move a FINAL game to any other status is
/// refused.
pub fn upsert_game(
    conn: &mut PgConnection,
    source: &str,
    season_id: i64,
    home_team_id: i64,
    away_team_id: i64,
    raw: &RawGame,
) -> Result<Upserted, StoreError> {
    use crate::data_schema::data::games::dsl;

    let status = raw.status.to_string();
    match lookup_external_id(conn, EntityKind::Game, source, &raw.external_id)? {
        Some(id) => {
            let existing_status: String = dsl::games
                .filter(dsl::id.eq(id))
                .select(dsl::status)
                .first(conn)?;
            if existing_status == "FINAL" && status != "FINAL" {
                return Err(StoreError::FinalStatusRegression {
                    game_id: id,
                    attempted: status,
                });
            }
            diesel::update(dsl::games.filter(dsl::id.eq(id)))
                .set((
                    dsl::game_date.eq(raw.game_date),
                    dsl::status.eq(&status),
                    dsl::home_score.eq(raw.home_score),
                    dsl::away_score.eq(raw.away_score),
                    dsl::venue.eq(raw.venue.as_deref()),
                    dsl::attendance.eq(raw.attendance),
                ))
                .execute(conn)?;
            Ok(Upserted { id, created: false })
        }
        None => {
            let id = NewGame {
                season_id,
                home_team_id,
                away_team_id,
                game_date: raw.game_date,
                status: &status,
                home_score: raw.home_score,
                away_score: raw.away_score,
                venue: raw.venue.as_deref(),
                attendance: raw.attendance,
            }
            .insert_into(dsl::games)
            .returning(dsl::id)
            .get_result(conn)?;
            register_external_id(conn, EntityKind::Game, source, &raw.external_id, id)?;
            Ok(Upserted { id, created: true })
        }
    }
}

pub fn game_by_id(conn: &mut PgConnection, id: i64) -> QueryResult<Option<DbGame>> {
    use crate::data_schema::data::games::dsl;

    dsl::games
        .filter(dsl::id.eq(id))
        .select(DbGame::as_select())
        .first(conn)
        .optional()
}

// ------------------------------------------------------------- game bundles

/// Link spec carried alongside a game's events, by event number; resolved
/// to row ids at insert time.
#[derive(Debug, Clone)]
pub struct EventLinkSpec {
    pub from_event_number: i32,
    pub to_event_number: i32,
    pub relation: String,
}

/// Insert one game's whole stat payload. Deletes whatever the game had
/// before, so a re-sync replaces rather than accumulates. Expects to run
/// inside the caller's per-game transaction; PBP events are inserted in
/// `event_number` order.
pub fn insert_game_bundle(
    conn: &mut PgConnection,
    game_id: i64,
    player_stats: &[NewPlayerGameStats],
    team_stats: &[NewTeamGameStats],
    events: &[NewPbpEvent],
    links: &[EventLinkSpec],
) -> Result<(), StoreError> {
    use crate::data_schema::data::pbp_event_links::dsl as links_dsl;
    use crate::data_schema::data::pbp_events::dsl as events_dsl;
    use crate::data_schema::data::player_game_stats::dsl as pgs_dsl;
    use crate::data_schema::data::team_game_stats::dsl as tgs_dsl;

    diesel::delete(links_dsl::pbp_event_links.filter(links_dsl::game_id.eq(game_id)))
        .execute(conn)?;
    diesel::delete(events_dsl::pbp_events.filter(events_dsl::game_id.eq(game_id)))
        .execute(conn)?;
    diesel::delete(pgs_dsl::player_game_stats.filter(pgs_dsl::game_id.eq(game_id)))
        .execute(conn)?;
    diesel::delete(tgs_dsl::team_game_stats.filter(tgs_dsl::game_id.eq(game_id)))
        .execute(conn)?;

    diesel::insert_into(pgs_dsl::player_game_stats)
        .values(player_stats)
        .execute(conn)?;
    diesel::insert_into(tgs_dsl::team_game_stats)
        .values(team_stats)
        .execute(conn)?;

    debug_assert!(
        events.windows(2).all(|w| w[0].event_number < w[1].event_number),
        "PBP events must arrive in strictly increasing event_number order",
    );
    let event_ids: Vec<i64> = diesel::insert_into(events_dsl::pbp_events)
        .values(events)
        .returning(events_dsl::id)
        .get_results(conn)?;

    let id_by_number: HashMap<i32, i64> = events
        .iter()
        .map(|event| event.event_number)
        .zip(event_ids)
        .collect();
    let link_rows = links
        .iter()
        .filter_map(|link| {
            let from = id_by_number.get(&link.from_event_number)?;
            let to = id_by_number.get(&link.to_event_number)?;
            Some(NewPbpEventLink {
                game_id,
                from_event_id: *from,
                to_event_id: *to,
                relation: &link.relation,
            })
        })
        .collect_vec();
    if link_rows.len() != links.len() {
        debug!(
            "game {game_id}: dropped {} event link(s) referencing unknown event numbers",
            links.len() - link_rows.len(),
        );
    }
    diesel::insert_into(links_dsl::pbp_event_links)
        .values(&link_rows)
        .execute(conn)?;

    Ok(())
}

pub fn pbp_events_for_game(
    conn: &mut PgConnection,
    game_id: i64,
) -> QueryResult<Vec<DbPbpEvent>> {
    use crate::data_schema::data::pbp_events::dsl;

    dsl::pbp_events
        .filter(dsl::game_id.eq(game_id))
        .order_by(dsl::event_number)
        .select(DbPbpEvent::as_select())
        .load(conn)
}

pub fn links_for_game(
    conn: &mut PgConnection,
    game_id: i64,
) -> QueryResult<Vec<DbPbpEventLink>> {
    use crate::data_schema::data::pbp_event_links::dsl;

    dsl::pbp_event_links
        .filter(dsl::game_id.eq(game_id))
        .order_by(dsl::id)
        .select(DbPbpEventLink::as_select())
        .load(conn)
}

pub fn player_game_stats_for_game(
    conn: &mut PgConnection,
    game_id: i64,
) -> QueryResult<Vec<DbPlayerGameStats>> {
    use crate::data_schema::data::player_game_stats::dsl;

    dsl::player_game_stats
        .filter(dsl::game_id.eq(game_id))
        .order_by(dsl::player_id)
        .select(DbPlayerGameStats::as_select())
        .load(conn)
}

pub fn team_game_stats_for_game(
    conn: &mut PgConnection,
    game_id: i64,
) -> QueryResult<Vec<DbTeamGameStats>> {
    use crate::data_schema::data::team_game_stats::dsl;

    dsl::team_game_stats
        .filter(dsl::game_id.eq(game_id))
        .order_by(dsl::team_id)
        .select(DbTeamGameStats::as_select())
        .load(conn)
}

// ------------------------------------------------------------------- merges

/// Retarget every foreign key from `loser_id` to `winner_id`, union the
/// external id maps, and delete the loser, all in one transaction. Derived
/// season stats for the loser are dropped; the aggregator recomputes them.
pub fn merge_players(
    conn: &mut PgConnection,
    winner_id: i64,
    loser_id: i64,
) -> Result<(), StoreError> {
    use crate::data_schema::data::external_ids::dsl as ext_dsl;
    use crate::data_schema::data::pbp_events::dsl as events_dsl;
    use crate::data_schema::data::player_game_stats::dsl as pgs_dsl;
    use crate::data_schema::data::player_season_stats::dsl as pss_dsl;
    use crate::data_schema::data::player_team_history::dsl as history_dsl;
    use crate::data_schema::data::players::dsl as players_dsl;

    if winner_id == loser_id {
        return Ok(());
    }

    conn.transaction(|conn| {
        let loser_ids: Vec<DbExternalId> = ext_dsl::external_ids
            .filter(ext_dsl::entity_type.eq(EntityKind::Player.as_str()))
            .filter(ext_dsl::entity_id.eq(loser_id))
            .select(DbExternalId::as_select())
            .load(conn)?;
        for row in &loser_ids {
            let winner_existing: Option<String> = ext_dsl::external_ids
                .filter(ext_dsl::entity_type.eq(EntityKind::Player.as_str()))
                .filter(ext_dsl::source.eq(&row.source))
                .filter(ext_dsl::entity_id.eq(winner_id))
                .select(ext_dsl::external_id)
                .first(conn)
                .optional()?;
            if let Some(existing) = winner_existing {
                if existing != row.external_id {
                    return Err(StoreError::IdentityConflict {
                        entity_type: EntityKind::Player.as_str(),
                        source_name: row.source.clone(),
                        canonical_id: winner_id,
                        existing,
                        incoming: row.external_id.clone(),
                    });
                }
                diesel::delete(ext_dsl::external_ids.filter(ext_dsl::id.eq(row.id)))
                    .execute(conn)?;
            } else {
                diesel::update(ext_dsl::external_ids.filter(ext_dsl::id.eq(row.id)))
                    .set(ext_dsl::entity_id.eq(winner_id))
                    .execute(conn)?;
            }
        }

        diesel::update(pgs_dsl::player_game_stats.filter(pgs_dsl::player_id.eq(loser_id)))
            .set(pgs_dsl::player_id.eq(winner_id))
            .execute(conn)?;

        // History rows the winner already has become duplicates.
        let winner_triples: Vec<(i64, i64)> = history_dsl::player_team_history
            .filter(history_dsl::player_id.eq(winner_id))
            .select((history_dsl::team_id, history_dsl::season_id))
            .load(conn)?;
        let loser_history: Vec<DbPlayerTeamHistory> = history_dsl::player_team_history
            .filter(history_dsl::player_id.eq(loser_id))
            .select(DbPlayerTeamHistory::as_select())
            .load(conn)?;
        for entry in loser_history {
            if winner_triples.contains(&(entry.team_id, entry.season_id)) {
                diesel::delete(
                    history_dsl::player_team_history.filter(history_dsl::id.eq(entry.id)),
                )
                .execute(conn)?;
            } else {
                diesel::update(
                    history_dsl::player_team_history.filter(history_dsl::id.eq(entry.id)),
                )
                .set(history_dsl::player_id.eq(winner_id))
                .execute(conn)?;
            }
        }

        diesel::delete(pss_dsl::player_season_stats.filter(pss_dsl::player_id.eq(loser_id)))
            .execute(conn)?;
        diesel::delete(pss_dsl::player_season_stats.filter(pss_dsl::player_id.eq(winner_id)))
            .execute(conn)?;

        diesel::update(events_dsl::pbp_events.filter(events_dsl::player_id.eq(loser_id)))
            .set(events_dsl::player_id.eq(winner_id))
            .execute(conn)?;

        // Substitution attributes carry canonical ids as JSON strings.
        for attribute in ["player_in_id", "player_out_id"] {
            sql_query(format!(
                "update data.pbp_events \
                 set attributes = jsonb_set(attributes, '{{{attribute}}}', to_jsonb($1::text)) \
                 where attributes->>'{attribute}' = $2",
            ))
            .bind::<Text, _>(winner_id.to_string())
            .bind::<Text, _>(loser_id.to_string())
            .execute(conn)?;
        }

        diesel::delete(players_dsl::players.filter(players_dsl::id.eq(loser_id)))
            .execute(conn)?;
        Ok(())
    })
}

/// Team analogue of [`merge_players`].
pub fn merge_teams(
    conn: &mut PgConnection,
    winner_id: i64,
    loser_id: i64,
) -> Result<(), StoreError> {
    use crate::data_schema::data::external_ids::dsl as ext_dsl;
    use crate::data_schema::data::games::dsl as games_dsl;
    use crate::data_schema::data::pbp_events::dsl as events_dsl;
    use crate::data_schema::data::player_game_stats::dsl as pgs_dsl;
    use crate::data_schema::data::player_season_stats::dsl as pss_dsl;
    use crate::data_schema::data::player_team_history::dsl as history_dsl;
    use crate::data_schema::data::team_game_stats::dsl as tgs_dsl;
    use crate::data_schema::data::team_seasons::dsl as ts_dsl;
    use crate::data_schema::data::teams::dsl as teams_dsl;

    if winner_id == loser_id {
        return Ok(());
    }

    conn.transaction(|conn| {
        let loser_ids: Vec<DbExternalId> = ext_dsl::external_ids
            .filter(ext_dsl::entity_type.eq(EntityKind::Team.as_str()))
            .filter(ext_dsl::entity_id.eq(loser_id))
            .select(DbExternalId::as_select())
            .load(conn)?;
        for row in &loser_ids {
            let winner_existing: Option<String> = ext_dsl::external_ids
                .filter(ext_dsl::entity_type.eq(EntityKind::Team.as_str()))
                .filter(ext_dsl::source.eq(&row.source))
                .filter(ext_dsl::entity_id.eq(winner_id))
                .select(ext_dsl::external_id)
                .first(conn)
                .optional()?;
            if let Some(existing) = winner_existing {
                if existing != row.external_id {
                    return Err(StoreError::IdentityConflict {
                        entity_type: EntityKind::Team.as_str(),
                        source_name: row.source.clone(),
                        canonical_id: winner_id,
                        existing,
                        incoming: row.external_id.clone(),
                    });
                }
                diesel::delete(ext_dsl::external_ids.filter(ext_dsl::id.eq(row.id)))
                    .execute(conn)?;
            } else {
                diesel::update(ext_dsl::external_ids.filter(ext_dsl::id.eq(row.id)))
                    .set(ext_dsl::entity_id.eq(winner_id))
                    .execute(conn)?;
            }
        }

        let winner_seasons: Vec<i64> = ts_dsl::team_seasons
            .filter(ts_dsl::team_id.eq(winner_id))
            .select(ts_dsl::season_id)
            .load(conn)?;
        diesel::delete(
            ts_dsl::team_seasons
                .filter(ts_dsl::team_id.eq(loser_id))
                .filter(ts_dsl::season_id.eq_any(&winner_seasons)),
        )
        .execute(conn)?;
        diesel::update(ts_dsl::team_seasons.filter(ts_dsl::team_id.eq(loser_id)))
            .set(ts_dsl::team_id.eq(winner_id))
            .execute(conn)?;

        let winner_triples: Vec<(i64, i64)> = history_dsl::player_team_history
            .filter(history_dsl::team_id.eq(winner_id))
            .select((history_dsl::player_id, history_dsl::season_id))
            .load(conn)?;
        let loser_history: Vec<DbPlayerTeamHistory> = history_dsl::player_team_history
            .filter(history_dsl::team_id.eq(loser_id))
            .select(DbPlayerTeamHistory::as_select())
            .load(conn)?;
        for entry in loser_history {
            if winner_triples.contains(&(entry.player_id, entry.season_id)) {
                diesel::delete(
                    history_dsl::player_team_history.filter(history_dsl::id.eq(entry.id)),
                )
                .execute(conn)?;
            } else {
                diesel::update(
                    history_dsl::player_team_history.filter(history_dsl::id.eq(entry.id)),
                )
                .set(history_dsl::team_id.eq(winner_id))
                .execute(conn)?;
            }
        }

        diesel::update(games_dsl::games.filter(games_dsl::home_team_id.eq(loser_id)))
            .set(games_dsl::home_team_id.eq(winner_id))
            .execute(conn)?;
        diesel::update(games_dsl::games.filter(games_dsl::away_team_id.eq(loser_id)))
            .set(games_dsl::away_team_id.eq(winner_id))
            .execute(conn)?;

        diesel::update(pgs_dsl::player_game_stats.filter(pgs_dsl::team_id.eq(loser_id)))
            .set(pgs_dsl::team_id.eq(winner_id))
            .execute(conn)?;
        diesel::update(tgs_dsl::team_game_stats.filter(tgs_dsl::team_id.eq(loser_id)))
            .set(tgs_dsl::team_id.eq(winner_id))
            .execute(conn)?;
        diesel::update(events_dsl::pbp_events.filter(events_dsl::team_id.eq(loser_id)))
            .set(events_dsl::team_id.eq(winner_id))
            .execute(conn)?;
        diesel::delete(pss_dsl::player_season_stats.filter(pss_dsl::team_id.eq(loser_id)))
            .execute(conn)?;

        diesel::delete(teams_dsl::teams.filter(teams_dsl::id.eq(loser_id))).execute(conn)?;
        Ok(())
    })
}

// ------------------------------------------------------------- season stats

/// A player's game stat rows in one season, paired with the game rows, for
/// opponent/home/away splits.
pub fn player_game_rows_with_games(
    conn: &mut PgConnection,
    player_id: i64,
    season_id: i64,
) -> QueryResult<Vec<(DbPlayerGameStats, DbGame)>> {
    use crate::data_schema::data::games::dsl as games_dsl;
    use crate::data_schema::data::player_game_stats::dsl as pgs_dsl;

    pgs_dsl::player_game_stats
        .inner_join(games_dsl::games)
        .filter(pgs_dsl::player_id.eq(player_id))
        .filter(games_dsl::season_id.eq(season_id))
        .order_by(pgs_dsl::game_id)
        .select((DbPlayerGameStats::as_select(), DbGame::as_select()))
        .load(conn)
}

pub fn player_game_rows_for_tuple(
    conn: &mut PgConnection,
    player_id: i64,
    team_id: i64,
    season_id: i64,
) -> QueryResult<Vec<DbPlayerGameStats>> {
    use crate::data_schema::data::games::dsl as games_dsl;
    use crate::data_schema::data::player_game_stats::dsl as pgs_dsl;

    pgs_dsl::player_game_stats
        .inner_join(games_dsl::games)
        .filter(pgs_dsl::player_id.eq(player_id))
        .filter(pgs_dsl::team_id.eq(team_id))
        .filter(games_dsl::season_id.eq(season_id))
        .order_by(pgs_dsl::game_id)
        .select(DbPlayerGameStats::as_select())
        .load(conn)
}

/// Replace the derived season row for one `(player, team, season)` tuple.
pub fn replace_player_season_stats(
    conn: &mut PgConnection,
    row: &NewPlayerSeasonStats,
) -> QueryResult<()> {
    use crate::data_schema::data::player_season_stats::dsl;

    conn.transaction(|conn| {
        diesel::delete(
            dsl::player_season_stats
                .filter(dsl::player_id.eq(row.player_id))
                .filter(dsl::team_id.eq(row.team_id))
                .filter(dsl::season_id.eq(row.season_id)),
        )
        .execute(conn)?;
        row.insert_into(dsl::player_season_stats).execute(conn)?;
        Ok(())
    })
}

pub fn player_season_stats_for_tuple(
    conn: &mut PgConnection,
    player_id: i64,
    team_id: i64,
    season_id: i64,
) -> QueryResult<Option<DbPlayerSeasonStats>> {
    use crate::data_schema::data::player_season_stats::dsl;

    dsl::player_season_stats
        .filter(dsl::player_id.eq(player_id))
        .filter(dsl::team_id.eq(team_id))
        .filter(dsl::season_id.eq(season_id))
        .select(DbPlayerSeasonStats::as_select())
        .first(conn)
        .optional()
}

pub fn season_stats_rows(
    conn: &mut PgConnection,
    season_id: i64,
    min_games: i32,
) -> QueryResult<Vec<DbPlayerSeasonStats>> {
    use crate::data_schema::data::player_season_stats::dsl;

    dsl::player_season_stats
        .filter(dsl::season_id.eq(season_id))
        .filter(dsl::games_played.ge(min_games))
        .order_by(dsl::player_id)
        .select(DbPlayerSeasonStats::as_select())
        .load(conn)
}

/// Distinct `(team_id, season_id)` tuples a player has game stats on.
pub fn tuples_for_player(
    conn: &mut PgConnection,
    player_id: i64,
) -> QueryResult<Vec<(i64, i64)>> {
    use crate::data_schema::data::games::dsl as games_dsl;
    use crate::data_schema::data::player_game_stats::dsl as pgs_dsl;

    pgs_dsl::player_game_stats
        .inner_join(games_dsl::games)
        .filter(pgs_dsl::player_id.eq(player_id))
        .select((pgs_dsl::team_id, games_dsl::season_id))
        .distinct()
        .load(conn)
}

/// Distinct `(player_id, team_id)` tuples with game stats in a season.
pub fn tuples_for_season(
    conn: &mut PgConnection,
    season_id: i64,
) -> QueryResult<Vec<(i64, i64)>> {
    use crate::data_schema::data::games::dsl as games_dsl;
    use crate::data_schema::data::player_game_stats::dsl as pgs_dsl;

    pgs_dsl::player_game_stats
        .inner_join(games_dsl::games)
        .filter(games_dsl::season_id.eq(season_id))
        .select((pgs_dsl::player_id, pgs_dsl::team_id))
        .distinct()
        .load(conn)
}

// -------------------------------------------------------------------- lists

pub fn players_list(
    conn: &mut PgConnection,
    search: Option<&str>,
    page: i64,
    per_page: i64,
) -> QueryResult<(Vec<DbPlayer>, i64)> {
    use crate::data_schema::data::players::dsl;

    let pattern = search.map(|raw| format!("%{}%", fold_name(raw)));

    let mut count_query = dsl::players.into_boxed();
    let mut page_query = dsl::players.into_boxed();
    if let Some(pattern) = &pattern {
        count_query = count_query.filter(dsl::name_key.like(pattern.clone()));
        page_query = page_query.filter(dsl::name_key.like(pattern.clone()));
    }

    let total: i64 = count_query.count().get_result(conn)?;
    let items = page_query
        .order_by(dsl::id)
        .offset(page.max(0) * per_page)
        .limit(per_page)
        .select(DbPlayer::as_select())
        .load(conn)?;
    Ok((items, total))
}

pub fn teams_list(
    conn: &mut PgConnection,
    search: Option<&str>,
    page: i64,
    per_page: i64,
) -> QueryResult<(Vec<DbTeam>, i64)> {
    use crate::data_schema::data::teams::dsl;

    let pattern = search.map(|raw| format!("%{}%", fold_name(raw)));

    let mut count_query = dsl::teams.into_boxed();
    let mut page_query = dsl::teams.into_boxed();
    if let Some(pattern) = &pattern {
        count_query = count_query.filter(dsl::name_key.like(pattern.clone()));
        page_query = page_query.filter(dsl::name_key.like(pattern.clone()));
    }

    let total: i64 = count_query.count().get_result(conn)?;
    let items = page_query
        .order_by(dsl::id)
        .offset(page.max(0) * per_page)
        .limit(per_page)
        .select(DbTeam::as_select())
        .load(conn)?;
    Ok((items, total))
}

pub fn games_list(
    conn: &mut PgConnection,
    season_id: Option<i64>,
    team_id: Option<i64>,
    page: i64,
    per_page: i64,
) -> QueryResult<(Vec<DbGame>, i64)> {
    use crate::data_schema::data::games::dsl;

    let build = || {
        let mut query = dsl::games.into_boxed();
        if let Some(season_id) = season_id {
            query = query.filter(dsl::season_id.eq(season_id));
        }
        if let Some(team_id) = team_id {
            query = query.filter(
                dsl::home_team_id.eq(team_id).or(dsl::away_team_id.eq(team_id)),
            );
        }
        query
    };

    let total: i64 = build().count().get_result(conn)?;
    let items = build()
        .order_by((dsl::game_date, dsl::id))
        .offset(page.max(0) * per_page)
        .limit(per_page)
        .select(DbGame::as_select())
        .load(conn)?;
    Ok((items, total))
}

// ---------------------------------------------------------------- sync logs

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub processed: i32,
    pub created: i32,
    pub updated: i32,
    pub skipped: i32,
}

pub fn start_sync_log(
    conn: &mut PgConnection,
    source: &str,
    entity_type: &str,
    season_id: Option<i64>,
    game_id: Option<i64>,
    at: DateTime<Utc>,
) -> QueryResult<i64> {
    use crate::info_schema::info::sync_logs::dsl;

    NewSyncLog {
        source,
        entity_type,
        status: "STARTED",
        season_id,
        game_id,
        started_at: at.naive_utc(),
    }
    .insert_into(dsl::sync_logs)
    .returning(dsl::id)
    .get_result(conn)
}

/// Move a STARTED log to its terminal status. Only terminal transitions are
/// allowed, and only once.
pub fn finish_sync_log(
    conn: &mut PgConnection,
    log_id: i64,
    status: SyncStatus,
    counts: SyncCounts,
    error_message: Option<&str>,
    error_details: Option<serde_json::Value>,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    use crate::info_schema::info::sync_logs::dsl;

    if !status.is_terminal() {
        return Err(StoreError::InvalidSyncTransition { log_id, status });
    }

    let updated = diesel::update(
        dsl::sync_logs
            .filter(dsl::id.eq(log_id))
            .filter(dsl::status.eq("STARTED")),
    )
    .set((
        dsl::status.eq(status.to_string()),
        dsl::records_processed.eq(counts.processed),
        dsl::records_created.eq(counts.created),
        dsl::records_updated.eq(counts.updated),
        dsl::records_skipped.eq(counts.skipped),
        dsl::error_message.eq(error_message),
        dsl::error_details.eq(error_details),
        dsl::completed_at.eq(at.naive_utc()),
    ))
    .execute(conn)?;

    if updated == 0 {
        return Err(StoreError::SyncLogAlreadyTerminal(log_id));
    }
    Ok(())
}

/// Attach the canonical game id to a log started before the game row
/// existed (the single-game workflow).
pub fn attach_sync_log_game(
    conn: &mut PgConnection,
    log_id: i64,
    game_id: i64,
) -> QueryResult<()> {
    use crate::info_schema::info::sync_logs::dsl;

    diesel::update(dsl::sync_logs.filter(dsl::id.eq(log_id)))
        .set(dsl::game_id.eq(game_id))
        .execute(conn)
        .map(|_| ())
}

/// Likewise for the season, resolved after the log starts.
pub fn attach_sync_log_season(
    conn: &mut PgConnection,
    log_id: i64,
    season_id: i64,
) -> QueryResult<()> {
    use crate::info_schema::info::sync_logs::dsl;

    diesel::update(dsl::sync_logs.filter(dsl::id.eq(log_id)))
        .set(dsl::season_id.eq(season_id))
        .execute(conn)
        .map(|_| ())
}

pub fn sync_log_by_id(conn: &mut PgConnection, log_id: i64) -> QueryResult<Option<DbSyncLog>> {
    use crate::info_schema::info::sync_logs::dsl;

    dsl::sync_logs
        .filter(dsl::id.eq(log_id))
        .select(DbSyncLog::as_select())
        .first(conn)
        .optional()
}

#[derive(Debug, Default, Clone)]
pub struct SyncLogFilter<'a> {
    pub source: Option<&'a str>,
    pub entity_type: Option<&'a str>,
    pub status: Option<&'a str>,
}

pub fn sync_logs_list(
    conn: &mut PgConnection,
    filter: &SyncLogFilter,
    page: i64,
    per_page: i64,
) -> QueryResult<(Vec<DbSyncLog>, i64)> {
    use crate::info_schema::info::sync_logs::dsl;

    let build = || {
        let mut query = dsl::sync_logs.into_boxed();
        if let Some(source) = filter.source {
            query = query.filter(dsl::source.eq(source));
        }
        if let Some(entity_type) = filter.entity_type {
            query = query.filter(dsl::entity_type.eq(entity_type));
        }
        if let Some(status) = filter.status {
            query = query.filter(dsl::status.eq(status));
        }
        query
    };

    let total: i64 = build().count().get_result(conn)?;
    let items = build()
        .order_by((dsl::started_at.desc(), dsl::id.desc()))
        .offset(page.max(0) * per_page)
        .limit(per_page)
        .select(DbSyncLog::as_select())
        .load(conn)?;
    Ok((items, total))
}

pub fn latest_sync_log(
    conn: &mut PgConnection,
    source: &str,
    entity_type: &str,
) -> QueryResult<Option<DbSyncLog>> {
    use crate::info_schema::info::sync_logs::dsl;

    dsl::sync_logs
        .filter(dsl::source.eq(source))
        .filter(dsl::entity_type.eq(entity_type))
        .order_by((dsl::started_at.desc(), dsl::id.desc()))
        .select(DbSyncLog::as_select())
        .first(conn)
        .optional()
}

/// Latest whole-season game sync (a game-entity log with no specific game
/// attached).
pub fn latest_season_sync_log(
    conn: &mut PgConnection,
    source: &str,
) -> QueryResult<Option<DbSyncLog>> {
    use crate::info_schema::info::sync_logs::dsl;

    dsl::sync_logs
        .filter(dsl::source.eq(source))
        .filter(dsl::entity_type.eq("game"))
        .filter(dsl::game_id.is_null())
        .order_by((dsl::started_at.desc(), dsl::id.desc()))
        .select(DbSyncLog::as_select())
        .first(conn)
        .optional()
}

/// Latest single-game sync.
pub fn latest_game_sync_log(
    conn: &mut PgConnection,
    source: &str,
) -> QueryResult<Option<DbSyncLog>> {
    use crate::info_schema::info::sync_logs::dsl;

    dsl::sync_logs
        .filter(dsl::source.eq(source))
        .filter(dsl::entity_type.eq("game"))
        .filter(dsl::game_id.is_not_null())
        .order_by((dsl::started_at.desc(), dsl::id.desc()))
        .select(DbSyncLog::as_select())
        .first(conn)
        .optional()
}

pub fn running_sync_count(conn: &mut PgConnection, source: &str) -> QueryResult<i64> {
    use crate::info_schema::info::sync_logs::dsl;

    dsl::sync_logs
        .filter(dsl::source.eq(source))
        .filter(dsl::status.eq("STARTED"))
        .count()
        .get_result(conn)
}

/// Transaction soft deadline, enforced server-side.
pub fn set_statement_timeout(
    conn: &mut PgConnection,
    timeout_seconds: i64,
) -> QueryResult<usize> {
    // `set` cannot be parameterized; the value is an i64 so the formatted
    // string cannot break out of the statement.
    sql_query(format!("set statement_timeout = '{}s'", timeout_seconds)).execute(conn)
}
