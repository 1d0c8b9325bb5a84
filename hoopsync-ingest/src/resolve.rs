//! Cross-source entity resolution: map a `(source, external_id, payload)`
//! sighting of a team or player onto its canonical row, creating one when
//! no tier matches. External-id maps only ever grow; a contradictory id for
//! a source already present is a hard identity error.

use hoopsync_db::db::{self, EntityKind, StoreError};
use hoopsync_db::models::{DbPlayer, DbTeam, NewPlayer, NewTeam};
use hoopsync_db::PgConnection;
use log::{debug, info};
use providers::normalize::fold_name;
use providers::raw::{RawPlayer, RawTeam};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub id: i64,
    pub created: bool,
    /// Set when the resolution was noteworthy (e.g. an ambiguous
    /// biographical match that refused to merge); recorded on the sync log.
    pub note: Option<String>,
}

impl Resolved {
    fn plain(id: i64, created: bool) -> Self {
        Self {
            id,
            created,
            note: None,
        }
    }
}

/// Cross-source ids some providers embed in their own payloads
/// (`extra["external_ids"] = {source: id}`). Registering them surfaces
/// merge conflicts at resolution time instead of at a later sync.
fn register_embedded_ids(
    conn: &mut PgConnection,
    kind: EntityKind,
    extra: &serde_json::Map<String, serde_json::Value>,
    entity_id: i64,
) -> Result<(), StoreError> {
    let Some(map) = extra.get("external_ids").and_then(|v| v.as_object()) else {
        return Ok(());
    };
    for (source, id) in map {
        if let Some(id) = id.as_str() {
            db::register_external_id(conn, kind, source, id, entity_id)?;
        }
    }
    Ok(())
}

/// Resolve a team sighting: external id, then unambiguous normalized name,
/// then create.
pub fn resolve_team(
    conn: &mut PgConnection,
    source: &str,
    raw: &RawTeam,
) -> Result<Resolved, StoreError> {
    let name_key = fold_name(&raw.name);

    if let Some(id) = db::lookup_external_id(conn, EntityKind::Team, source, &raw.external_id)? {
        let team = db::team_by_id(conn, id)?.ok_or(diesel_not_found())?;
        refresh_team(conn, &team, raw, &name_key)?;
        return Ok(Resolved::plain(id, false));
    }

    let candidates = db::teams_by_name_key(conn, &name_key)?;
    if let [team] = candidates.as_slice() {
        debug!(
            "team {:?} from {source} matched canonical team {} by name",
            raw.name, team.id,
        );
        db::register_external_id(conn, EntityKind::Team, source, &raw.external_id, team.id)?;
        refresh_team(conn, &team.clone(), raw, &name_key)?;
        return Ok(Resolved::plain(team.id, false));
    }

    let id = db::insert_team(
        conn,
        &NewTeam {
            name: &raw.name,
            name_key: &name_key,
            short_name: raw.short_name.as_deref(),
            city: raw.city.as_deref(),
            country: raw.country.as_deref(),
        },
    )?;
    db::register_external_id(conn, EntityKind::Team, source, &raw.external_id, id)?;
    info!("created team {id} for {source}:{} ({:?})", raw.external_id, raw.name);
    let note = (candidates.len() > 1).then(|| {
        format!(
            "name {:?} matched {} existing teams; created a new row instead of merging",
            raw.name,
            candidates.len(),
        )
    });
    Ok(Resolved {
        id,
        created: true,
        note,
    })
}

fn refresh_team(
    conn: &mut PgConnection,
    team: &DbTeam,
    raw: &RawTeam,
    name_key: &str,
) -> Result<(), StoreError> {
    // A provisional row (created from a bare external id on a game sync)
    // gets its real name on the first sighting that carries one.
    if team.name_key != name_key && is_provisional_name(&team.name) {
        db::rename_team(conn, team.id, &raw.name, name_key)?;
    }
    db::fill_team_fields(
        conn,
        team,
        raw.short_name.as_deref(),
        raw.city.as_deref(),
        raw.country.as_deref(),
    )?;
    Ok(())
}

/// Resolve a team referenced only by external id (game sync before any
/// teams sync). Creates a provisional row when unknown.
pub fn resolve_team_ref(
    conn: &mut PgConnection,
    source: &str,
    external_id: &str,
) -> Result<Resolved, StoreError> {
    if let Some(id) = db::lookup_external_id(conn, EntityKind::Team, source, external_id)? {
        return Ok(Resolved::plain(id, false));
    }
    let provisional = provisional_team_name(source, external_id);
    let id = db::insert_team(
        conn,
        &NewTeam {
            name: &provisional,
            name_key: &fold_name(&provisional),
            short_name: None,
            city: None,
            country: None,
        },
    )?;
    db::register_external_id(conn, EntityKind::Team, source, external_id, id)?;
    info!("created provisional team {id} for {source}:{external_id}");
    Ok(Resolved::plain(id, true))
}

fn provisional_team_name(source: &str, external_id: &str) -> String {
    format!("{source} team {external_id}")
}

fn is_provisional_name(name: &str) -> bool {
    name.split_whitespace().nth(1) == Some("team")
        && providers::config::SOURCE_NAMES
            .iter()
            .any(|source| name.starts_with(source))
}

/// True when two player records plausibly describe the same person:
/// identical birth date, or heights within two centimeters. A candidate
/// with neither field populated is never accepted.
pub fn bio_compatible(candidate: &DbPlayer, raw: &RawPlayer) -> bool {
    if let (Some(a), Some(b)) = (candidate.birth_date, raw.birth_date) {
        if a == b {
            return true;
        }
    }
    if let (Some(a), Some(b)) = (candidate.height_cm, raw.height_cm) {
        if (a - b).abs() <= 2 {
            return true;
        }
    }
    false
}

/// Resolve a player sighting tier by tier: external id, roster-scoped
/// name, global name plus biographical check, then create. Ambiguity never
/// auto-merges.
pub fn resolve_player(
    conn: &mut PgConnection,
    source: &str,
    raw: &RawPlayer,
    team_id: Option<i64>,
) -> Result<Resolved, StoreError> {
    let name_key = fold_name(&raw.full_name());

    if let Some(id) = db::lookup_external_id(conn, EntityKind::Player, source, &raw.external_id)? {
        let player = db::player_by_id(conn, id)?.ok_or(diesel_not_found())?;
        db::fill_player_bio(conn, &player, raw)?;
        register_embedded_ids(conn, EntityKind::Player, &raw.extra, id)?;
        return Ok(Resolved::plain(id, false));
    }

    if let Some(team_id) = team_id {
        let roster_matches = db::roster_players_by_name_key(conn, team_id, &name_key)?;
        if let [player] = roster_matches.as_slice() {
            debug!(
                "player {:?} from {source} matched canonical player {} on the team roster",
                raw.full_name(),
                player.id,
            );
            db::register_external_id(
                conn,
                EntityKind::Player,
                source,
                &raw.external_id,
                player.id,
            )?;
            db::fill_player_bio(conn, player, raw)?;
            register_embedded_ids(conn, EntityKind::Player, &raw.extra, player.id)?;
            return Ok(Resolved::plain(player.id, false));
        }
    }

    let global_matches = db::players_by_name_key(conn, &name_key)?;
    let compatible: Vec<&DbPlayer> = global_matches
        .iter()
        .filter(|candidate| bio_compatible(candidate, raw))
        .collect();
    match compatible.as_slice() {
        [player] => {
            debug!(
                "player {:?} from {source} matched canonical player {} biographically",
                raw.full_name(),
                player.id,
            );
            db::register_external_id(
                conn,
                EntityKind::Player,
                source,
                &raw.external_id,
                player.id,
            )?;
            db::fill_player_bio(conn, player, raw)?;
            register_embedded_ids(conn, EntityKind::Player, &raw.extra, player.id)?;
            Ok(Resolved::plain(player.id, false))
        }
        [] => {
            let id = create_player(conn, source, raw, &name_key)?;
            Ok(Resolved::plain(id, true))
        }
        several => {
            // Multiple plausible people with this name: do not guess.
            let candidate_ids: Vec<i64> = several.iter().map(|p| p.id).collect();
            let id = create_player(conn, source, raw, &name_key)?;
            Ok(Resolved {
                id,
                created: true,
                note: Some(format!(
                    "biographical match for {:?} was ambiguous (candidates {candidate_ids:?}); \
                    created a new player instead of merging",
                    raw.full_name(),
                )),
            })
        }
    }
}

fn create_player(
    conn: &mut PgConnection,
    source: &str,
    raw: &RawPlayer,
    name_key: &str,
) -> Result<i64, StoreError> {
    let positions = raw
        .positions
        .iter()
        .map(|position| Some(position.to_string()))
        .collect();
    let id = db::insert_player(
        conn,
        &NewPlayer {
            first_name: &raw.first_name,
            last_name: &raw.last_name,
            name_key,
            birth_date: raw.birth_date,
            nationality: raw.nationality.as_deref(),
            height_cm: raw.height_cm,
            positions,
        },
    )?;
    db::register_external_id(conn, EntityKind::Player, source, &raw.external_id, id)?;
    register_embedded_ids(conn, EntityKind::Player, &raw.extra, id)?;
    info!(
        "created player {id} for {source}:{} ({:?})",
        raw.external_id,
        raw.full_name(),
    );
    Ok(id)
}

fn diesel_not_found() -> StoreError {
    StoreError::Query(diesel::result::Error::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::Map;

    fn db_player(id: i64, birth: Option<&str>, height: Option<i32>) -> DbPlayer {
        DbPlayer {
            id,
            first_name: "Scottie".to_string(),
            last_name: "Wilbekin".to_string(),
            name_key: "scottie wilbekin".to_string(),
            birth_date: birth.map(|b| b.parse().unwrap()),
            nationality: None,
            height_cm: height,
            positions: vec![],
        }
    }

    fn raw_player(birth: Option<&str>, height: Option<i32>) -> RawPlayer {
        RawPlayer {
            external_id: "PWB".to_string(),
            first_name: "Scottie".to_string(),
            last_name: "Wilbekin".to_string(),
            birth_date: birth.map(|b| b.parse::<NaiveDate>().unwrap()),
            nationality: None,
            height_cm: height,
            positions: vec![],
            jersey_number: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn exact_birth_date_is_compatible() {
        let candidate = db_player(1, Some("1993-07-19"), None);
        assert!(bio_compatible(&candidate, &raw_player(Some("1993-07-19"), None)));
        assert!(!bio_compatible(&candidate, &raw_player(Some("1993-07-20"), None)));
    }

    #[test]
    fn height_within_two_centimeters_is_compatible() {
        let candidate = db_player(1, None, Some(185));
        assert!(bio_compatible(&candidate, &raw_player(None, Some(187))));
        assert!(bio_compatible(&candidate, &raw_player(None, Some(183))));
        assert!(!bio_compatible(&candidate, &raw_player(None, Some(188))));
    }

    #[test]
    fn missing_biography_never_matches() {
        let candidate = db_player(1, None, None);
        assert!(!bio_compatible(&candidate, &raw_player(Some("1993-07-19"), Some(185))));
        assert!(!bio_compatible(
            &db_player(1, Some("1993-07-19"), Some(185)),
            &raw_player(None, None),
        ));
    }

    #[test]
    fn birth_date_mismatch_can_still_match_on_height() {
        let candidate = db_player(1, Some("1993-07-19"), Some(185));
        assert!(bio_compatible(&candidate, &raw_player(Some("1994-01-01"), Some(186))));
    }

    #[test]
    fn provisional_names_are_recognizable() {
        assert!(is_provisional_name(&provisional_team_name("winner", "10")));
        assert!(!is_provisional_name("Maccabi Tel Aviv"));
        assert!(!is_provisional_name("winner"));
    }
}
