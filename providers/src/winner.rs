//! Winner League (Ligat HaAl) adapter. The provider exposes a JSON API with
//! nested payloads; numeric enum codes throughout.

use crate::cache::ResponseCache;
use crate::config::SourceConfig;
use crate::normalize::{
    normalize_event_type, normalize_game_status, normalize_position, parse_minutes,
    split_person_name,
};
use crate::raw::{
    MapError, Mapped, RawBoxScore, RawEventLink, RawGame, RawPbpEvent, RawPlayer, RawPlayerLine,
    RawSeason, RawStatCounters, RawTeam, RawTeamLine,
};
use crate::taxa::EventType;
use crate::transport::{Channel, FetchError, Transport};
use crate::{AdapterError, SourceAdapter, Sourced};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

const SOURCE_NAME: &str = "winner";
const BASE_URL: &str = "https://stats.winner-league.co.il/api/v1";

pub struct WinnerAdapter {
    transport: Transport,
}

impl WinnerAdapter {
    pub fn new(
        config: &SourceConfig,
        cache: Option<Arc<ResponseCache>>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            transport: Transport::new(SOURCE_NAME, config, cache)?,
        })
    }
}

// ---------------------------------------------------------------- wire types

#[derive(Debug, Deserialize)]
struct WireSeasonsResponse {
    seasons: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireSeason {
    season_id: i64,
    name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    is_current: bool,
    league: WireLeague,
}

#[derive(Debug, Deserialize)]
struct WireLeague {
    code: String,
    name: String,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTeamsResponse {
    teams: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireTeam {
    team_id: i64,
    name: String,
    short_name: Option<String>,
    city: Option<String>,
    country: Option<String>,
    #[serde(default)]
    roster: Vec<WirePlayer>,
}

#[derive(Debug, Deserialize)]
struct WirePlayer {
    player_id: i64,
    name: String,
    birth_date: Option<NaiveDate>,
    nationality: Option<String>,
    height_cm: Option<i32>,
    position: Option<String>,
    jersey_number: Option<i32>,
    #[serde(default)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct WireScheduleResponse {
    games: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireGame {
    game_id: i64,
    season_id: i64,
    home_team_id: i64,
    away_team_id: i64,
    game_date: NaiveDateTime,
    status: i32,
    home_score: Option<i32>,
    away_score: Option<i32>,
    venue: Option<String>,
    attendance: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct WireBoxScore {
    game: WireGame,
    home_team: WireTeamBox,
    away_team: WireTeamBox,
}

#[derive(Debug, Deserialize)]
struct WireTeamBox {
    team_id: i64,
    totals: WireStatLine,
    team_stats: Option<WireTeamExtras>,
    players: Vec<WirePlayerLine>,
}

#[derive(Debug, Deserialize)]
struct WireTeamExtras {
    fast_break_points: Option<i32>,
    points_in_paint: Option<i32>,
    second_chance_points: Option<i32>,
    bench_points: Option<i32>,
    biggest_lead: Option<i32>,
    time_leading: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePlayerLine {
    player: WirePlayer,
    minutes: String,
    #[serde(default)]
    is_starter: bool,
    #[serde(flatten)]
    stats: WireStatLine,
    plus_minus: Option<i32>,
    efficiency: Option<i32>,
    #[serde(default)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct WireStatLine {
    points: i32,
    fgm: i32,
    fga: i32,
    fg2m: i32,
    fg2a: i32,
    fg3m: i32,
    fg3a: i32,
    ftm: i32,
    fta: i32,
    oreb: i32,
    dreb: i32,
    treb: i32,
    assists: i32,
    turnovers: i32,
    steals: i32,
    blocks: i32,
    fouls: i32,
}

#[derive(Debug, Deserialize)]
struct WirePbpResponse {
    events: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WirePbpEvent {
    seq: i32,
    quarter: i32,
    clock: String,
    action: String,
    player_id: Option<i64>,
    team_id: i64,
    success: Option<bool>,
    shot_value: Option<i32>,
    x: Option<f64>,
    y: Option<f64>,
    #[serde(default)]
    is_fast_break: Option<bool>,
    #[serde(default)]
    is_second_chance: Option<bool>,
    #[serde(default)]
    contested: Option<bool>,
    sub_in_player_id: Option<i64>,
    sub_out_player_id: Option<i64>,
    #[serde(default)]
    related: Vec<WireRelated>,
}

#[derive(Debug, Deserialize)]
struct WireRelated {
    seq: i32,
    relation: String,
}

// ------------------------------------------------------------------- mapping

fn envelope<T: serde::de::DeserializeOwned>(
    body: Value,
    entity: &'static str,
) -> Result<T, MapError> {
    serde_json::from_value(body).map_err(|err| MapError::MalformedField {
        source_name: SOURCE_NAME,
        entity,
        field: "$".to_string(),
        detail: err.to_string(),
    })
}

fn entry<T: serde::de::DeserializeOwned>(value: Value, entity: &'static str) -> Mapped<T> {
    serde_json::from_value(value).map_err(|err| MapError::MalformedField {
        source_name: SOURCE_NAME,
        entity,
        field: "$".to_string(),
        detail: err.to_string(),
    })
}

fn map_season(wire: WireSeason) -> Mapped<RawSeason> {
    if wire.start_date > wire.end_date {
        return Err(MapError::MalformedField {
            source_name: SOURCE_NAME,
            entity: "season",
            field: "start_date".to_string(),
            detail: format!("{} is after end_date {}", wire.start_date, wire.end_date),
        });
    }
    Ok(RawSeason {
        external_id: wire.season_id.to_string(),
        league_code: wire.league.code,
        league_name: wire.league.name,
        league_country: wire.league.country,
        name: wire.name,
        start_date: wire.start_date,
        end_date: wire.end_date,
        is_current: wire.is_current,
    })
}

fn map_player(wire: WirePlayer) -> Mapped<RawPlayer> {
    let (first_name, last_name) = split_person_name(&wire.name);
    let positions = match &wire.position {
        Some(raw) => normalize_position(raw, SOURCE_NAME)?,
        None => Vec::new(),
    };
    Ok(RawPlayer {
        external_id: wire.player_id.to_string(),
        first_name,
        last_name,
        birth_date: wire.birth_date,
        nationality: wire.nationality,
        height_cm: wire.height_cm,
        positions,
        jersey_number: wire.jersey_number,
        extra: wire.extra,
    })
}

fn map_team(wire: WireTeam) -> Mapped<RawTeam> {
    let roster = wire
        .roster
        .into_iter()
        .map(map_player)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawTeam {
        external_id: wire.team_id.to_string(),
        name: wire.name,
        short_name: wire.short_name,
        city: wire.city,
        country: wire.country,
        roster,
    })
}

fn map_game(wire: WireGame) -> Mapped<RawGame> {
    let status = normalize_game_status(&wire.status.to_string(), SOURCE_NAME)?;
    if wire.home_team_id == wire.away_team_id {
        return Err(MapError::MalformedField {
            source_name: SOURCE_NAME,
            entity: "game",
            field: "away_team_id".to_string(),
            detail: "home and away teams are the same".to_string(),
        });
    }
    let (home_score, away_score) = if status.has_scores() {
        let home = wire.home_score.ok_or_else(|| MapError::MissingField {
            source_name: SOURCE_NAME,
            entity: "game",
            field: "home_score".to_string(),
        })?;
        let away = wire.away_score.ok_or_else(|| MapError::MissingField {
            source_name: SOURCE_NAME,
            entity: "game",
            field: "away_score".to_string(),
        })?;
        (Some(home), Some(away))
    } else {
        (None, None)
    };
    Ok(RawGame {
        external_id: wire.game_id.to_string(),
        season_external_id: wire.season_id.to_string(),
        home_team_external_id: wire.home_team_id.to_string(),
        away_team_external_id: wire.away_team_id.to_string(),
        game_date: wire.game_date,
        status,
        home_score,
        away_score,
        venue: wire.venue,
        attendance: wire.attendance,
    })
}

fn map_counters(stats: &WireStatLine) -> RawStatCounters {
    RawStatCounters {
        points: stats.points,
        fgm: stats.fgm,
        fga: stats.fga,
        two_pm: stats.fg2m,
        two_pa: stats.fg2a,
        three_pm: stats.fg3m,
        three_pa: stats.fg3a,
        ftm: stats.ftm,
        fta: stats.fta,
        oreb: stats.oreb,
        dreb: stats.dreb,
        treb: stats.treb,
        ast: stats.assists,
        tov: stats.turnovers,
        stl: stats.steals,
        blk: stats.blocks,
        pf: stats.fouls,
    }
}

fn map_player_line(wire: WirePlayerLine, team_id: i64) -> Mapped<RawPlayerLine> {
    let seconds_played = parse_minutes(&wire.minutes, SOURCE_NAME)?;
    let counters = map_counters(&wire.stats);
    let player = map_player(wire.player)?;
    counters.validate(SOURCE_NAME, &player.external_id)?;
    Ok(RawPlayerLine {
        player,
        team_external_id: team_id.to_string(),
        seconds_played,
        is_starter: wire.is_starter,
        counters,
        plus_minus: wire.plus_minus.unwrap_or(0),
        efficiency: wire.efficiency.unwrap_or(0),
        extra: wire.extra,
    })
}

fn map_team_box(wire: WireTeamBox) -> Mapped<(RawTeamLine, Vec<RawPlayerLine>)> {
    let team_id = wire.team_id;
    let counters = map_counters(&wire.totals);
    counters.validate(SOURCE_NAME, &team_id.to_string())?;
    let seconds_leading = wire
        .team_stats
        .as_ref()
        .and_then(|extras| extras.time_leading.as_deref())
        .map(|raw| parse_minutes(raw, SOURCE_NAME))
        .transpose()?;
    let extras = wire.team_stats;
    let team_line = RawTeamLine {
        team_external_id: team_id.to_string(),
        counters,
        fast_break_points: extras.as_ref().and_then(|e| e.fast_break_points),
        points_in_paint: extras.as_ref().and_then(|e| e.points_in_paint),
        second_chance_points: extras.as_ref().and_then(|e| e.second_chance_points),
        bench_points: extras.as_ref().and_then(|e| e.bench_points),
        biggest_lead: extras.as_ref().and_then(|e| e.biggest_lead),
        seconds_leading,
        extra: Map::new(),
    };
    let player_lines = wire
        .players
        .into_iter()
        .map(|line| map_player_line(line, team_id))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((team_line, player_lines))
}

fn map_pbp_event(wire: WirePbpEvent) -> Mapped<RawPbpEvent> {
    let (event_type, event_subtype) = normalize_event_type(&wire.action, SOURCE_NAME)?;

    let mut attributes = Map::new();
    if event_type == EventType::Shot {
        let shot_value = wire.shot_value.ok_or_else(|| MapError::MissingField {
            source_name: SOURCE_NAME,
            entity: "pbp_event",
            field: "shot_value".to_string(),
        })?;
        attributes.insert("shot_value".to_string(), shot_value.into());
        if let Some(shot_type) = &event_subtype {
            attributes.insert("shot_type".to_string(), shot_type.as_str().into());
        }
        if let Some(fast_break) = wire.is_fast_break {
            attributes.insert("fast_break".to_string(), fast_break.into());
        }
        if let Some(second_chance) = wire.is_second_chance {
            attributes.insert("second_chance".to_string(), second_chance.into());
        }
        if let Some(contested) = wire.contested {
            attributes.insert("contested".to_string(), contested.into());
        }
    }
    if event_type == EventType::Substitution {
        if let Some(id) = wire.sub_in_player_id {
            attributes.insert("player_in_id".to_string(), id.to_string().into());
        }
        if let Some(id) = wire.sub_out_player_id {
            attributes.insert("player_out_id".to_string(), id.to_string().into());
        }
    }

    Ok(RawPbpEvent {
        event_number: wire.seq,
        period: wire.quarter,
        clock: wire.clock,
        event_type,
        event_subtype,
        player_external_id: wire.player_id.map(|id| id.to_string()),
        team_external_id: wire.team_id.to_string(),
        success: wire.success,
        coord_x: wire.x,
        coord_y: wire.y,
        attributes,
        links: wire
            .related
            .into_iter()
            .map(|related| RawEventLink {
                event_number: related.seq,
                relation: related.relation,
            })
            .collect(),
    })
}

// ------------------------------------------------------------------- adapter

impl SourceAdapter for WinnerAdapter {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn get_seasons(&self) -> Result<Vec<Mapped<RawSeason>>, AdapterError> {
        let url = format!("{BASE_URL}/seasons");
        let fetched = self.transport.get_json(Channel::Api, &url, &[], false).await?;
        let response: WireSeasonsResponse = envelope(fetched.body, "seasons")?;
        Ok(response
            .seasons
            .into_iter()
            .map(|value| entry::<WireSeason>(value, "season").and_then(map_season))
            .collect())
    }

    async fn get_teams(
        &self,
        season_external_id: &str,
    ) -> Result<Vec<Mapped<RawTeam>>, AdapterError> {
        let url = format!("{BASE_URL}/seasons/{season_external_id}/teams");
        let fetched = self.transport.get_json(Channel::Api, &url, &[], false).await?;
        let response: WireTeamsResponse = envelope(fetched.body, "teams")?;
        Ok(response
            .teams
            .into_iter()
            .map(|value| entry::<WireTeam>(value, "team").and_then(map_team))
            .collect())
    }

    async fn get_schedule(
        &self,
        season_external_id: &str,
    ) -> Result<Vec<Mapped<RawGame>>, AdapterError> {
        let url = format!("{BASE_URL}/seasons/{season_external_id}/games");
        let fetched = self.transport.get_json(Channel::Api, &url, &[], false).await?;
        let response: WireScheduleResponse = envelope(fetched.body, "schedule")?;
        Ok(response
            .games
            .into_iter()
            .map(|value| entry::<WireGame>(value, "game").and_then(map_game))
            .collect())
    }

    async fn get_game_boxscore(
        &self,
        game_external_id: &str,
        bypass_cache: bool,
    ) -> Result<Sourced<RawBoxScore>, AdapterError> {
        let url = format!("{BASE_URL}/games/{game_external_id}/boxscore");
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &[], bypass_cache)
            .await?;
        let wire: WireBoxScore = envelope(fetched.body, "boxscore")?;

        let game = map_game(wire.game)?;
        let (home_line, mut player_lines) = map_team_box(wire.home_team)?;
        let (away_line, away_players) = map_team_box(wire.away_team)?;
        player_lines.extend(away_players);

        Ok(Sourced {
            value: RawBoxScore {
                game,
                player_lines,
                team_lines: vec![home_line, away_line],
            },
            changed: fetched.changed,
        })
    }

    async fn get_game_pbp(
        &self,
        game_external_id: &str,
        bypass_cache: bool,
    ) -> Result<Sourced<Vec<RawPbpEvent>>, AdapterError> {
        let url = format!("{BASE_URL}/games/{game_external_id}/playbyplay");
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &[], bypass_cache)
            .await?;
        let response: WirePbpResponse = envelope(fetched.body, "playbyplay")?;
        let mut events = response
            .events
            .into_iter()
            .map(|value| entry::<WirePbpEvent>(value, "pbp_event").and_then(map_pbp_event))
            .collect::<Result<Vec<_>, _>>()?;
        events.sort_by_key(|event| event.event_number);
        Ok(Sourced {
            value: events,
            changed: fetched.changed,
        })
    }

    async fn get_player(
        &self,
        player_external_id: &str,
    ) -> Result<Option<RawPlayer>, AdapterError> {
        let url = format!("{BASE_URL}/players/{player_external_id}");
        let fetched = self.transport.get_json(Channel::Api, &url, &[], false).await?;
        if fetched.body.is_null() {
            return Ok(None);
        }
        let wire: WirePlayer = envelope(fetched.body, "player")?;
        Ok(Some(map_player(wire)?))
    }

    async fn search_player(
        &self,
        query: &str,
        team_external_id: Option<&str>,
    ) -> Result<Vec<RawPlayer>, AdapterError> {
        let url = format!("{BASE_URL}/players/search");
        let mut params = vec![("q", query.to_string())];
        if let Some(team) = team_external_id {
            params.push(("team", team.to_string()));
        }
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &params, false)
            .await?;
        #[derive(Debug, Deserialize)]
        struct WireSearchResponse {
            players: Vec<WirePlayer>,
        }
        let response: WireSearchResponse = envelope(fetched.body, "player_search")?;
        response
            .players
            .into_iter()
            .map(|wire| map_player(wire).map_err(AdapterError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxa::{GameStatus, Position};
    use serde_json::json;

    #[test]
    fn maps_a_nested_game_with_numeric_status() {
        let wire: WireGame = serde_json::from_value(json!({
            "game_id": 4117,
            "season_id": 31,
            "home_team_id": 10,
            "away_team_id": 12,
            "game_date": "2025-01-12T19:10:00",
            "status": 2,
            "home_score": 88,
            "away_score": 79,
            "venue": "Menora Mivtachim Arena",
            "attendance": 10383
        }))
        .unwrap();
        let game = map_game(wire).unwrap();
        assert_eq!(game.external_id, "4117");
        assert_eq!(game.status, GameStatus::Final);
        assert_eq!(game.home_score, Some(88));
    }

    #[test]
    fn scheduled_games_carry_no_scores() {
        let wire: WireGame = serde_json::from_value(json!({
            "game_id": 4118,
            "season_id": 31,
            "home_team_id": 10,
            "away_team_id": 11,
            "game_date": "2025-01-19T19:10:00",
            "status": 0,
            "home_score": 0,
            "away_score": 0
        }))
        .unwrap();
        let game = map_game(wire).unwrap();
        assert_eq!(game.status, GameStatus::Scheduled);
        assert_eq!(game.home_score, None);
        assert_eq!(game.away_score, None);
    }

    #[test]
    fn final_game_without_scores_is_a_record_error() {
        let wire: WireGame = serde_json::from_value(json!({
            "game_id": 4119,
            "season_id": 31,
            "home_team_id": 10,
            "away_team_id": 11,
            "game_date": "2025-01-19T19:10:00",
            "status": 2
        }))
        .unwrap();
        assert!(matches!(
            map_game(wire),
            Err(MapError::MissingField { field, .. }) if field == "home_score"
        ));
    }

    #[test]
    fn maps_roster_players_with_positions() {
        let wire: WireTeam = serde_json::from_value(json!({
            "team_id": 10,
            "name": "Maccabi Tel Aviv",
            "short_name": "MTA",
            "city": "Tel Aviv",
            "country": "Israel",
            "roster": [{
                "player_id": 123,
                "name": "Scottie Wilbekin",
                "birth_date": "1993-07-19",
                "nationality": "USA",
                "height_cm": 185,
                "position": "PG/SG",
                "jersey_number": 1
            }]
        }))
        .unwrap();
        let team = map_team(wire).unwrap();
        assert_eq!(team.roster.len(), 1);
        let player = &team.roster[0];
        assert_eq!(player.first_name, "Scottie");
        assert_eq!(player.last_name, "Wilbekin");
        assert_eq!(
            player.positions,
            vec![Position::PointGuard, Position::ShootingGuard]
        );
    }

    #[test]
    fn substitution_attributes_carry_both_external_ids() {
        let wire: WirePbpEvent = serde_json::from_value(json!({
            "seq": 210,
            "quarter": 3,
            "clock": "04:55",
            "action": "Substitution",
            "team_id": 10,
            "sub_in_player_id": 123,
            "sub_out_player_id": 456
        }))
        .unwrap();
        let event = map_pbp_event(wire).unwrap();
        assert_eq!(event.event_type, EventType::Substitution);
        assert_eq!(
            event.attributes.get("player_in_id").and_then(Value::as_str),
            Some("123")
        );
        assert_eq!(
            event.attributes.get("player_out_id").and_then(Value::as_str),
            Some("456")
        );
    }

    #[test]
    fn made_shot_requires_a_shot_value() {
        let wire: WirePbpEvent = serde_json::from_value(json!({
            "seq": 12,
            "quarter": 1,
            "clock": "08:21",
            "action": "Layup",
            "player_id": 123,
            "team_id": 10,
            "success": true
        }))
        .unwrap();
        assert!(matches!(
            map_pbp_event(wire),
            Err(MapError::MissingField { field, .. }) if field == "shot_value"
        ));
    }

    #[test]
    fn shot_attributes_include_situational_flags() {
        let wire: WirePbpEvent = serde_json::from_value(json!({
            "seq": 13,
            "quarter": 1,
            "clock": "08:02",
            "action": "Dunk",
            "player_id": 456,
            "team_id": 12,
            "success": true,
            "shot_value": 2,
            "is_fast_break": true,
            "is_second_chance": false,
            "related": [{"seq": 12, "relation": "assist"}]
        }))
        .unwrap();
        let event = map_pbp_event(wire).unwrap();
        assert_eq!(
            event.attributes.get("fast_break").and_then(Value::as_bool),
            Some(true)
        );
        assert_eq!(
            event.attributes.get("shot_type").and_then(Value::as_str),
            Some("dunk")
        );
        assert_eq!(event.links.len(), 1);
    }
}
