//! Euroleague adapter. Flat JSON arrays keyed by season code (`E2024`),
//! single-letter status codes, `"LAST, First"` player names, heights in
//! meters.

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

const SOURCE_NAME: &str = "euroleague";
const BASE_URL: &str = "https://api-live.euroleague.net/v2";

pub struct EuroleagueAdapter {
    transport: Transport,
}

impl EuroleagueAdapter {
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
struct WireSeason {
    code: String,
    name: String,
    #[serde(rename = "startDate")]
    start_date: NaiveDate,
    #[serde(rename = "endDate")]
    end_date: NaiveDate,
    #[serde(default)]
    current: bool,
    #[serde(rename = "competitionCode")]
    competition_code: String,
    #[serde(rename = "competitionName")]
    competition_name: String,
}

#[derive(Debug, Deserialize)]
struct WireClub {
    code: String,
    name: String,
    #[serde(rename = "abbreviatedName")]
    abbreviated_name: Option<String>,
    city: Option<String>,
    country: Option<String>,
    #[serde(default)]
    players: Vec<WirePlayer>,
}

#[derive(Debug, Deserialize)]
struct WirePlayer {
    code: String,
    name: String,
    #[serde(rename = "birthDate")]
    birth_date: Option<NaiveDate>,
    country: Option<String>,
    /// Meters, e.g. 1.96.
    height: Option<f64>,
    position: Option<String>,
    #[serde(rename = "dorsal")]
    jersey: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct WireGame {
    code: String,
    #[serde(rename = "seasonCode")]
    season_code: String,
    #[serde(rename = "homeCode")]
    home_code: String,
    #[serde(rename = "awayCode")]
    away_code: String,
    date: NaiveDateTime,
    status: String,
    #[serde(rename = "homeScore")]
    home_score: Option<i32>,
    #[serde(rename = "awayScore")]
    away_score: Option<i32>,
    arena: Option<String>,
    attendance: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct WireBoxScore {
    game: WireGame,
    stats: Vec<WireTeamStats>,
}

#[derive(Debug, Deserialize)]
struct WireTeamStats {
    #[serde(rename = "teamCode")]
    team_code: String,
    totals: WireStatLine,
    #[serde(rename = "fastBreakPoints")]
    fast_break_points: Option<i32>,
    #[serde(rename = "pointsInPaint")]
    points_in_paint: Option<i32>,
    #[serde(rename = "secondChancePoints")]
    second_chance_points: Option<i32>,
    #[serde(rename = "benchPoints")]
    bench_points: Option<i32>,
    #[serde(rename = "biggestLead")]
    biggest_lead: Option<i32>,
    #[serde(rename = "timeLeading")]
    time_leading: Option<String>,
    players: Vec<WirePlayerStats>,
}

#[derive(Debug, Deserialize)]
struct WirePlayerStats {
    player: WirePlayer,
    minutes: String,
    #[serde(rename = "isStarter", default)]
    is_starter: bool,
    #[serde(flatten)]
    line: WireStatLine,
    #[serde(rename = "plusMinus")]
    plus_minus: Option<i32>,
    #[serde(rename = "pir")]
    performance_index: Option<i32>,
}

/// Euroleague ships its counters under competition-style keys.
#[derive(Debug, Deserialize)]
struct WireStatLine {
    #[serde(rename = "PTS")]
    points: i32,
    #[serde(rename = "2FGM")]
    two_pm: i32,
    #[serde(rename = "2FGA")]
    two_pa: i32,
    #[serde(rename = "3FGM")]
    three_pm: i32,
    #[serde(rename = "3FGA")]
    three_pa: i32,
    #[serde(rename = "FTM")]
    ftm: i32,
    #[serde(rename = "FTA")]
    fta: i32,
    #[serde(rename = "OREB")]
    oreb: i32,
    #[serde(rename = "DREB")]
    dreb: i32,
    #[serde(rename = "AST")]
    ast: i32,
    #[serde(rename = "TOV")]
    tov: i32,
    #[serde(rename = "STL")]
    stl: i32,
    #[serde(rename = "BLK")]
    blk: i32,
    #[serde(rename = "PF")]
    pf: i32,
}

#[derive(Debug, Deserialize)]
struct WirePlay {
    #[serde(rename = "numberOfPlay")]
    number_of_play: i32,
    quarter: i32,
    #[serde(rename = "markerTime")]
    marker_time: String,
    #[serde(rename = "playType")]
    play_type: String,
    #[serde(rename = "playerCode")]
    player_code: Option<String>,
    #[serde(rename = "teamCode")]
    team_code: String,
    #[serde(default)]
    success: Option<bool>,
    #[serde(rename = "pointsScored")]
    points_scored: Option<i32>,
    #[serde(rename = "coordX")]
    coord_x: Option<f64>,
    #[serde(rename = "coordY")]
    coord_y: Option<f64>,
    #[serde(rename = "fastBreak")]
    fast_break: Option<bool>,
    #[serde(rename = "secondChance")]
    second_chance: Option<bool>,
    #[serde(rename = "playerIn")]
    player_in: Option<String>,
    #[serde(rename = "playerOut")]
    player_out: Option<String>,
    #[serde(rename = "linkedPlays", default)]
    linked_plays: Vec<WireLinkedPlay>,
}

#[derive(Debug, Deserialize)]
struct WireLinkedPlay {
    #[serde(rename = "numberOfPlay")]
    number_of_play: i32,
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
    Ok(RawSeason {
        external_id: wire.code,
        league_code: wire.competition_code,
        league_name: wire.competition_name,
        league_country: None,
        name: wire.name,
        start_date: wire.start_date,
        end_date: wire.end_date,
        is_current: wire.current,
    })
}

fn map_player(wire: WirePlayer) -> Mapped<RawPlayer> {
    let (first_name, last_name) = split_person_name(&wire.name);
    let positions = match &wire.position {
        Some(raw) => normalize_position(raw, SOURCE_NAME)?,
        None => Vec::new(),
    };
    let height_cm = wire.height.map(|meters| {
        if meters > 3.0 {
            // Some feeds already send centimeters.
            meters.round() as i32
        } else {
            (meters * 100.0).round() as i32
        }
    });
    Ok(RawPlayer {
        external_id: wire.code,
        first_name,
        last_name,
        birth_date: wire.birth_date,
        nationality: wire.country,
        height_cm,
        positions,
        jersey_number: wire.jersey,
        extra: Map::new(),
    })
}

fn map_club(wire: WireClub) -> Mapped<RawTeam> {
    let roster = wire
        .players
        .into_iter()
        .map(map_player)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawTeam {
        external_id: wire.code,
        name: wire.name,
        short_name: wire.abbreviated_name,
        city: wire.city,
        country: wire.country,
        roster,
    })
}

fn map_game(wire: WireGame) -> Mapped<RawGame> {
    let status = normalize_game_status(&wire.status, SOURCE_NAME)?;
    if wire.home_code == wire.away_code {
        return Err(MapError::MalformedField {
            source_name: SOURCE_NAME,
            entity: "game",
            field: "awayCode".to_string(),
            detail: "home and away clubs are the same".to_string(),
        });
    }
    let (home_score, away_score) = if status.has_scores() {
        match (wire.home_score, wire.away_score) {
            (Some(home), Some(away)) => (Some(home), Some(away)),
            _ => {
                return Err(MapError::MissingField {
                    source_name: SOURCE_NAME,
                    entity: "game",
                    field: "homeScore/awayScore".to_string(),
                });
            }
        }
    } else {
        (None, None)
    };
    Ok(RawGame {
        external_id: wire.code,
        season_external_id: wire.season_code,
        home_team_external_id: wire.home_code,
        away_team_external_id: wire.away_code,
        game_date: wire.date,
        status,
        home_score,
        away_score,
        venue: wire.arena,
        attendance: wire.attendance,
    })
}

fn map_counters(line: &WireStatLine) -> RawStatCounters {
    RawStatCounters {
        points: line.points,
        fgm: line.two_pm + line.three_pm,
        fga: line.two_pa + line.three_pa,
        two_pm: line.two_pm,
        two_pa: line.two_pa,
        three_pm: line.three_pm,
        three_pa: line.three_pa,
        ftm: line.ftm,
        fta: line.fta,
        oreb: line.oreb,
        dreb: line.dreb,
        treb: line.oreb + line.dreb,
        ast: line.ast,
        tov: line.tov,
        stl: line.stl,
        blk: line.blk,
        pf: line.pf,
    }
}

fn map_player_stats(wire: WirePlayerStats, team_code: &str) -> Mapped<RawPlayerLine> {
    let seconds_played = parse_minutes(&wire.minutes, SOURCE_NAME)?;
    let counters = map_counters(&wire.line);
    let player = map_player(wire.player)?;
    counters.validate(SOURCE_NAME, &player.external_id)?;
    Ok(RawPlayerLine {
        player,
        team_external_id: team_code.to_string(),
        seconds_played,
        is_starter: wire.is_starter,
        counters,
        plus_minus: wire.plus_minus.unwrap_or(0),
        efficiency: wire.performance_index.unwrap_or(0),
        extra: Map::new(),
    })
}

fn map_team_stats(wire: WireTeamStats) -> Mapped<(RawTeamLine, Vec<RawPlayerLine>)> {
    let counters = map_counters(&wire.totals);
    counters.validate(SOURCE_NAME, &wire.team_code)?;
    let seconds_leading = wire
        .time_leading
        .as_deref()
        .map(|raw| parse_minutes(raw, SOURCE_NAME))
        .transpose()?;
    let player_lines = wire
        .players
        .into_iter()
        .map(|stats| map_player_stats(stats, &wire.team_code))
        .collect::<Result<Vec<_>, _>>()?;
    let team_line = RawTeamLine {
        team_external_id: wire.team_code,
        counters,
        fast_break_points: wire.fast_break_points,
        points_in_paint: wire.points_in_paint,
        second_chance_points: wire.second_chance_points,
        bench_points: wire.bench_points,
        biggest_lead: wire.biggest_lead,
        seconds_leading,
        extra: Map::new(),
    };
    Ok((team_line, player_lines))
}

fn map_play(wire: WirePlay) -> Mapped<RawPbpEvent> {
    let (event_type, event_subtype) = normalize_event_type(&wire.play_type, SOURCE_NAME)?;

    let mut attributes = Map::new();
    if event_type == EventType::Shot {
        let shot_value = match wire.points_scored {
            Some(points) if points == 2 || points == 3 => points,
            Some(points) => {
                return Err(MapError::MalformedField {
                    source_name: SOURCE_NAME,
                    entity: "play",
                    field: "pointsScored".to_string(),
                    detail: format!("{points} is not a field-goal value"),
                });
            }
            None => {
                return Err(MapError::MissingField {
                    source_name: SOURCE_NAME,
                    entity: "play",
                    field: "pointsScored".to_string(),
                });
            }
        };
        attributes.insert("shot_value".to_string(), shot_value.into());
        if let Some(shot_type) = &event_subtype {
            attributes.insert("shot_type".to_string(), shot_type.as_str().into());
        }
        if let Some(fast_break) = wire.fast_break {
            attributes.insert("fast_break".to_string(), fast_break.into());
        }
        if let Some(second_chance) = wire.second_chance {
            attributes.insert("second_chance".to_string(), second_chance.into());
        }
    }
    if event_type == EventType::Substitution {
        if let Some(code) = &wire.player_in {
            attributes.insert("player_in_id".to_string(), code.as_str().into());
        }
        if let Some(code) = &wire.player_out {
            attributes.insert("player_out_id".to_string(), code.as_str().into());
        }
    }

    Ok(RawPbpEvent {
        event_number: wire.number_of_play,
        period: wire.quarter,
        clock: wire.marker_time,
        event_type,
        event_subtype,
        player_external_id: wire.player_code,
        team_external_id: wire.team_code,
        success: wire.success,
        coord_x: wire.coord_x,
        coord_y: wire.coord_y,
        attributes,
        links: wire
            .linked_plays
            .into_iter()
            .map(|linked| RawEventLink {
                event_number: linked.number_of_play,
                relation: linked.relation,
            })
            .collect(),
    })
}

// ------------------------------------------------------------------- adapter

impl SourceAdapter for EuroleagueAdapter {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn get_seasons(&self) -> Result<Vec<Mapped<RawSeason>>, AdapterError> {
        let url = format!("{BASE_URL}/seasons");
        let fetched = self.transport.get_json(Channel::Api, &url, &[], false).await?;
        let seasons: Vec<Value> = envelope(fetched.body, "seasons")?;
        Ok(seasons
            .into_iter()
            .map(|value| entry::<WireSeason>(value, "season").and_then(map_season))
            .collect())
    }

    async fn get_teams(
        &self,
        season_external_id: &str,
    ) -> Result<Vec<Mapped<RawTeam>>, AdapterError> {
        let url = format!("{BASE_URL}/clubs");
        let params = [("seasonCode", season_external_id.to_string())];
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &params, false)
            .await?;
        let clubs: Vec<Value> = envelope(fetched.body, "clubs")?;
        Ok(clubs
            .into_iter()
            .map(|value| entry::<WireClub>(value, "club").and_then(map_club))
            .collect())
    }

    async fn get_schedule(
        &self,
        season_external_id: &str,
    ) -> Result<Vec<Mapped<RawGame>>, AdapterError> {
        let url = format!("{BASE_URL}/games");
        let params = [("seasonCode", season_external_id.to_string())];
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &params, false)
            .await?;
        let games: Vec<Value> = envelope(fetched.body, "games")?;
        Ok(games
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
        let mut team_lines = Vec::with_capacity(2);
        let mut player_lines = Vec::new();
        for team_stats in wire.stats {
            let (team_line, players) = map_team_stats(team_stats)?;
            team_lines.push(team_line);
            player_lines.extend(players);
        }
        if team_lines.len() != 2 {
            return Err(AdapterError::Map(MapError::MalformedField {
                source_name: SOURCE_NAME,
                entity: "boxscore",
                field: "stats".to_string(),
                detail: format!("expected 2 team stat blocks, got {}", team_lines.len()),
            }));
        }

        Ok(Sourced {
            value: RawBoxScore {
                game,
                player_lines,
                team_lines,
            },
            changed: fetched.changed,
        })
    }

    async fn get_game_pbp(
        &self,
        game_external_id: &str,
        bypass_cache: bool,
    ) -> Result<Sourced<Vec<RawPbpEvent>>, AdapterError> {
        let url = format!("{BASE_URL}/games/{game_external_id}/plays");
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &[], bypass_cache)
            .await?;
        let plays: Vec<Value> = envelope(fetched.body, "plays")?;
        let mut events = plays
            .into_iter()
            .map(|value| entry::<WirePlay>(value, "play").and_then(map_play))
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
        let url = format!("{BASE_URL}/players");
        let mut params = vec![("search", query.to_string())];
        if let Some(club) = team_external_id {
            params.push(("clubCode", club.to_string()));
        }
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &params, false)
            .await?;
        let players: Vec<WirePlayer> = envelope(fetched.body, "players")?;
        players
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
    fn maps_comma_names_and_metric_heights() {
        let wire: WirePlayer = serde_json::from_value(json!({
            "code": "PWB",
            "name": "WILBEKIN, Scottie",
            "birthDate": "1993-07-19",
            "country": "USA",
            "height": 1.85,
            "position": "Base",
            "dorsal": 1
        }))
        .unwrap();
        let player = map_player(wire).unwrap();
        assert_eq!(player.first_name, "Scottie");
        assert_eq!(player.last_name, "WILBEKIN");
        assert_eq!(player.height_cm, Some(185));
        assert_eq!(player.positions, vec![Position::PointGuard]);
    }

    #[test]
    fn heights_already_in_centimeters_pass_through() {
        let wire: WirePlayer = serde_json::from_value(json!({
            "code": "P2",
            "name": "TAVARES, Walter",
            "height": 221.0
        }))
        .unwrap();
        assert_eq!(map_player(wire).unwrap().height_cm, Some(221));
    }

    #[test]
    fn letter_status_codes_resolve() {
        let wire: WireGame = serde_json::from_value(json!({
            "code": "E2024_312",
            "seasonCode": "E2024",
            "homeCode": "MAD",
            "awayCode": "TEL",
            "date": "2025-03-06T20:45:00",
            "status": "F",
            "homeScore": 95,
            "awayScore": 91
        }))
        .unwrap();
        let game = map_game(wire).unwrap();
        assert_eq!(game.status, GameStatus::Final);
        assert_eq!(game.season_external_id, "E2024");
    }

    #[test]
    fn counters_derive_fg_totals_from_splits() {
        let line: WireStatLine = serde_json::from_value(json!({
            "PTS": 17, "2FGM": 4, "2FGA": 7, "3FGM": 2, "3FGA": 5,
            "FTM": 3, "FTA": 4, "OREB": 1, "DREB": 4, "AST": 6,
            "TOV": 2, "STL": 1, "BLK": 0, "PF": 2
        }))
        .unwrap();
        let counters = map_counters(&line);
        assert_eq!(counters.fgm, 6);
        assert_eq!(counters.fga, 12);
        assert_eq!(counters.treb, 5);
        counters.validate("euroleague", "test").unwrap();
    }

    #[test]
    fn non_field_goal_point_values_are_rejected() {
        let wire: WirePlay = serde_json::from_value(json!({
            "numberOfPlay": 41,
            "quarter": 2,
            "markerTime": "05:30",
            "playType": "Jump Shot",
            "playerCode": "PWB",
            "teamCode": "TEL",
            "success": true,
            "pointsScored": 1
        }))
        .unwrap();
        assert!(matches!(
            map_play(wire),
            Err(MapError::MalformedField { field, .. }) if field == "pointsScored"
        ));
    }

    #[test]
    fn substitution_plays_map_player_codes() {
        let wire: WirePlay = serde_json::from_value(json!({
            "numberOfPlay": 180,
            "quarter": 3,
            "markerTime": "02:10",
            "playType": "SUB",
            "teamCode": "TEL",
            "playerIn": "PWB",
            "playerOut": "PXC"
        }))
        .unwrap();
        let event = map_play(wire).unwrap();
        assert_eq!(event.event_type, EventType::Substitution);
        assert_eq!(
            event.attributes.get("player_in_id").and_then(Value::as_str),
            Some("PWB")
        );
    }
}
