//! NBA Stats adapter. The provider answers every endpoint with tabular
//! result sets (`headers` + `rowSet`), so mapping goes through a small
//! column-indexed table reader instead of typed wire structs. Heights come
//! as feet-inches strings, substitutions as player1/player2 columns.

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
use hashbrown::HashMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

const SOURCE_NAME: &str = "nbastats";
const BASE_URL: &str = "https://stats.nba.com/stats";

pub struct NbaStatsAdapter {
    transport: Transport,
}

impl NbaStatsAdapter {
    pub fn new(
        config: &SourceConfig,
        cache: Option<Arc<ResponseCache>>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            transport: Transport::new(SOURCE_NAME, config, cache)?,
        })
    }
}

// ------------------------------------------------------------- table reader

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(rename = "resultSets")]
    result_sets: Vec<WireResultSet>,
}

#[derive(Debug, Deserialize)]
struct WireResultSet {
    name: String,
    headers: Vec<String>,
    #[serde(rename = "rowSet")]
    row_set: Vec<Vec<Value>>,
}

/// One named result set with column lookup by header.
struct Table {
    name: &'static str,
    columns: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    fn take(response: WireResponse, name: &'static str) -> Result<Table, MapError> {
        let set = response
            .result_sets
            .into_iter()
            .find(|set| set.name == name)
            .ok_or_else(|| MapError::MissingField {
                source_name: SOURCE_NAME,
                entity: "resultSets",
                field: name.to_string(),
            })?;
        let columns = set
            .headers
            .iter()
            .enumerate()
            .map(|(idx, header)| (header.clone(), idx))
            .collect();
        Ok(Table {
            name,
            columns,
            rows: set.row_set,
        })
    }

    fn column(&self, header: &str) -> Result<usize, MapError> {
        self.columns
            .get(header)
            .copied()
            .ok_or_else(|| MapError::MissingField {
                source_name: SOURCE_NAME,
                entity: self.name,
                field: header.to_string(),
            })
    }

    fn optional_column(&self, header: &str) -> Option<usize> {
        self.columns.get(header).copied()
    }
}

fn cell<'a>(row: &'a [Value], idx: usize, table: &'static str) -> Result<&'a Value, MapError> {
    row.get(idx).ok_or_else(|| MapError::MalformedField {
        source_name: SOURCE_NAME,
        entity: table,
        field: format!("column {idx}"),
        detail: "row is shorter than the header".to_string(),
    })
}

fn cell_str(row: &[Value], idx: usize, table: &'static str) -> Result<String, MapError> {
    let value = cell(row, idx, table)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MapError::MalformedField {
            source_name: SOURCE_NAME,
            entity: table,
            field: format!("column {idx}"),
            detail: format!("expected string, got {value}"),
        })
}

fn cell_opt_str(row: &[Value], idx: usize, table: &'static str) -> Result<Option<String>, MapError> {
    let value = cell(row, idx, table)?;
    if value.is_null() {
        return Ok(None);
    }
    cell_str(row, idx, table).map(Some)
}

fn cell_i64(row: &[Value], idx: usize, table: &'static str) -> Result<i64, MapError> {
    let value = cell(row, idx, table)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .ok_or_else(|| MapError::MalformedField {
            source_name: SOURCE_NAME,
            entity: table,
            field: format!("column {idx}"),
            detail: format!("expected number, got {value}"),
        })
}

fn cell_opt_i64(row: &[Value], idx: usize, table: &'static str) -> Result<Option<i64>, MapError> {
    if cell(row, idx, table)?.is_null() {
        return Ok(None);
    }
    cell_i64(row, idx, table).map(Some)
}

fn cell_opt_f64(row: &[Value], idx: usize, table: &'static str) -> Result<Option<f64>, MapError> {
    let value = cell(row, idx, table)?;
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_f64()
        .ok_or_else(|| MapError::MalformedField {
            source_name: SOURCE_NAME,
            entity: table,
            field: format!("column {idx}"),
            detail: format!("expected number, got {value}"),
        })
        .map(Some)
}

/// `"6-7"` (feet-inches) to centimeters.
fn parse_height_cm(raw: &str) -> Result<i32, MapError> {
    let malformed = || MapError::MalformedField {
        source_name: SOURCE_NAME,
        entity: "player",
        field: "HEIGHT".to_string(),
        detail: format!("{raw:?} is not FEET-INCHES"),
    };
    let (feet, inches) = raw.split_once('-').ok_or_else(malformed)?;
    let feet: f64 = feet.trim().parse().map_err(|_| malformed())?;
    let inches: f64 = inches.trim().parse().map_err(|_| malformed())?;
    Ok(((feet * 12.0 + inches) * 2.54).round() as i32)
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, MapError> {
    raw.parse().map_err(|_| MapError::MalformedField {
        source_name: SOURCE_NAME,
        entity: "row",
        field: field.to_string(),
        detail: format!("{raw:?} is not a date"),
    })
}

fn parse_datetime(raw: &str, field: &str) -> Result<NaiveDateTime, MapError> {
    raw.parse().map_err(|_| MapError::MalformedField {
        source_name: SOURCE_NAME,
        entity: "row",
        field: field.to_string(),
        detail: format!("{raw:?} is not a datetime"),
    })
}

// ------------------------------------------------------------------- mapping

fn envelope(body: Value) -> Result<WireResponse, MapError> {
    serde_json::from_value(body).map_err(|err| MapError::MalformedField {
        source_name: SOURCE_NAME,
        entity: "response",
        field: "$".to_string(),
        detail: err.to_string(),
    })
}

struct PlayerStatsColumns {
    player_id: usize,
    player_name: usize,
    birth_date: Option<usize>,
    nationality: Option<usize>,
    height: Option<usize>,
    position: Option<usize>,
    jersey: Option<usize>,
    team_id: usize,
    start_position: usize,
    minutes: usize,
    counters: CounterColumns,
    plus_minus: usize,
}

struct CounterColumns {
    pts: usize,
    fgm: usize,
    fga: usize,
    fg3m: usize,
    fg3a: usize,
    ftm: usize,
    fta: usize,
    oreb: usize,
    dreb: usize,
    reb: usize,
    ast: usize,
    tov: usize,
    stl: usize,
    blk: usize,
    pf: usize,
}

impl CounterColumns {
    fn resolve(table: &Table) -> Result<Self, MapError> {
        Ok(Self {
            pts: table.column("PTS")?,
            fgm: table.column("FGM")?,
            fga: table.column("FGA")?,
            fg3m: table.column("FG3M")?,
            fg3a: table.column("FG3A")?,
            ftm: table.column("FTM")?,
            fta: table.column("FTA")?,
            oreb: table.column("OREB")?,
            dreb: table.column("DREB")?,
            reb: table.column("REB")?,
            ast: table.column("AST")?,
            tov: table.column("TO")?,
            stl: table.column("STL")?,
            blk: table.column("BLK")?,
            pf: table.column("PF")?,
        })
    }

    fn read(&self, row: &[Value], table: &'static str) -> Result<RawStatCounters, MapError> {
        let fgm = cell_i64(row, self.fgm, table)? as i32;
        let fga = cell_i64(row, self.fga, table)? as i32;
        let three_pm = cell_i64(row, self.fg3m, table)? as i32;
        let three_pa = cell_i64(row, self.fg3a, table)? as i32;
        Ok(RawStatCounters {
            points: cell_i64(row, self.pts, table)? as i32,
            fgm,
            fga,
            two_pm: fgm - three_pm,
            two_pa: fga - three_pa,
            three_pm,
            three_pa,
            ftm: cell_i64(row, self.ftm, table)? as i32,
            fta: cell_i64(row, self.fta, table)? as i32,
            oreb: cell_i64(row, self.oreb, table)? as i32,
            dreb: cell_i64(row, self.dreb, table)? as i32,
            treb: cell_i64(row, self.reb, table)? as i32,
            ast: cell_i64(row, self.ast, table)? as i32,
            tov: cell_i64(row, self.tov, table)? as i32,
            stl: cell_i64(row, self.stl, table)? as i32,
            blk: cell_i64(row, self.blk, table)? as i32,
            pf: cell_i64(row, self.pf, table)? as i32,
        })
    }
}

/// Standard efficiency: PTS + REB + AST + STL + BLK - missed FG - missed FT
/// - TO. The provider does not ship EFF, so it is derived here.
fn efficiency(counters: &RawStatCounters) -> i32 {
    counters.points + counters.treb + counters.ast + counters.stl + counters.blk
        - (counters.fga - counters.fgm)
        - (counters.fta - counters.ftm)
        - counters.tov
}

fn map_player_row(columns: &PlayerStatsColumns, row: &[Value]) -> Mapped<RawPlayer> {
    const T: &str = "PlayerStats";
    let name = cell_str(row, columns.player_name, T)?;
    let (first_name, last_name) = split_person_name(&name);
    let birth_date = match columns.birth_date {
        Some(idx) => cell_opt_str(row, idx, T)?
            .map(|raw| parse_date(&raw, "BIRTH_DATE"))
            .transpose()?,
        None => None,
    };
    let nationality = match columns.nationality {
        Some(idx) => cell_opt_str(row, idx, T)?,
        None => None,
    };
    let height_cm = match columns.height {
        Some(idx) => cell_opt_str(row, idx, T)?
            .map(|raw| parse_height_cm(&raw))
            .transpose()?,
        None => None,
    };
    let positions = match columns.position {
        Some(idx) => match cell_opt_str(row, idx, T)? {
            Some(raw) if !raw.is_empty() => normalize_position(&raw, SOURCE_NAME)?,
            _ => Vec::new(),
        },
        None => Vec::new(),
    };
    let jersey_number = match columns.jersey {
        Some(idx) => cell_opt_i64(row, idx, T)?.map(|n| n as i32),
        None => None,
    };
    Ok(RawPlayer {
        external_id: cell_i64(row, columns.player_id, T)?.to_string(),
        first_name,
        last_name,
        birth_date,
        nationality,
        height_cm,
        positions,
        jersey_number,
        extra: Map::new(),
    })
}

fn map_game_row(table: &Table, row: &[Value]) -> Mapped<RawGame> {
    const T: &str = "GameSummary";
    let status_code = cell_i64(row, table.column("GAME_STATUS_ID")?, T)?;
    let status = normalize_game_status(&status_code.to_string(), SOURCE_NAME)?;
    let home_team = cell_i64(row, table.column("HOME_TEAM_ID")?, T)?;
    let away_team = cell_i64(row, table.column("VISITOR_TEAM_ID")?, T)?;
    if home_team == away_team {
        return Err(MapError::MalformedField {
            source_name: SOURCE_NAME,
            entity: T,
            field: "VISITOR_TEAM_ID".to_string(),
            detail: "home and visitor teams are the same".to_string(),
        });
    }
    let (home_score, away_score) = if status.has_scores() {
        let home = cell_opt_i64(row, table.column("HOME_PTS")?, T)?;
        let away = cell_opt_i64(row, table.column("VISITOR_PTS")?, T)?;
        match (home, away) {
            (Some(home), Some(away)) => (Some(home as i32), Some(away as i32)),
            _ => {
                return Err(MapError::MissingField {
                    source_name: SOURCE_NAME,
                    entity: T,
                    field: "HOME_PTS/VISITOR_PTS".to_string(),
                });
            }
        }
    } else {
        (None, None)
    };
    let game_date = parse_datetime(
        &cell_str(row, table.column("GAME_DATE_EST")?, T)?,
        "GAME_DATE_EST",
    )?;
    let venue = match table.optional_column("ARENA_NAME") {
        Some(idx) => cell_opt_str(row, idx, T)?,
        None => None,
    };
    let attendance = match table.optional_column("ATTENDANCE") {
        Some(idx) => cell_opt_i64(row, idx, T)?.map(|n| n as i32),
        None => None,
    };
    Ok(RawGame {
        external_id: cell_str(row, table.column("GAME_ID")?, T)?,
        season_external_id: cell_str(row, table.column("SEASON")?, T)?,
        home_team_external_id: home_team.to_string(),
        away_team_external_id: away_team.to_string(),
        game_date,
        status,
        home_score,
        away_score,
        venue,
        attendance,
    })
}

fn map_pbp_row(table: &Table, row: &[Value]) -> Mapped<RawPbpEvent> {
    const T: &str = "PlayByPlay";
    let action = cell_str(row, table.column("ACTION")?, T)?;
    let (event_type, event_subtype) = normalize_event_type(&action, SOURCE_NAME)?;

    let player1 = cell_opt_i64(row, table.column("PLAYER1_ID")?, T)?;
    let player2 = match table.optional_column("PLAYER2_ID") {
        Some(idx) => cell_opt_i64(row, idx, T)?,
        None => None,
    };

    let success = match table.optional_column("SUCCESS_FLAG") {
        Some(idx) => cell_opt_i64(row, idx, T)?.map(|flag| flag != 0),
        None => None,
    };

    let mut attributes = Map::new();
    if event_type == EventType::Shot {
        let shot_value = match table.optional_column("SHOT_VALUE") {
            Some(idx) => cell_opt_i64(row, idx, T)?,
            None => None,
        }
        .ok_or_else(|| MapError::MissingField {
            source_name: SOURCE_NAME,
            entity: T,
            field: "SHOT_VALUE".to_string(),
        })?;
        attributes.insert("shot_value".to_string(), shot_value.into());
        if let Some(shot_type) = &event_subtype {
            attributes.insert("shot_type".to_string(), shot_type.as_str().into());
        }
        for (column, attribute) in [
            ("FAST_BREAK_FLAG", "fast_break"),
            ("SECOND_CHANCE_FLAG", "second_chance"),
            ("CONTESTED_FLAG", "contested"),
        ] {
            if let Some(idx) = table.optional_column(column) {
                if let Some(flag) = cell_opt_i64(row, idx, T)? {
                    attributes.insert(attribute.to_string(), (flag != 0).into());
                }
            }
        }
    }
    // Substitutions: PLAYER1 leaves the floor, PLAYER2 replaces them.
    if event_type == EventType::Substitution {
        if let Some(out_id) = player1 {
            attributes.insert("player_out_id".to_string(), out_id.to_string().into());
        }
        if let Some(in_id) = player2 {
            attributes.insert("player_in_id".to_string(), in_id.to_string().into());
        }
    }

    let mut links = Vec::new();
    if let (Some(related_idx), Some(relation_idx)) = (
        table.optional_column("RELATED_EVENTNUM"),
        table.optional_column("RELATION"),
    ) {
        if let (Some(related), Some(relation)) = (
            cell_opt_i64(row, related_idx, T)?,
            cell_opt_str(row, relation_idx, T)?,
        ) {
            links.push(RawEventLink {
                event_number: related as i32,
                relation,
            });
        }
    }

    Ok(RawPbpEvent {
        event_number: cell_i64(row, table.column("EVENTNUM")?, T)? as i32,
        period: cell_i64(row, table.column("PERIOD")?, T)? as i32,
        clock: cell_str(row, table.column("PCTIMESTRING")?, T)?,
        event_type,
        event_subtype,
        player_external_id: player1.map(|id| id.to_string()),
        team_external_id: cell_i64(row, table.column("TEAM_ID")?, T)?.to_string(),
        success,
        coord_x: match table.optional_column("LOC_X") {
            Some(idx) => cell_opt_f64(row, idx, T)?,
            None => None,
        },
        coord_y: match table.optional_column("LOC_Y") {
            Some(idx) => cell_opt_f64(row, idx, T)?,
            None => None,
        },
        attributes,
        links,
    })
}

// ------------------------------------------------------------------- adapter

impl SourceAdapter for NbaStatsAdapter {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn get_seasons(&self) -> Result<Vec<Mapped<RawSeason>>, AdapterError> {
        let url = format!("{BASE_URL}/leagueseasons");
        let params = [("LeagueID", "00".to_string())];
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &params, false)
            .await?;
        let table = Table::take(envelope(fetched.body)?, "LeagueSeasons")?;

        const T: &str = "LeagueSeasons";
        let season_id = table.column("SEASON_ID")?;
        let season_name = table.column("SEASON_NAME")?;
        let start_date = table.column("START_DATE")?;
        let end_date = table.column("END_DATE")?;
        let is_current = table.column("IS_CURRENT")?;

        Ok(table
            .rows
            .iter()
            .map(|row| {
                Ok(RawSeason {
                    external_id: cell_str(row, season_id, T)?,
                    league_code: "NBA".to_string(),
                    league_name: "National Basketball Association".to_string(),
                    league_country: Some("USA".to_string()),
                    name: cell_str(row, season_name, T)?,
                    start_date: parse_date(&cell_str(row, start_date, T)?, "START_DATE")?,
                    end_date: parse_date(&cell_str(row, end_date, T)?, "END_DATE")?,
                    is_current: cell_i64(row, is_current, T)? != 0,
                })
            })
            .collect())
    }

    async fn get_teams(
        &self,
        season_external_id: &str,
    ) -> Result<Vec<Mapped<RawTeam>>, AdapterError> {
        let url = format!("{BASE_URL}/leagueteams");
        let params = [
            ("LeagueID", "00".to_string()),
            ("Season", season_external_id.to_string()),
        ];
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &params, false)
            .await?;
        let response = envelope(fetched.body)?;

        const T: &str = "Teams";
        let table = Table::take(response, T)?;
        let team_id = table.column("TEAM_ID")?;
        let team_name = table.column("TEAM_NAME")?;
        let abbreviation = table.column("ABBREVIATION")?;
        let city = table.column("TEAM_CITY")?;

        Ok(table
            .rows
            .iter()
            .map(|row| {
                Ok(RawTeam {
                    external_id: cell_i64(row, team_id, T)?.to_string(),
                    name: cell_str(row, team_name, T)?,
                    short_name: cell_opt_str(row, abbreviation, T)?,
                    city: cell_opt_str(row, city, T)?,
                    country: Some("USA".to_string()),
                    // Rosters ride on the boxscore endpoint for this
                    // provider; team listings are roster-less.
                    roster: Vec::new(),
                })
            })
            .collect())
    }

    async fn get_schedule(
        &self,
        season_external_id: &str,
    ) -> Result<Vec<Mapped<RawGame>>, AdapterError> {
        let url = format!("{BASE_URL}/leagueschedule");
        let params = [
            ("LeagueID", "00".to_string()),
            ("Season", season_external_id.to_string()),
        ];
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &params, false)
            .await?;
        let table = Table::take(envelope(fetched.body)?, "GameSummary")?;
        Ok(table
            .rows
            .iter()
            .map(|row| map_game_row(&table, row))
            .collect())
    }

    async fn get_game_boxscore(
        &self,
        game_external_id: &str,
        bypass_cache: bool,
    ) -> Result<Sourced<RawBoxScore>, AdapterError> {
        let url = format!("{BASE_URL}/boxscoretraditionalv2");
        let params = [("GameID", game_external_id.to_string())];
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &params, bypass_cache)
            .await?;
        let response: WireResponse = envelope(fetched.body)?;

        // Table::take consumes the response, so split the sets up front.
        let mut sets: HashMap<String, WireResultSet> = response
            .result_sets
            .into_iter()
            .map(|set| (set.name.clone(), set))
            .collect();
        let mut take = |name: &'static str| -> Result<Table, MapError> {
            let set = sets.remove(name).ok_or_else(|| MapError::MissingField {
                source_name: SOURCE_NAME,
                entity: "resultSets",
                field: name.to_string(),
            })?;
            Table::take(
                WireResponse {
                    result_sets: vec![set],
                },
                name,
            )
        };

        let summary = take("GameSummary")?;
        let summary_row = summary.rows.first().ok_or_else(|| MapError::MissingField {
            source_name: SOURCE_NAME,
            entity: "GameSummary",
            field: "rowSet".to_string(),
        })?;
        let game = map_game_row(&summary, summary_row)?;

        let player_stats = take("PlayerStats")?;
        let columns = PlayerStatsColumns {
            player_id: player_stats.column("PLAYER_ID")?,
            player_name: player_stats.column("PLAYER_NAME")?,
            birth_date: player_stats.optional_column("BIRTH_DATE"),
            nationality: player_stats.optional_column("NATIONALITY"),
            height: player_stats.optional_column("HEIGHT"),
            position: player_stats.optional_column("POSITION"),
            jersey: player_stats.optional_column("JERSEY_NUM"),
            team_id: player_stats.column("TEAM_ID")?,
            start_position: player_stats.column("START_POSITION")?,
            minutes: player_stats.column("MIN")?,
            counters: CounterColumns::resolve(&player_stats)?,
            plus_minus: player_stats.column("PLUS_MINUS")?,
        };

        const PT: &str = "PlayerStats";
        let mut player_lines = Vec::with_capacity(player_stats.rows.len());
        for row in &player_stats.rows {
            let player = map_player_row(&columns, row)?;
            let counters = columns.counters.read(row, PT)?;
            counters.validate(SOURCE_NAME, &player.external_id)?;
            let is_starter = !cell_opt_str(row, columns.start_position, PT)?
                .unwrap_or_default()
                .is_empty();
            let eff = efficiency(&counters);
            player_lines.push(RawPlayerLine {
                player,
                team_external_id: cell_i64(row, columns.team_id, PT)?.to_string(),
                seconds_played: parse_minutes(&cell_str(row, columns.minutes, PT)?, SOURCE_NAME)
                    .map_err(MapError::from)?,
                is_starter,
                counters,
                plus_minus: cell_opt_i64(row, columns.plus_minus, PT)?.unwrap_or(0) as i32,
                efficiency: eff,
                extra: Map::new(),
            });
        }

        const TT: &str = "TeamStats";
        let team_stats = take("TeamStats")?;
        let team_columns = CounterColumns::resolve(&team_stats)?;
        let team_id_col = team_stats.column("TEAM_ID")?;
        let mut team_lines = Vec::with_capacity(team_stats.rows.len());
        for row in &team_stats.rows {
            let counters = team_columns.read(row, TT)?;
            let external_id = cell_i64(row, team_id_col, TT)?.to_string();
            counters.validate(SOURCE_NAME, &external_id)?;
            let optional = |column: &str| -> Result<Option<i32>, MapError> {
                match team_stats.optional_column(column) {
                    Some(idx) => Ok(cell_opt_i64(row, idx, TT)?.map(|n| n as i32)),
                    None => Ok(None),
                }
            };
            team_lines.push(RawTeamLine {
                team_external_id: external_id,
                counters,
                fast_break_points: optional("FB_PTS")?,
                points_in_paint: optional("PTS_PAINT")?,
                second_chance_points: optional("PTS_2ND_CHANCE")?,
                bench_points: optional("BENCH_PTS")?,
                biggest_lead: optional("LARGEST_LEAD")?,
                seconds_leading: optional("TIME_LEADING_SECONDS")?,
                extra: Map::new(),
            });
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
        let url = format!("{BASE_URL}/playbyplayv2");
        let params = [("GameID", game_external_id.to_string())];
        let fetched = self
            .transport
            .get_json(Channel::Api, &url, &params, bypass_cache)
            .await?;
        let table = Table::take(envelope(fetched.body)?, "PlayByPlay")?;
        let mut events = table
            .rows
            .iter()
            .map(|row| map_pbp_row(&table, row))
            .collect::<Result<Vec<_>, _>>()?;
        events.sort_by_key(|event| event.event_number);
        Ok(Sourced {
            value: events,
            changed: fetched.changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxa::{GameStatus, Position};
    use serde_json::json;

    fn table(name: &'static str, headers: &[&str], rows: Vec<Vec<Value>>) -> Table {
        let response: WireResponse = serde_json::from_value(json!({
            "resultSets": [{
                "name": name,
                "headers": headers,
                "rowSet": rows,
            }]
        }))
        .unwrap();
        Table::take(response, name).unwrap()
    }

    #[test]
    fn feet_inches_heights_convert_to_centimeters() {
        assert_eq!(parse_height_cm("6-7").unwrap(), 201);
        assert_eq!(parse_height_cm("7-3").unwrap(), 221);
        assert!(parse_height_cm("tall").is_err());
    }

    #[test]
    fn tabular_game_rows_map_through_headers() {
        let table = table(
            "GameSummary",
            &[
                "GAME_ID",
                "SEASON",
                "HOME_TEAM_ID",
                "VISITOR_TEAM_ID",
                "GAME_DATE_EST",
                "GAME_STATUS_ID",
                "HOME_PTS",
                "VISITOR_PTS",
            ],
            vec![vec![
                json!("0022400811"),
                json!("2024-25"),
                json!(1610612747),
                json!(1610612738),
                json!("2025-02-11T19:30:00"),
                json!(3),
                json!(112),
                json!(104),
            ]],
        );
        let game = map_game_row(&table, &table.rows[0]).unwrap();
        assert_eq!(game.external_id, "0022400811");
        assert_eq!(game.status, GameStatus::Final);
        assert_eq!(game.home_score, Some(112));
        assert_eq!(game.away_score, Some(104));
    }

    #[test]
    fn missing_header_is_a_structured_error() {
        let table = table("GameSummary", &["GAME_ID"], vec![vec![json!("001")]]);
        let err = map_game_row(&table, &table.rows[0]).unwrap_err();
        assert!(matches!(err, MapError::MissingField { field, .. } if field == "GAME_STATUS_ID"));
    }

    #[test]
    fn two_point_splits_derive_from_totals() {
        let table = table(
            "PlayerStats",
            &[
                "PTS", "FGM", "FGA", "FG3M", "FG3A", "FTM", "FTA", "OREB", "DREB", "REB",
                "AST", "TO", "STL", "BLK", "PF",
            ],
            vec![vec![
                json!(25),
                json!(9),
                json!(17),
                json!(3),
                json!(7),
                json!(4),
                json!(5),
                json!(2),
                json!(6),
                json!(8),
                json!(5),
                json!(3),
                json!(1),
                json!(1),
                json!(2),
            ]],
        );
        let columns = CounterColumns::resolve(&table).unwrap();
        let counters = columns.read(&table.rows[0], "PlayerStats").unwrap();
        assert_eq!(counters.two_pm, 6);
        assert_eq!(counters.two_pa, 10);
        counters.validate("nbastats", "test").unwrap();
        assert_eq!(efficiency(&counters), 25 + 8 + 5 + 1 + 1 - 8 - 1 - 3);
    }

    #[test]
    fn substitution_rows_swap_player_columns() {
        let table = table(
            "PlayByPlay",
            &[
                "EVENTNUM",
                "PERIOD",
                "PCTIMESTRING",
                "ACTION",
                "PLAYER1_ID",
                "PLAYER2_ID",
                "TEAM_ID",
            ],
            vec![vec![
                json!(321),
                json!(4),
                json!("06:42"),
                json!("Substitution"),
                json!(201939),
                json!(1629027),
                json!(1610612744),
            ]],
        );
        let event = map_pbp_row(&table, &table.rows[0]).unwrap();
        assert_eq!(event.event_type, EventType::Substitution);
        assert_eq!(
            event.attributes.get("player_out_id").and_then(Value::as_str),
            Some("201939")
        );
        assert_eq!(
            event.attributes.get("player_in_id").and_then(Value::as_str),
            Some("1629027")
        );
    }

    #[test]
    fn positions_in_dash_notation_map() {
        let positions = normalize_position("G-F", SOURCE_NAME).unwrap();
        assert_eq!(positions, vec![Position::Guard, Position::Forward]);
    }
}
