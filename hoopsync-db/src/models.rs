use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::leagues)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbLeague {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub country: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::leagues)]
pub struct NewLeague<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub country: Option<&'a str>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::seasons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbSeason {
    pub id: i64,
    pub league_id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_current: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::seasons)]
pub struct NewSeason<'a> {
    pub league_id: i64,
    pub name: &'a str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_current: bool,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::teams)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbTeam {
    pub id: i64,
    pub name: String,
    pub name_key: String,
    pub short_name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::teams)]
pub struct NewTeam<'a> {
    pub name: &'a str,
    pub name_key: &'a str,
    pub short_name: Option<&'a str>,
    pub city: Option<&'a str>,
    pub country: Option<&'a str>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::team_seasons)]
pub struct NewTeamSeason {
    pub team_id: i64,
    pub season_id: i64,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::players)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPlayer {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub name_key: String,
    pub birth_date: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub height_cm: Option<i32>,
    // Option is an artifact of Postgres array nullability; elements are
    // never null in practice.
    pub positions: Vec<Option<String>>,
}

impl DbPlayer {
    pub fn full_name(&self) -> String {
        if self.first_name.is_empty() {
            self.last_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }

    /// Legacy single-position view: the first entry of `positions`.
    pub fn primary_position(&self) -> Option<&str> {
        self.positions.iter().flatten().next().map(String::as_str)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::players)]
pub struct NewPlayer<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub name_key: &'a str,
    pub birth_date: Option<NaiveDate>,
    pub nationality: Option<&'a str>,
    pub height_cm: Option<i32>,
    pub positions: Vec<Option<String>>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::player_team_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPlayerTeamHistory {
    pub id: i64,
    pub player_id: i64,
    pub team_id: i64,
    pub season_id: i64,
    pub jersey_number: Option<i32>,
    pub position: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::player_team_history)]
pub struct NewPlayerTeamHistory<'a> {
    pub player_id: i64,
    pub team_id: i64,
    pub season_id: i64,
    pub jersey_number: Option<i32>,
    pub position: Option<&'a str>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::games)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbGame {
    pub id: i64,
    pub season_id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub game_date: NaiveDateTime,
    pub status: String,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub venue: Option<String>,
    pub attendance: Option<i32>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::games)]
pub struct NewGame<'a> {
    pub season_id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub game_date: NaiveDateTime,
    pub status: &'a str,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub venue: Option<&'a str>,
    pub attendance: Option<i32>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::data_schema::data::external_ids)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbExternalId {
    pub id: i64,
    pub entity_type: String,
    pub source: String,
    pub external_id: String,
    pub entity_id: i64,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::external_ids)]
pub struct NewExternalId<'a> {
    pub entity_type: &'a str,
    pub source: &'a str,
    pub external_id: &'a str,
    pub entity_id: i64,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::player_game_stats)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPlayerGameStats {
    pub id: i64,
    pub game_id: i64,
    pub player_id: i64,
    pub team_id: i64,
    pub seconds_played: i32,
    pub is_starter: bool,
    pub points: i32,
    pub fgm: i32,
    pub fga: i32,
    pub two_pm: i32,
    pub two_pa: i32,
    pub three_pm: i32,
    pub three_pa: i32,
    pub ftm: i32,
    pub fta: i32,
    pub oreb: i32,
    pub dreb: i32,
    pub treb: i32,
    pub ast: i32,
    pub tov: i32,
    pub stl: i32,
    pub blk: i32,
    pub pf: i32,
    pub plus_minus: i32,
    pub efficiency: i32,
    pub extra: serde_json::Value,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::player_game_stats)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewPlayerGameStats {
    pub game_id: i64,
    pub player_id: i64,
    pub team_id: i64,
    pub seconds_played: i32,
    pub is_starter: bool,
    pub points: i32,
    pub fgm: i32,
    pub fga: i32,
    pub two_pm: i32,
    pub two_pa: i32,
    pub three_pm: i32,
    pub three_pa: i32,
    pub ftm: i32,
    pub fta: i32,
    pub oreb: i32,
    pub dreb: i32,
    pub treb: i32,
    pub ast: i32,
    pub tov: i32,
    pub stl: i32,
    pub blk: i32,
    pub pf: i32,
    pub plus_minus: i32,
    pub efficiency: i32,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::team_game_stats)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbTeamGameStats {
    pub id: i64,
    pub game_id: i64,
    pub team_id: i64,
    pub points: i32,
    pub fgm: i32,
    pub fga: i32,
    pub two_pm: i32,
    pub two_pa: i32,
    pub three_pm: i32,
    pub three_pa: i32,
    pub ftm: i32,
    pub fta: i32,
    pub oreb: i32,
    pub dreb: i32,
    pub treb: i32,
    pub ast: i32,
    pub tov: i32,
    pub stl: i32,
    pub blk: i32,
    pub pf: i32,
    pub fast_break_points: Option<i32>,
    pub points_in_paint: Option<i32>,
    pub second_chance_points: Option<i32>,
    pub bench_points: Option<i32>,
    pub biggest_lead: Option<i32>,
    pub seconds_leading: Option<i32>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::team_game_stats)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewTeamGameStats {
    pub game_id: i64,
    pub team_id: i64,
    pub points: i32,
    pub fgm: i32,
    pub fga: i32,
    pub two_pm: i32,
    pub two_pa: i32,
    pub three_pm: i32,
    pub three_pa: i32,
    pub ftm: i32,
    pub fta: i32,
    pub oreb: i32,
    pub dreb: i32,
    pub treb: i32,
    pub ast: i32,
    pub tov: i32,
    pub stl: i32,
    pub blk: i32,
    pub pf: i32,
    pub fast_break_points: Option<i32>,
    pub points_in_paint: Option<i32>,
    pub second_chance_points: Option<i32>,
    pub bench_points: Option<i32>,
    pub biggest_lead: Option<i32>,
    pub seconds_leading: Option<i32>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::pbp_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPbpEvent {
    pub id: i64,
    pub game_id: i64,
    pub event_number: i32,
    pub period: i32,
    pub clock: String,
    pub event_type: String,
    pub event_subtype: Option<String>,
    pub player_id: Option<i64>,
    pub team_id: i64,
    pub success: Option<bool>,
    pub coord_x: Option<f64>,
    pub coord_y: Option<f64>,
    pub attributes: serde_json::Value,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::pbp_events)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewPbpEvent {
    pub game_id: i64,
    pub event_number: i32,
    pub period: i32,
    pub clock: String,
    pub event_type: String,
    pub event_subtype: Option<String>,
    pub player_id: Option<i64>,
    pub team_id: i64,
    pub success: Option<bool>,
    pub coord_x: Option<f64>,
    pub coord_y: Option<f64>,
    pub attributes: serde_json::Value,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::pbp_event_links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPbpEventLink {
    pub id: i64,
    pub game_id: i64,
    pub from_event_id: i64,
    pub to_event_id: i64,
    pub relation: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::pbp_event_links)]
pub struct NewPbpEventLink<'a> {
    pub game_id: i64,
    pub from_event_id: i64,
    pub to_event_id: i64,
    pub relation: &'a str,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::player_season_stats)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPlayerSeasonStats {
    pub id: i64,
    pub player_id: i64,
    pub team_id: i64,
    pub season_id: i64,
    pub games_played: i32,
    pub games_started: i32,
    pub seconds_played: i32,
    pub points: i32,
    pub fgm: i32,
    pub fga: i32,
    pub two_pm: i32,
    pub two_pa: i32,
    pub three_pm: i32,
    pub three_pa: i32,
    pub ftm: i32,
    pub fta: i32,
    pub oreb: i32,
    pub dreb: i32,
    pub treb: i32,
    pub ast: i32,
    pub tov: i32,
    pub stl: i32,
    pub blk: i32,
    pub pf: i32,
    pub plus_minus: i32,
    pub efficiency: i32,
    pub avg_seconds: f64,
    pub avg_points: f64,
    pub avg_rebounds: f64,
    pub avg_assists: f64,
    pub avg_steals: f64,
    pub avg_blocks: f64,
    pub avg_turnovers: f64,
    pub avg_fouls: f64,
    pub avg_efficiency: f64,
    pub fg_pct: Option<f64>,
    pub two_pct: Option<f64>,
    pub three_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub ts_pct: Option<f64>,
    pub efg_pct: Option<f64>,
    pub ast_to_ratio: f64,
    pub last_calculated: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::player_season_stats)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewPlayerSeasonStats {
    pub player_id: i64,
    pub team_id: i64,
    pub season_id: i64,
    pub games_played: i32,
    pub games_started: i32,
    pub seconds_played: i32,
    pub points: i32,
    pub fgm: i32,
    pub fga: i32,
    pub two_pm: i32,
    pub two_pa: i32,
    pub three_pm: i32,
    pub three_pa: i32,
    pub ftm: i32,
    pub fta: i32,
    pub oreb: i32,
    pub dreb: i32,
    pub treb: i32,
    pub ast: i32,
    pub tov: i32,
    pub stl: i32,
    pub blk: i32,
    pub pf: i32,
    pub plus_minus: i32,
    pub efficiency: i32,
    pub avg_seconds: f64,
    pub avg_points: f64,
    pub avg_rebounds: f64,
    pub avg_assists: f64,
    pub avg_steals: f64,
    pub avg_blocks: f64,
    pub avg_turnovers: f64,
    pub avg_fouls: f64,
    pub avg_efficiency: f64,
    pub fg_pct: Option<f64>,
    pub two_pct: Option<f64>,
    pub three_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub ts_pct: Option<f64>,
    pub efg_pct: Option<f64>,
    pub ast_to_ratio: f64,
    pub last_calculated: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::info_schema::info::sync_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbSyncLog {
    pub id: i64,
    pub source: String,
    pub entity_type: String,
    pub status: String,
    pub season_id: Option<i64>,
    pub game_id: Option<i64>,
    pub records_processed: i32,
    pub records_created: i32,
    pub records_updated: i32,
    pub records_skipped: i32,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::info_schema::info::sync_logs)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewSyncLog<'a> {
    pub source: &'a str,
    pub entity_type: &'a str,
    pub status: &'a str,
    pub season_id: Option<i64>,
    pub game_id: Option<i64>,
    pub started_at: NaiveDateTime,
}
