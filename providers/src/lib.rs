//! Per-source adapters for external basketball-statistics providers.
//!
//! Each adapter hides one provider's transport quirks (rate limits, retry,
//! response caching) and wire formats, emitting the canonical raw records in
//! [`raw`]. Everything downstream of this crate is source-agnostic apart
//! from the `source_name` tag riding on external ids.

pub mod cache;
pub mod config;
pub mod euroleague;
pub mod limiter;
pub mod nbastats;
pub mod normalize;
pub mod raw;
pub mod taxa;
pub mod transport;
pub mod winner;

use crate::cache::ResponseCache;
use crate::config::SourcesConfig;
use crate::raw::{MapError, Mapped, RawBoxScore, RawGame, RawPbpEvent, RawPlayer, RawSeason, RawTeam};
use crate::taxa::GameStatus;
use crate::transport::FetchError;
use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AdapterError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Map(#[from] MapError),
}

impl AdapterError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Fetch(err) if err.is_transient())
    }
}

/// A single-record fetch result carrying the cache's change observation.
#[derive(Debug)]
pub struct Sourced<T> {
    pub value: T,
    /// False when the provider payload hashed identically to the cached
    /// copy, letting the caller skip downstream work.
    pub changed: bool,
}

/// One external provider. List endpoints return per-entry results so a
/// malformed record skips that record, not the response.
#[allow(async_fn_in_trait)]
pub trait SourceAdapter: Send + Sync {
    /// Stable name; the key used in `external_ids` maps.
    fn source_name(&self) -> &'static str;

    async fn get_seasons(&self) -> Result<Vec<Mapped<RawSeason>>, AdapterError>;

    async fn get_teams(
        &self,
        season_external_id: &str,
    ) -> Result<Vec<Mapped<RawTeam>>, AdapterError>;

    async fn get_schedule(
        &self,
        season_external_id: &str,
    ) -> Result<Vec<Mapped<RawGame>>, AdapterError>;

    async fn get_game_boxscore(
        &self,
        game_external_id: &str,
        bypass_cache: bool,
    ) -> Result<Sourced<RawBoxScore>, AdapterError>;

    async fn get_game_pbp(
        &self,
        game_external_id: &str,
        bypass_cache: bool,
    ) -> Result<Sourced<Vec<RawPbpEvent>>, AdapterError>;

    fn is_game_final(&self, game: &RawGame) -> bool {
        game.status == GameStatus::Final
    }

    /// Optional biographical lookup, used by the entity resolver. Sources
    /// without a player endpoint keep the defaults.
    async fn get_player(
        &self,
        _player_external_id: &str,
    ) -> Result<Option<RawPlayer>, AdapterError> {
        Ok(None)
    }

    async fn search_player(
        &self,
        _query: &str,
        _team_external_id: Option<&str>,
    ) -> Result<Vec<RawPlayer>, AdapterError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum BuildAdapterError {
    #[error("unknown source {0:?}")]
    UnknownSource(String),

    #[error("source {0:?} is not enabled")]
    NotEnabled(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] FetchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] cache::CacheError),
}

/// Closed set of configured adapters, dispatched statically.
pub enum AnyAdapter {
    Winner(winner::WinnerAdapter),
    Euroleague(euroleague::EuroleagueAdapter),
    NbaStats(nbastats::NbaStatsAdapter),
}

/// Build the adapter for `source_name`, enforcing the enabled flag, and
/// wiring the shared response cache when configured.
pub fn build_adapter(
    source_name: &str,
    config: &SourcesConfig,
    cache: Option<Arc<ResponseCache>>,
) -> Result<AnyAdapter, BuildAdapterError> {
    let source_config = config
        .get(source_name)
        .ok_or_else(|| BuildAdapterError::UnknownSource(source_name.to_string()))?;
    if !source_config.enabled {
        return Err(BuildAdapterError::NotEnabled(source_name.to_string()));
    }

    Ok(match source_name {
        "winner" => AnyAdapter::Winner(winner::WinnerAdapter::new(source_config, cache)?),
        "euroleague" => {
            AnyAdapter::Euroleague(euroleague::EuroleagueAdapter::new(source_config, cache)?)
        }
        "nbastats" => AnyAdapter::NbaStats(nbastats::NbaStatsAdapter::new(source_config, cache)?),
        other => return Err(BuildAdapterError::UnknownSource(other.to_string())),
    })
}

impl SourceAdapter for AnyAdapter {
    fn source_name(&self) -> &'static str {
        match self {
            AnyAdapter::Winner(a) => a.source_name(),
            AnyAdapter::Euroleague(a) => a.source_name(),
            AnyAdapter::NbaStats(a) => a.source_name(),
        }
    }

    async fn get_seasons(&self) -> Result<Vec<Mapped<RawSeason>>, AdapterError> {
        match self {
            AnyAdapter::Winner(a) => a.get_seasons().await,
            AnyAdapter::Euroleague(a) => a.get_seasons().await,
            AnyAdapter::NbaStats(a) => a.get_seasons().await,
        }
    }

    async fn get_teams(
        &self,
        season_external_id: &str,
    ) -> Result<Vec<Mapped<RawTeam>>, AdapterError> {
        match self {
            AnyAdapter::Winner(a) => a.get_teams(season_external_id).await,
            AnyAdapter::Euroleague(a) => a.get_teams(season_external_id).await,
            AnyAdapter::NbaStats(a) => a.get_teams(season_external_id).await,
        }
    }

    async fn get_schedule(
        &self,
        season_external_id: &str,
    ) -> Result<Vec<Mapped<RawGame>>, AdapterError> {
        match self {
            AnyAdapter::Winner(a) => a.get_schedule(season_external_id).await,
            AnyAdapter::Euroleague(a) => a.get_schedule(season_external_id).await,
            AnyAdapter::NbaStats(a) => a.get_schedule(season_external_id).await,
        }
    }

    async fn get_game_boxscore(
        &self,
        game_external_id: &str,
        bypass_cache: bool,
    ) -> Result<Sourced<RawBoxScore>, AdapterError> {
        match self {
            AnyAdapter::Winner(a) => a.get_game_boxscore(game_external_id, bypass_cache).await,
            AnyAdapter::Euroleague(a) => a.get_game_boxscore(game_external_id, bypass_cache).await,
            AnyAdapter::NbaStats(a) => a.get_game_boxscore(game_external_id, bypass_cache).await,
        }
    }

    async fn get_game_pbp(
        &self,
        game_external_id: &str,
        bypass_cache: bool,
    ) -> Result<Sourced<Vec<RawPbpEvent>>, AdapterError> {
        match self {
            AnyAdapter::Winner(a) => a.get_game_pbp(game_external_id, bypass_cache).await,
            AnyAdapter::Euroleague(a) => a.get_game_pbp(game_external_id, bypass_cache).await,
            AnyAdapter::NbaStats(a) => a.get_game_pbp(game_external_id, bypass_cache).await,
        }
    }

    async fn get_player(
        &self,
        player_external_id: &str,
    ) -> Result<Option<RawPlayer>, AdapterError> {
        match self {
            AnyAdapter::Winner(a) => a.get_player(player_external_id).await,
            AnyAdapter::Euroleague(a) => a.get_player(player_external_id).await,
            AnyAdapter::NbaStats(a) => a.get_player(player_external_id).await,
        }
    }

    async fn search_player(
        &self,
        query: &str,
        team_external_id: Option<&str>,
    ) -> Result<Vec<RawPlayer>, AdapterError> {
        match self {
            AnyAdapter::Winner(a) => a.search_player(query, team_external_id).await,
            AnyAdapter::Euroleague(a) => a.search_player(query, team_external_id).await,
            AnyAdapter::NbaStats(a) => a.search_player(query, team_external_id).await,
        }
    }
}
