//! Per-source configuration types. The ingest crate owns loading these
//! (figment: compiled defaults, then `Hoopsync.toml`, then `HOOPSYNC_`
//! environment variables); adapters just consume the values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const SOURCE_NAMES: [&str; 3] = ["winner", "euroleague", "nbastats"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub enabled: bool,
    pub auto_sync_enabled: bool,
    pub sync_interval_minutes: u32,
    pub api_requests_per_second: f64,
    pub scrape_requests_per_second: f64,
    pub request_timeout_s: u64,
    pub max_retries: u32,
    /// Seasons the scheduler keeps in sync for this source.
    pub season_external_ids: Vec<String>,
    /// Fetch play-by-play along with boxscores on scheduled runs.
    pub include_pbp: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_sync_enabled: false,
            sync_interval_minutes: 60,
            api_requests_per_second: 2.0,
            scrape_requests_per_second: 0.5,
            request_timeout_s: 30,
            max_retries: 3,
            season_external_ids: Vec::new(),
            include_pbp: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Response-cache directory; `None` disables the cache entirely.
    pub cache_dir: Option<PathBuf>,
    /// Bio-field priority chain: sources earlier in this list get first
    /// claim on player biographical fields. Also the scheduler's sync
    /// order.
    pub source_priority: Vec<String>,
    pub winner: SourceConfig,
    pub euroleague: SourceConfig,
    pub nbastats: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            cache_dir: Some(PathBuf::from("./response-cache")),
            source_priority: SOURCE_NAMES.iter().map(|s| s.to_string()).collect(),
            winner: SourceConfig::default(),
            euroleague: SourceConfig::default(),
            nbastats: SourceConfig::default(),
        }
    }
}

impl SourcesConfig {
    pub fn get(&self, source_name: &str) -> Option<&SourceConfig> {
        match source_name {
            "winner" => Some(&self.winner),
            "euroleague" => Some(&self.euroleague),
            "nbastats" => Some(&self.nbastats),
            _ => None,
        }
    }

    /// Configured sources in priority order, deduplicated, unknown names
    /// dropped.
    pub fn sources_in_priority_order(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for name in self.source_priority.iter().map(String::as_str) {
            if SOURCE_NAMES.contains(&name) && !seen.contains(&name) {
                seen.push(name);
            }
        }
        for name in SOURCE_NAMES {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_budgets() {
        let config = SourceConfig::default();
        assert!(config.enabled);
        assert!(!config.auto_sync_enabled);
        assert_eq!(config.api_requests_per_second, 2.0);
        assert_eq!(config.scrape_requests_per_second, 0.5);
        assert_eq!(config.request_timeout_s, 30);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn priority_order_fills_in_missing_sources() {
        let config = SourcesConfig {
            source_priority: vec!["euroleague".to_string(), "bogus".to_string()],
            ..SourcesConfig::default()
        };
        assert_eq!(
            config.sources_in_priority_order(),
            vec!["euroleague", "winner", "nbastats"]
        );
    }

    #[test]
    fn unknown_source_lookup_is_none() {
        let config = SourcesConfig::default();
        assert!(config.get("winner").is_some());
        assert!(config.get("nba2k").is_none());
    }
}
