use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use providers::config::SourcesConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub db_pool_size: u32,
    /// Soft per-transaction deadline, enforced via `statement_timeout`.
    pub statement_timeout_s: i64,
    /// Concurrent in-flight game fetches per sync run. The token bucket is
    /// the real throttle; this just bounds buffered payloads.
    pub game_fetch_concurrency: usize,
    pub sources: SourcesConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            db_pool_size: 10,
            statement_timeout_s: 60,
            game_fetch_concurrency: 4,
            sources: SourcesConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("Hoopsync.toml"))
            .merge(Env::prefixed("HOOPSYNC_").split("__"))
    }

    pub fn config() -> figment::Result<Self> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = IngestConfig::default();
        assert_eq!(config.statement_timeout_s, 60);
        assert!(config.game_fetch_concurrency >= 1);
        assert!(config.sources.get("winner").is_some());
    }
}
