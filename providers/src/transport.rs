//! Shared HTTP plumbing for every adapter: hard request timeouts, token
//! buckets per channel, retry with exponential backoff for transient
//! failures, and response-cache integration.

use crate::cache::{CacheError, CacheKey, ResponseCache};
use crate::config::SourceConfig;
use crate::limiter::TokenBucket;
use log::{debug, warn};
use miette::Diagnostic;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(10);

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("error building {source_name} HTTP client")]
    ClientBuild {
        source_name: &'static str,
        #[source]
        err: reqwest::Error,
    },

    #[error("error building {source_name} request")]
    RequestBuild {
        source_name: &'static str,
        #[source]
        err: reqwest::Error,
    },

    #[error("{source_name} request kept failing after {attempts} attempt(s)")]
    Transient {
        source_name: &'static str,
        attempts: u32,
        #[source]
        last: reqwest::Error,
    },

    #[error("{source_name} rejected the request with status {status}")]
    Permanent {
        source_name: &'static str,
        status: u16,
        #[source]
        err: reqwest::Error,
    },

    #[error("error deserializing {source_name} response")]
    Deserialize {
        source_name: &'static str,
        #[source]
        err: serde_json::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// API endpoints and scraped pages get separate token budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Api,
    Scrape,
}

/// A fetched-and-parsed payload plus whether its content differed from the
/// cached copy. `changed == false` lets the orchestrator skip downstream
/// work for that record.
#[derive(Debug)]
pub struct Fetched {
    pub body: serde_json::Value,
    pub changed: bool,
}

pub struct Transport {
    source_name: &'static str,
    client: reqwest::Client,
    api_bucket: TokenBucket,
    scrape_bucket: TokenBucket,
    cache: Option<Arc<ResponseCache>>,
    max_retries: u32,
}

impl Transport {
    pub fn new(
        source_name: &'static str,
        config: &SourceConfig,
        cache: Option<Arc<ResponseCache>>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_s))
            .build()
            .map_err(|err| FetchError::ClientBuild { source_name, err })?;

        Ok(Self {
            source_name,
            client,
            api_bucket: TokenBucket::new(
                config.api_requests_per_second,
                config.api_requests_per_second.ceil().max(1.0) as u32,
            ),
            scrape_bucket: TokenBucket::new(
                config.scrape_requests_per_second,
                config.scrape_requests_per_second.ceil().max(1.0) as u32,
            ),
            cache,
            max_retries: config.max_retries,
        })
    }

    pub fn source_name(&self) -> &'static str {
        self.source_name
    }

    /// One rate-limited, retried GET returning parsed JSON. Transient
    /// failures (timeout, connect, 5xx, 429) retry with exponential
    /// backoff up to the configured cap; anything else fails immediately.
    pub async fn get_json(
        &self,
        channel: Channel,
        endpoint: &str,
        params: &[(&str, String)],
        bypass_cache: bool,
    ) -> Result<Fetched, FetchError> {
        let bucket = match channel {
            Channel::Api => &self.api_bucket,
            Channel::Scrape => &self.scrape_bucket,
        };

        let mut attempts = 0u32;
        let bytes = loop {
            bucket.acquire().await;
            attempts += 1;
            match self.try_get(endpoint, params).await {
                Ok(bytes) => break bytes,
                Err(TryGetError::Permanent(err)) => return Err(err),
                Err(TryGetError::Transient(last)) => {
                    if attempts > self.max_retries {
                        return Err(FetchError::Transient {
                            source_name: self.source_name,
                            attempts,
                            last,
                        });
                    }
                    let backoff =
                        BACKOFF_CAP.min(BACKOFF_BASE * 2u32.saturating_pow(attempts - 1));
                    warn!(
                        "{} request to {endpoint} failed transiently ({last}); retrying in {backoff:?}",
                        self.source_name,
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        let changed = match (&self.cache, bypass_cache) {
            (Some(cache), false) => {
                let key = CacheKey {
                    source: self.source_name,
                    endpoint,
                    params,
                };
                let outcome = cache.store(&key, &bytes)?;
                if !outcome.changed {
                    debug!(
                        "{} response for {endpoint} is unchanged since the last fetch",
                        self.source_name,
                    );
                }
                outcome.changed
            }
            _ => true,
        };

        let body = serde_json::from_slice(&bytes).map_err(|err| FetchError::Deserialize {
            source_name: self.source_name,
            err,
        })?;

        Ok(Fetched { body, changed })
    }

    async fn try_get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<u8>, TryGetError> {
        let request = self
            .client
            .get(endpoint)
            .query(params)
            .build()
            .map_err(|err| {
                TryGetError::Permanent(FetchError::RequestBuild {
                    source_name: self.source_name,
                    err,
                })
            })?;

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            // Timeouts and connection failures are worth retrying; a
            // request that cannot even be sent is not.
            Err(err) if err.is_timeout() || err.is_connect() => {
                return Err(TryGetError::Transient(err));
            }
            Err(err) => {
                return Err(TryGetError::Permanent(FetchError::Permanent {
                    source_name: self.source_name,
                    status: 0,
                    err,
                }));
            }
        };

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            let err = response
                .error_for_status()
                .expect_err("5xx/429 always maps to an error");
            return Err(TryGetError::Transient(err));
        }
        if let Err(err) = response.error_for_status_ref() {
            return Err(TryGetError::Permanent(FetchError::Permanent {
                source_name: self.source_name,
                status: status.as_u16(),
                err,
            }));
        }

        match response.bytes().await {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(err) => Err(TryGetError::Transient(err)),
        }
    }
}

enum TryGetError {
    Transient(reqwest::Error),
    Permanent(FetchError),
}
