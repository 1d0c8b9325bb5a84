//! Response cache with content-hash change detection.
//!
//! Every outbound fetch is keyed by `(source, endpoint, params)`. The cache
//! stores the raw payload plus its SHA-256 hash; storing a refetched payload
//! reports whether the content actually changed so the orchestrator can
//! short-circuit downstream work. Observed "unchanged" is monotonic within
//! one run: once a key has been seen unchanged it keeps reporting unchanged
//! until the next run begins, even if a late concurrent fetch raced in a
//! different payload.

use chrono::{DateTime, Utc};
use hashbrown::HashSet;
use log::warn;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    #[error("error opening response cache")]
    Open(#[source] sled::Error),

    #[error("error reading response cache")]
    Get(#[source] sled::Error),

    #[error("error writing response cache")]
    Put(#[source] sled::Error),

    #[error("error removing invalid response cache entry")]
    Remove(#[source] sled::Error),

    #[error("error encoding response cache entry")]
    Encode(#[source] rmp_serde::encode::Error),
}

/// Request signature: the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey<'a> {
    pub source: &'a str,
    pub endpoint: &'a str,
    pub params: &'a [(&'a str, String)],
}

impl CacheKey<'_> {
    pub fn signature(&self) -> String {
        let mut sig = format!("{}|{}", self.source, self.endpoint);
        for (name, value) in self.params {
            sig.push('|');
            sig.push_str(name);
            sig.push('=');
            sig.push_str(value);
        }
        sig
    }
}

#[derive(Debug, Serialize, Deserialize)]
enum VersionedCacheEntry {
    V0(CacheRecord),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub fetched_at: DateTime<Utc>,
    pub content_hash: [u8; 32],
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOutcome {
    /// False when the refetched payload hashed identically to the cached
    /// one, i.e. downstream work can be skipped.
    pub changed: bool,
}

pub struct ResponseCache {
    db: sled::Db,
    unchanged_this_run: Mutex<HashSet<String>>,
}

fn content_hash(payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.finalize().into()
}

impl ResponseCache {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let db = sled::open(path).map_err(CacheError::Open)?;
        Ok(Self {
            db,
            unchanged_this_run: Mutex::new(HashSet::new()),
        })
    }

    /// Forget this run's monotonic "unchanged" observations. Called by the
    /// orchestrator at the start of each sync run.
    pub fn begin_run(&self) {
        self.unchanged_this_run
            .lock()
            .expect("unchanged-set mutex poisoned")
            .clear();
    }

    pub fn lookup(&self, key: &CacheKey) -> Result<Option<CacheRecord>, CacheError> {
        let signature = key.signature();
        let Some(bytes) = self.db.get(&signature).map_err(CacheError::Get)? else {
            return Ok(None);
        };
        match rmp_serde::from_slice(&bytes) {
            Ok(VersionedCacheEntry::V0(record)) => Ok(Some(record)),
            Err(err) => {
                warn!("Cache entry {signature:?} could not be decoded ({err}); removing it");
                self.db.remove(&signature).map_err(CacheError::Remove)?;
                Ok(None)
            }
        }
    }

    /// Store a freshly fetched payload and report whether it differs from
    /// the previously cached content. Last writer wins on the payload.
    pub fn store(&self, key: &CacheKey, payload: &[u8]) -> Result<StoreOutcome, CacheError> {
        let signature = key.signature();
        let hash = content_hash(payload);

        let prior = self.lookup(key)?;
        let mut changed = match prior {
            Some(record) => record.content_hash != hash,
            None => true,
        };

        {
            let mut unchanged = self
                .unchanged_this_run
                .lock()
                .expect("unchanged-set mutex poisoned");
            if unchanged.contains(&signature) {
                changed = false;
            } else if !changed {
                unchanged.insert(signature.clone());
            }
        }

        let record = VersionedCacheEntry::V0(CacheRecord {
            fetched_at: Utc::now(),
            content_hash: hash,
            payload: payload.to_vec(),
        });
        let encoded = rmp_serde::to_vec(&record).map_err(CacheError::Encode)?;
        self.db
            .insert(signature.as_str(), encoded)
            .map_err(CacheError::Put)?;

        Ok(StoreOutcome { changed })
    }

    pub fn flush(&self) -> Result<(), CacheError> {
        self.db.flush().map_err(CacheError::Put)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache() -> ResponseCache {
        let dir = std::env::temp_dir().join(format!(
            "hoopsync-cache-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        ResponseCache::open(dir).unwrap()
    }

    fn key<'a>(params: &'a [(&'a str, String)]) -> CacheKey<'a> {
        CacheKey {
            source: "winner",
            endpoint: "https://api.example/schedule",
            params,
        }
    }

    #[test]
    fn first_store_is_changed_refetch_is_not() {
        let cache = temp_cache();
        let params = [("season", "2024-25".to_string())];
        let key = key(&params);

        assert!(cache.store(&key, b"payload-a").unwrap().changed);
        assert!(!cache.store(&key, b"payload-a").unwrap().changed);
        assert!(cache.store(&key, b"payload-b").unwrap().changed);
    }

    #[test]
    fn unchanged_is_monotonic_within_a_run() {
        let cache = temp_cache();
        let params = [("game", "g1".to_string())];
        let key = key(&params);

        cache.store(&key, b"v1").unwrap();
        assert!(!cache.store(&key, b"v1").unwrap().changed);
        // Same run: a racing fetch that saw different bytes must not
        // re-trigger downstream work.
        assert!(!cache.store(&key, b"v2").unwrap().changed);

        cache.begin_run();
        assert!(cache.store(&key, b"v3").unwrap().changed);
    }

    #[test]
    fn lookup_returns_latest_payload() {
        let cache = temp_cache();
        let params = [("game", "g2".to_string())];
        let key = key(&params);

        assert!(cache.lookup(&key).unwrap().is_none());
        cache.store(&key, b"bytes").unwrap();
        let record = cache.lookup(&key).unwrap().unwrap();
        assert_eq!(record.payload, b"bytes");
        assert_eq!(record.content_hash, super::content_hash(b"bytes"));
    }

    #[test]
    fn signatures_distinguish_params() {
        let p1 = [("season", "a".to_string())];
        let p2 = [("season", "b".to_string())];
        assert_ne!(key(&p1).signature(), key(&p2).signature());
    }
}
