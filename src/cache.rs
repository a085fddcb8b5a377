use anyhow::{Context, Result};
use log::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::api::{self, ApiError, QuotaLimit};

const CACHE_PATH: &str = "~/.tokensight-cache.json";

/// How long a cached snapshot is served without a fresh network call.
pub const CACHE_TTL_MS: i64 = 30_000;

// Written wholesale on every successful fetch. Concurrent statusline
// processes race on this file without locking; a torn read parses as
// garbage and counts as a miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<QuotaLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_limit: Option<QuotaLimit>,
}

#[derive(Debug, Clone, Default)]
pub struct QuotaSnapshot {
    pub token_limit: Option<QuotaLimit>,
    pub monthly_limit: Option<QuotaLimit>,
}

pub struct QuotaCache {
    path: PathBuf,
}

impl QuotaCache {
    pub fn open() -> Result<Self> {
        let path = shellexpand::full(CACHE_PATH)
            .with_context(|| format!("Cache file path {} is invalid", CACHE_PATH))?;
        Ok(Self {
            path: PathBuf::from(path.as_ref()),
        })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Missing, unreadable and unparseable files are all the same: no cache.
    pub fn read(&self) -> Option<CacheEntry> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    // Best effort. A cache that fails to persist must never break a render.
    pub fn write(&self, entry: &CacheEntry) {
        let contents = match serde_json::to_string(entry) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("Could not serialise cache entry: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, contents) {
            debug!("Could not write cache file: {}", e);
        }
    }
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Time-boxed quota fetch: serves the cache while it is younger than
/// [`CACHE_TTL_MS`], otherwise hits the network and overwrites the cache.
/// Failures propagate; the stale-fallback decision belongs to the caller.
pub fn fetch_quota(cache: &QuotaCache, token: &str) -> Result<QuotaSnapshot, ApiError> {
    fetch_quota_at(cache, now_ms(), || api::get_quota_limit(token))
}

fn fetch_quota_at<F>(cache: &QuotaCache, now: i64, fetch: F) -> Result<QuotaSnapshot, ApiError>
where
    F: FnOnce() -> Result<Vec<QuotaLimit>, ApiError>,
{
    if let Some(entry) = cache.read() {
        if now - entry.timestamp < CACHE_TTL_MS {
            debug!("Serving quota from cache");
            return Ok(QuotaSnapshot {
                token_limit: entry.token_limit,
                monthly_limit: entry.monthly_limit,
            });
        }
    }

    let limits = fetch()?;
    // First record per tag wins, ties broken by array order
    let token_limit = limits
        .iter()
        .find(|q| q.limit_type == api::TOKENS_LIMIT)
        .cloned();
    let monthly_limit = limits
        .iter()
        .find(|q| q.limit_type == api::TIME_LIMIT)
        .cloned();
    cache.write(&CacheEntry {
        timestamp: now,
        token_limit: token_limit.clone(),
        monthly_limit: monthly_limit.clone(),
    });
    Ok(QuotaSnapshot {
        token_limit,
        monthly_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn limit(tag: &str, remaining: i64) -> QuotaLimit {
        QuotaLimit {
            limit_type: tag.to_owned(),
            unit: 1,
            number: 200_000_000,
            usage: 25_600_000,
            current_value: 25_600_000,
            remaining,
            percentage: 12.8,
            usage_details: None,
            next_reset_time: Some(1_735_699_200_000),
        }
    }

    fn cache_in(dir: &TempDir) -> QuotaCache {
        QuotaCache::at(dir.path().join("cache.json"))
    }

    #[test]
    fn fresh_cache_is_served_without_a_network_call() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let now = 1_000_000;
        cache.write(&CacheEntry {
            timestamp: now - CACHE_TTL_MS + 1,
            token_limit: Some(limit(api::TOKENS_LIMIT, 174_400_000)),
            monthly_limit: Some(limit(api::TIME_LIMIT, 120)),
        });

        let mut called = false;
        let snapshot = fetch_quota_at(&cache, now, || {
            called = true;
            Ok(vec![])
        })
        .unwrap();

        assert!(!called);
        assert_eq!(snapshot.token_limit.unwrap().remaining, 174_400_000);
        assert_eq!(snapshot.monthly_limit.unwrap().remaining, 120);
    }

    #[test]
    fn stale_cache_is_overwritten_by_a_successful_fetch() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let now = 1_000_000;
        cache.write(&CacheEntry {
            // exactly at the TTL counts as stale
            timestamp: now - CACHE_TTL_MS,
            token_limit: Some(limit(api::TOKENS_LIMIT, 1)),
            monthly_limit: None,
        });

        let snapshot = fetch_quota_at(&cache, now, || {
            Ok(vec![
                limit("SOMETHING_ELSE", 7),
                limit(api::TOKENS_LIMIT, 174_400_000),
                limit(api::TOKENS_LIMIT, 999),
                limit(api::TIME_LIMIT, 120),
            ])
        })
        .unwrap();

        // first match per tag, unknown tags ignored
        assert_eq!(snapshot.token_limit.unwrap().remaining, 174_400_000);
        assert_eq!(snapshot.monthly_limit.unwrap().remaining, 120);

        let entry = cache.read().unwrap();
        assert_eq!(entry.timestamp, now);
        assert_eq!(entry.token_limit.unwrap().remaining, 174_400_000);
        assert_eq!(entry.monthly_limit.unwrap().remaining, 120);
    }

    #[test]
    fn fetch_without_matching_tags_still_overwrites() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let now = 1_000_000;
        cache.write(&CacheEntry {
            timestamp: 0,
            token_limit: Some(limit(api::TOKENS_LIMIT, 5)),
            monthly_limit: None,
        });

        let snapshot = fetch_quota_at(&cache, now, || Ok(vec![limit("OTHER", 9)])).unwrap();
        assert!(snapshot.token_limit.is_none());
        assert!(snapshot.monthly_limit.is_none());

        let entry = cache.read().unwrap();
        assert_eq!(entry.timestamp, now);
        assert!(entry.token_limit.is_none());
    }

    #[test]
    fn fetch_failure_propagates_and_leaves_cache_untouched() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let stale = CacheEntry {
            timestamp: 0,
            token_limit: Some(limit(api::TOKENS_LIMIT, 5)),
            monthly_limit: None,
        };
        cache.write(&stale);

        let result = fetch_quota_at(&cache, 1_000_000, || Err(ApiError::Http(502)));
        assert!(matches!(result, Err(ApiError::Http(502))));
        assert_eq!(cache.read().unwrap(), stale);
    }

    #[test]
    fn corrupt_cache_counts_as_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        std::fs::write(cache.path(), "{definitely not json").unwrap();
        assert!(cache.read().is_none());

        let mut called = false;
        fetch_quota_at(&cache, 1_000_000, || {
            called = true;
            Ok(vec![])
        })
        .unwrap();
        assert!(called);
    }

    #[test]
    fn cache_entry_round_trips_exactly() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let mut token = limit(api::TOKENS_LIMIT, 174_400_000);
        token.usage_details = Some(vec![crate::api::UsageDetail {
            model_code: "search-prime".to_owned(),
            usage: 42,
        }]);
        let entry = CacheEntry {
            timestamp: 1_754_500_000_000,
            token_limit: Some(token),
            monthly_limit: Some(limit(api::TIME_LIMIT, 120)),
        };

        cache.write(&entry);
        assert_eq!(cache.read().unwrap(), entry);
    }
}
