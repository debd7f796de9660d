//! API Response Cache
//!
//! Path-scoped caching of remote API GET responses.
//! Keys are SHA256(token + path) so cached data never crosses sessions;
//! the path is stored alongside each entry so mutations can revalidate by prefix.

use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
}

/// Cached response entry
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// API path the body was fetched from
    pub path: String,
    pub body: serde_json::Value,
}

/// Path-scoped response cache
#[derive(Clone)]
pub struct ApiCache {
    cache: Cache<String, CachedResponse>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    enabled: bool,
}

impl ApiCache {
    /// Create new cache with TTL
    pub fn new(max_entries: u64, ttl_secs: u64, enabled: bool) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .support_invalidation_closures()
            .build();

        Self {
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            enabled,
        }
    }

    /// Cache that never stores anything
    pub fn disabled() -> Self {
        Self::new(1, 1, false)
    }

    /// Compute cache key from bearer token and API path
    pub fn compute_key(token: &str, path: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.update(b"\n");
        hasher.update(path.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Get cached response
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        if !self.enabled {
            return None;
        }

        if let Some(response) = self.cache.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(path = %response.path, "Cache HIT: {}", &key[..16]);
            Some(response)
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache MISS: {}", &key[..16]);
            None
        }
    }

    /// Store response in cache
    pub async fn set(&self, key: &str, response: CachedResponse) {
        if !self.enabled {
            return;
        }

        debug!(path = %response.path, "Cache SET: {}", &key[..16]);
        self.cache.insert(key.to_string(), response).await;
    }

    /// Drop every entry fetched from `prefix` or below it
    pub fn revalidate_path(&self, prefix: &str) {
        let prefix = prefix.trim_end_matches('/').to_string();
        debug!(prefix = %prefix, "Revalidating cached path");

        let result = self.cache.invalidate_entries_if(move |_, entry| {
            entry
                .path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']))
        });

        if let Err(e) = result {
            // Predicate registration only fails without invalidation closures
            tracing::warn!("Path revalidation unavailable, clearing cache: {}", e);
            self.cache.invalidate_all();
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            entries: self.cache.entry_count(),
            hits,
            misses,
            hit_rate_percent: if total > 0 {
                (hits as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        }
    }

    /// Clear all entries
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Flush pending invalidations (used by tests to observe counts)
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}
