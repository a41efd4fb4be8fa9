//! Volatile cache
//!
//! Namespaced, TTL-based key-value cache in front of the durable
//! store. Cache content is advisory: it is cleared on restart, may be
//! briefly stale, and correctness never depends on it. Uses Moka for
//! high-performance concurrent caching.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;

// =============================================================================
// Namespaces
// =============================================================================

/// Cache namespaces, one per cached kind.
///
/// The namespace determines both the key space and the TTL policy
/// applied by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Account records keyed by JID
    Jid,
    /// Linked credentials keyed by `{jid}:{screen_name}`
    TwitterName,
    /// Rolling ID lists keyed by JID
    ShortIdList,
    /// Raw status payloads keyed by their `id_str`
    Status,
}

impl Namespace {
    /// Label used for metrics and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Jid => "jid",
            Namespace::TwitterName => "twitter_name",
            Namespace::ShortIdList => "short_id_list",
            Namespace::Status => "status",
        }
    }
}

// =============================================================================
// Cache interface
// =============================================================================

/// Volatile cache the persistence layer writes through.
///
/// `set` reports success so the coordinator can apply its bounded
/// retry; a failed set is never an error, the entry is simply absent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateCache: Send + Sync {
    /// Look up a cached value.
    async fn get(&self, key: &str, namespace: Namespace) -> Option<serde_json::Value>;

    /// Store a value with the given time-to-live.
    ///
    /// # Returns
    /// `true` if the value was accepted.
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
        namespace: Namespace,
    ) -> bool;

    /// Drop a cached value if present.
    async fn remove(&self, key: &str, namespace: Namespace);
}

// =============================================================================
// In-process Moka backend
// =============================================================================

#[derive(Clone)]
struct CachedEntry {
    value: serde_json::Value,
    ttl: Duration,
}

/// Per-entry expiration: each entry carries the TTL the coordinator
/// asked for.
struct EntryTtl;

impl moka::Expiry<String, CachedEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process cache backend built on Moka.
///
/// One cache per namespace so eviction and the size gauge stay
/// independent, mirroring how a memcached deployment would segment by
/// namespace.
pub struct MemoryCache {
    jid: Cache<String, CachedEntry>,
    twitter_name: Cache<String, CachedEntry>,
    short_id_list: Cache<String, CachedEntry>,
    status: Cache<String, CachedEntry>,
}

impl MemoryCache {
    /// Create the four namespace caches.
    pub fn new() -> Self {
        Self {
            jid: Self::build_cache(),
            twitter_name: Self::build_cache(),
            short_id_list: Self::build_cache(),
            status: Self::build_cache(),
        }
    }

    fn build_cache() -> Cache<String, CachedEntry> {
        Cache::builder().expire_after(EntryTtl).build()
    }

    fn cache_for(&self, namespace: Namespace) -> &Cache<String, CachedEntry> {
        match namespace {
            Namespace::Jid => &self.jid,
            Namespace::TwitterName => &self.twitter_name,
            Namespace::ShortIdList => &self.short_id_list,
            Namespace::Status => &self.status,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateCache for MemoryCache {
    async fn get(&self, key: &str, namespace: Namespace) -> Option<serde_json::Value> {
        let result = self.cache_for(namespace).get(key).await;

        // Record cache hit/miss
        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&[namespace.as_str()]).inc();
        } else {
            CACHE_MISSES_TOTAL
                .with_label_values(&[namespace.as_str()])
                .inc();
        }

        result.map(|entry| entry.value)
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
        namespace: Namespace,
    ) -> bool {
        let cache = self.cache_for(namespace);
        cache
            .insert(key.to_string(), CachedEntry { value, ttl })
            .await;

        use crate::metrics::CACHE_SIZE;
        CACHE_SIZE
            .with_label_values(&[namespace.as_str()])
            .set(cache.entry_count() as i64);

        true
    }

    async fn remove(&self, key: &str, namespace: Namespace) {
        self.cache_for(namespace).invalidate(key).await;
    }
}
