//! Persistence coordinator
//!
//! The single chokepoint every mutation funnels through. It owns the
//! two consistency rules of this crate:
//!
//! - cache writes are advisory: classified by kind, retried a bounded
//!   number of times, then abandoned;
//! - durable writes retry transient store errors until success for as
//!   long as writes are administratively enabled, and report an
//!   explicit tri-state outcome instead of raising.
//!
//! Ordering: an already-persisted entity refreshes its cache entry
//! before the put, so the cached value in flight is at least as new as
//! the pending write (a narrow staleness window is accepted, and
//! documented, in exchange for simplicity). A new entity is put first
//! and cached only once the put committed, so a key the store rejects
//! never appears in the cache.

use std::sync::Arc;
use std::time::Duration;

use super::cache::{Namespace, StateCache};
use super::models::{Account, Entity, LinkedCredential, RollingIdList};
use super::store::EntityStore;
use crate::config::CacheConfig;
use crate::metrics::{CACHE_SET_FAILURES_TOTAL, STORE_WRITES_TOTAL, STORE_WRITE_RETRIES_TOTAL};

// =============================================================================
// Write outcome
// =============================================================================

/// Result of a durable write.
///
/// Callers must treat anything other than `Committed` as
/// fire-and-forget: the record may or may not have reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The store accepted the put.
    Committed,
    /// A timeout or deadline signal interrupted the attempt; the write
    /// may have landed.
    Unconfirmed,
    /// Writes are administratively disabled; the store was not touched.
    Rejected,
}

impl WriteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, WriteOutcome::Committed)
    }

    /// Label used for metrics and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOutcome::Committed => "committed",
            WriteOutcome::Unconfirmed => "unconfirmed",
            WriteOutcome::Rejected => "rejected",
        }
    }
}

// =============================================================================
// Cacheable items
// =============================================================================

/// What `cache_write` accepts: the three durable entity kinds plus raw
/// status payloads (JSON objects carrying an `id_str`).
#[derive(Debug, Clone, Copy)]
pub enum CacheItem<'a> {
    Account(&'a Account),
    Credential(&'a LinkedCredential),
    IdList(&'a RollingIdList),
    Status(&'a serde_json::Value),
}

impl Entity {
    /// The cacheable view of this entity.
    pub fn cache_item(&self) -> CacheItem<'_> {
        match self {
            Entity::Account(account) => CacheItem::Account(account),
            Entity::Credential(credential) => CacheItem::Credential(credential),
            Entity::IdList(list) => CacheItem::IdList(list),
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Persistence coordinator
pub struct Coordinator {
    store: Arc<dyn EntityStore>,
    cache: Arc<dyn StateCache>,
    entity_ttl: Duration,
    status_ttl: Duration,
    max_set_retries: u32,
}

impl Coordinator {
    /// Create a coordinator over the given store and cache adapters.
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<dyn StateCache>,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            store,
            cache,
            entity_ttl: Duration::from_secs(cache_config.entity_ttl_secs),
            status_ttl: Duration::from_secs(cache_config.status_ttl_secs),
            max_set_retries: cache_config.max_set_retries,
        }
    }

    /// The durable store this coordinator writes to.
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// The volatile cache this coordinator writes through.
    pub fn cache(&self) -> &Arc<dyn StateCache> {
        &self.cache
    }

    /// Classify an item and write it to the volatile cache.
    ///
    /// The network-level set is attempted up to the configured retry
    /// bound and then abandoned; the cache is advisory, never a
    /// correctness requirement.
    ///
    /// # Returns
    /// `true` if the value was cached, `false` if it was unrecognized
    /// or the retries were exhausted.
    pub async fn cache_write(&self, item: CacheItem<'_>) -> bool {
        let Some((namespace, key, ttl, value)) = self.classify(item) else {
            return false;
        };

        for attempt in 1..=self.max_set_retries {
            if self.cache.set(&key, value.clone(), ttl, namespace).await {
                return true;
            }
            tracing::debug!(
                namespace = namespace.as_str(),
                key = %key,
                attempt,
                "Cache set failed"
            );
        }

        CACHE_SET_FAILURES_TOTAL
            .with_label_values(&[namespace.as_str()])
            .inc();
        false
    }

    /// Namespace/key/TTL policy for each cacheable kind.
    fn classify(
        &self,
        item: CacheItem<'_>,
    ) -> Option<(Namespace, String, Duration, serde_json::Value)> {
        match item {
            CacheItem::Account(account) => Some((
                Namespace::Jid,
                account.jid.clone(),
                self.entity_ttl,
                serde_json::to_value(account).ok()?,
            )),
            CacheItem::Credential(credential) => Some((
                Namespace::TwitterName,
                credential.cache_key(),
                self.entity_ttl,
                serde_json::to_value(credential).ok()?,
            )),
            CacheItem::IdList(list) => Some((
                Namespace::ShortIdList,
                list.jid.clone(),
                self.entity_ttl,
                serde_json::to_value(list).ok()?,
            )),
            CacheItem::Status(payload) => {
                let id = payload.get("id_str")?.as_str()?;
                Some((
                    Namespace::Status,
                    id.to_string(),
                    self.status_ttl,
                    payload.clone(),
                ))
            }
        }
    }

    /// Write an entity to the durable store, keeping the cache in step.
    ///
    /// Transient store errors are absorbed and retried for as long as
    /// writes remain enabled; a timeout or deadline signal ends the
    /// attempt with `Unconfirmed`. Nothing is raised to the caller.
    pub async fn durable_write(&self, entity: &Entity) -> WriteOutcome {
        let outcome = if entity.is_persisted() {
            self.cache_write(entity.cache_item()).await;
            self.put_with_retry(entity).await
        } else {
            let outcome = self.put_with_retry(entity).await;
            if outcome.is_committed() {
                // The record now exists durably; cache it as such.
                let mut committed = entity.clone();
                committed.mark_persisted();
                self.cache_write(committed.cache_item()).await;
            }
            outcome
        };

        STORE_WRITES_TOTAL
            .with_label_values(&[entity.kind(), outcome.as_str()])
            .inc();
        if !outcome.is_committed() {
            tracing::warn!(
                kind = entity.kind(),
                outcome = outcome.as_str(),
                "Durable write not confirmed"
            );
        }

        outcome
    }

    async fn put_with_retry(&self, entity: &Entity) -> WriteOutcome {
        loop {
            if !self.store.writes_enabled() {
                return WriteOutcome::Rejected;
            }

            match self.store.put(entity).await {
                Ok(()) => return WriteOutcome::Committed,
                Err(error) if error.is_transient() => {
                    STORE_WRITE_RETRIES_TOTAL
                        .with_label_values(&[entity.kind()])
                        .inc();
                    tracing::debug!(
                        kind = entity.kind(),
                        error = %error,
                        "Transient store error, retrying put"
                    );
                    // Let other tasks make progress between attempts.
                    tokio::task::yield_now().await;
                }
                Err(error) => {
                    tracing::warn!(
                        kind = entity.kind(),
                        error = %error,
                        "Durable put gave up"
                    );
                    return WriteOutcome::Unconfirmed;
                }
            }
        }
    }
}
