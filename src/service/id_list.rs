//! Rolling ID list service
//!
//! Per-user dedup buffers, memoized in a process-local table. The
//! table entry is authoritative while it exists: `set` mutates only
//! the table, and nothing reaches the durable store until `flush`.
//! That decoupling is deliberate: a list is mutated once per delivered
//! message but flushed once per poll cycle, so the write amplification
//! of persisting every mutation is avoided at the price of losing
//! unflushed mutations on process restart.
//!
//! The table lock is held across the whole load path, so two
//! concurrent loads for the same jid serialize and exactly one live
//! copy can exist per process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::data::{CacheItem, Coordinator, Entity, Namespace, RollingIdList, WriteOutcome};
use crate::error::Result;
use crate::metrics::ID_LISTS_LIVE;

/// Rolling ID list service
#[derive(Clone)]
pub struct IdListService {
    coordinator: Arc<Coordinator>,
    capacity: usize,
    live: Arc<Mutex<HashMap<String, RollingIdList>>>,
}

impl IdListService {
    /// Create new rolling ID list service
    pub fn new(coordinator: Arc<Coordinator>, capacity: usize) -> Self {
        Self {
            coordinator,
            capacity,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create and persist a fresh sentinel-filled list for (jid, shard).
    ///
    /// The new list is returned but not installed in the live table;
    /// installation happens on the first `get_by_jid`.
    pub async fn add(&self, jid: &str, shard: i64) -> RollingIdList {
        let mut list = RollingIdList::new(jid, shard, self.capacity);
        let outcome = self
            .coordinator
            .durable_write(&Entity::IdList(list.clone()))
            .await;
        list.persisted = outcome.is_committed();
        list
    }

    /// Load the list for (jid, shard), creating it if absent.
    ///
    /// Three-tier lookup: live table (authoritative) → volatile cache
    /// → durable store. Whichever tier resolves, the working slots are
    /// rebuilt from the delimited string and the record becomes the
    /// single live copy for this jid. A clone of that copy is
    /// returned; hand it back via [`set`](Self::set) after mutating.
    pub async fn get_by_jid(&self, jid: &str, shard: i64) -> Result<RollingIdList> {
        let mut live = self.live.lock().await;
        if let Some(list) = live.get(jid) {
            return Ok(list.clone());
        }

        let mut list = match self.load(jid, shard).await? {
            Some(list) => list,
            None => self.add(jid, shard).await,
        };
        list.hydrate();

        live.insert(jid.to_string(), list.clone());
        ID_LISTS_LIVE.set(live.len() as i64);
        Ok(list)
    }

    /// Cache-then-store lookup, repopulating the cache on a store hit.
    async fn load(&self, jid: &str, shard: i64) -> Result<Option<RollingIdList>> {
        if let Some(value) = self
            .coordinator
            .cache()
            .get(jid, Namespace::ShortIdList)
            .await
        {
            if let Ok(list) = serde_json::from_value::<RollingIdList>(value) {
                return Ok(Some(list));
            }
            self.coordinator
                .cache()
                .remove(jid, Namespace::ShortIdList)
                .await;
        }

        match self.coordinator.store().get_id_list(jid, shard).await? {
            Some(list) => {
                self.coordinator.cache_write(CacheItem::IdList(&list)).await;
                Ok(Some(list))
            }
            None => Ok(None),
        }
    }

    /// Install an updated list as the live copy for its jid.
    ///
    /// Packs the working slots back into the delimited string; no
    /// cache or store write happens here.
    pub async fn set(&self, jid: &str, mut list: RollingIdList) {
        list.pack();
        let mut live = self.live.lock().await;
        live.insert(jid.to_string(), list);
        ID_LISTS_LIVE.set(live.len() as i64);
    }

    /// Persist the live copy and evict it from the table.
    ///
    /// The entry is removed under a single lock acquisition before the
    /// durable write starts, so a `set` landing while the write is in
    /// flight installs a fresh live copy that stays due for its own
    /// flush instead of being evicted unpersisted.
    ///
    /// This is the only path that makes `set` mutations durable.
    ///
    /// # Returns
    /// The write outcome, or `None` when no live copy existed.
    pub async fn flush(&self, jid: &str) -> Option<WriteOutcome> {
        let list = {
            let mut live = self.live.lock().await;
            let list = live.remove(jid)?;
            ID_LISTS_LIVE.set(live.len() as i64);
            list
        };

        let outcome = self.coordinator.durable_write(&Entity::IdList(list)).await;
        Some(outcome)
    }
}
