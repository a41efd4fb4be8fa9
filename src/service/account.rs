//! Account service
//!
//! Registration, lookup, and lifecycle of per-user account records.
//! Reads go cache-then-store; every mutation funnels through the
//! persistence coordinator.

use std::sync::Arc;

use crate::config::{AccountDefaults, ShardingConfig};
use crate::data::{
    Account, AccountPage, CacheItem, Coordinator, Entity, Namespace, WriteOutcome,
};
use crate::error::Result;

/// Name of the durable counter driving shard assignment.
const SHARD_COUNTER: &str = "accounts";

/// Account service
#[derive(Clone)]
pub struct AccountService {
    coordinator: Arc<Coordinator>,
    shard_count: i64,
    scan_page_size: u32,
    defaults: AccountDefaults,
}

impl AccountService {
    /// Create new account service
    pub fn new(
        coordinator: Arc<Coordinator>,
        sharding: &ShardingConfig,
        defaults: &AccountDefaults,
    ) -> Self {
        Self {
            coordinator,
            shard_count: sharding.shard_count,
            scan_page_size: sharding.scan_page_size,
            defaults: defaults.clone(),
        }
    }

    /// Register a new account.
    ///
    /// Increments the shard counter and assigns
    /// `shard = counter % shard_count`, so registration order spreads
    /// accounts evenly over the worker partitions. The record is
    /// returned immediately; the durable write follows the
    /// coordinator's retry policy and its outcome is logged, not
    /// awaited-on by callers.
    ///
    /// # Errors
    /// Returns error if the shard counter cannot be incremented.
    pub async fn add(&self, jid: &str) -> Result<Account> {
        let count = self.coordinator.store().increment_counter(SHARD_COUNTER).await?;
        let shard = count % self.shard_count;
        let created_at = chrono::Utc::now().timestamp();

        let mut account = Account::new(jid, shard, created_at, &self.defaults);
        let outcome = self
            .coordinator
            .durable_write(&Entity::Account(account.clone()))
            .await;
        account.persisted = outcome.is_committed();

        tracing::info!(jid = %jid, shard, outcome = outcome.as_str(), "Account registered");
        Ok(account)
    }

    /// Look up an account by jid.
    ///
    /// Checks the volatile cache first, falls back to the durable
    /// store and repopulates the cache on a hit. A confirmed store
    /// miss is final; no stale cache entry is served past it.
    pub async fn get_by_jid(&self, jid: &str) -> Result<Option<Account>> {
        if let Some(value) = self.coordinator.cache().get(jid, Namespace::Jid).await {
            if let Ok(account) = serde_json::from_value::<Account>(value) {
                return Ok(Some(account));
            }
            // Undecodable entries are dropped and re-read from the store.
            self.coordinator.cache().remove(jid, Namespace::Jid).await;
        }

        match self.coordinator.store().get_account(jid).await? {
            Some(account) => {
                self.coordinator
                    .cache_write(CacheItem::Account(&account))
                    .await;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    /// Scan enabled accounts for batch schedulers.
    ///
    /// # Arguments
    /// * `shard` - Restrict the scan to one worker partition
    /// * `cursor` - Resume token from the previous page
    ///
    /// # Returns
    /// One page plus the cursor to resume from; `next_cursor = None`
    /// when the scan is exhausted.
    pub async fn list_enabled(
        &self,
        shard: Option<i64>,
        cursor: Option<String>,
    ) -> Result<AccountPage> {
        self.coordinator
            .store()
            .list_enabled_accounts(shard, cursor, self.scan_page_size)
            .await
    }

    /// Write an updated account through the coordinator.
    pub async fn save(&self, account: &Account) -> WriteOutcome {
        self.coordinator
            .durable_write(&Entity::Account(account.clone()))
            .await
    }

    /// Soft-delete an account by clearing its enabled flag.
    ///
    /// # Returns
    /// `Ok(None)` when no such account exists (the operation is a
    /// no-op), otherwise the write outcome.
    pub async fn disable(&self, jid: &str) -> Result<Option<WriteOutcome>> {
        let Some(mut account) = self.get_by_jid(jid).await? else {
            return Ok(None);
        };

        account.enabled = false;
        let outcome = self.save(&account).await;
        tracing::info!(jid = %jid, outcome = outcome.as_str(), "Account disabled");
        Ok(Some(outcome))
    }
}
