//! Durable store interface
//!
//! The keyed entity store the persistence coordinator writes to and
//! the registries read from. The production backend is the SQLite
//! [`Database`](super::Database); tests drive the coordinator against
//! a mock to exercise retry and outcome semantics.

use async_trait::async_trait;

use super::models::{Account, Entity, LinkedCredential, RollingIdList};
use crate::error::Result;

/// One page of an enabled-account scan.
///
/// `next_cursor` is the jid to resume from; `None` means the scan is
/// exhausted.
#[derive(Debug, Clone)]
pub struct AccountPage {
    pub accounts: Vec<Account>,
    pub next_cursor: Option<String>,
}

/// Durable keyed entity store.
///
/// `put` is an idempotent per-entity upsert; it may fail with a
/// transient error or a timeout, both of which the coordinator
/// absorbs. The write-capability flag is administrative: when it is
/// off, the coordinator rejects writes without touching the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch an account by jid.
    async fn get_account(&self, jid: &str) -> Result<Option<Account>>;

    /// Scan enabled accounts, optionally restricted to one shard,
    /// resuming after `cursor` (keyset pagination ordered by jid).
    async fn list_enabled_accounts(
        &self,
        shard: Option<i64>,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<AccountPage>;

    /// All credentials owned by an account; empty for unknown jids.
    async fn credentials_by_account(&self, jid: &str) -> Result<Vec<LinkedCredential>>;

    /// First credential matching (account, screen name).
    async fn find_credential(
        &self,
        jid: &str,
        screen_name: &str,
    ) -> Result<Option<LinkedCredential>>;

    /// Delete a credential by surrogate id. Absent ids are a no-op.
    async fn delete_credential(&self, id: &str) -> Result<()>;

    /// Fetch a rolling ID list by (jid, shard).
    async fn get_id_list(&self, jid: &str, shard: i64) -> Result<Option<RollingIdList>>;

    /// Upsert one entity.
    async fn put(&self, entity: &Entity) -> Result<()>;

    /// Atomically increment a named durable counter.
    ///
    /// # Returns
    /// The post-increment value.
    async fn increment_counter(&self, name: &str) -> Result<i64>;

    /// Administrative write-capability flag.
    fn writes_enabled(&self) -> bool;

    /// Flip the administrative write-capability flag.
    fn set_writes_enabled(&self, enabled: bool);
}
