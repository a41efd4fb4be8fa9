//! Data models
//!
//! Rust structs representing the durable entities and their cached
//! copies. Cached copies are the same structs serialized through
//! serde_json; `persisted` travels with them so a record loaded from
//! the cache still knows it exists in the durable store.

use serde::{Deserialize, Serialize};

use crate::config::AccountDefaults;

// =============================================================================
// Delivery mode bitmask
// =============================================================================

/// Direct messages are delivered
pub const MODE_DM: i64 = 8;
/// Mentions are delivered
pub const MODE_MENTION: i64 = 4;
/// List timeline is delivered
pub const MODE_LIST: i64 = 2;
/// Home timeline is delivered
pub const MODE_HOME: i64 = 1;
/// Nothing is delivered
pub const MODE_NONE: i64 = 0;

// =============================================================================
// Account
// =============================================================================

/// Per-user account record bridging an XMPP identity to bot
/// configuration.
///
/// Identified by the bare JID. The shard is assigned once at creation
/// from the shard counter and never changes; accounts are soft-deleted
/// by clearing `enabled`, never removed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    /// Bridged identity handle (primary key)
    pub jid: String,
    /// Cleared on disable; a disabled account is skipped by schedulers
    pub enabled: bool,
    /// Worker partition, immutable after creation
    pub shard: i64,
    /// Polling interval in scheduler ticks
    pub interval: i64,
    /// Remaining update countdown; seeded with the creation timestamp
    /// (epoch seconds)
    pub last_update: i64,
    /// Consecutive poll failures
    pub retries: i64,
    pub last_list_id: i64,
    pub last_msg_id: i64,
    pub last_mention_id: i64,
    pub last_dm_id: i64,
    pub bold_username: bool,
    pub command_prefix: String,
    pub date_format: String,
    pub locale: String,
    pub timezone: String,
    pub msg_template: String,
    /// Bitmask of MODE_* flags selecting delivered message classes
    pub delivery_modes: i64,
    /// Owner of the linked external list, empty when none
    pub list_user: String,
    pub list_id: i64,
    pub list_name: String,
    pub include_retweets: bool,
    /// True once this record has been seen in the durable store
    #[sqlx(default)]
    #[serde(default)]
    pub persisted: bool,
}

impl Account {
    /// Build a freshly registered account from configured defaults.
    ///
    /// # Arguments
    /// * `jid` - Bridged identity handle
    /// * `shard` - Partition assigned from the shard counter
    /// * `created_at` - Creation time in epoch seconds
    pub fn new(jid: &str, shard: i64, created_at: i64, defaults: &AccountDefaults) -> Self {
        Self {
            jid: jid.to_string(),
            enabled: true,
            shard,
            interval: defaults.interval,
            last_update: created_at,
            retries: 0,
            last_list_id: 0,
            last_msg_id: 0,
            last_mention_id: 0,
            last_dm_id: 0,
            bold_username: true,
            command_prefix: defaults.command_prefix.clone(),
            date_format: defaults.date_format.clone(),
            locale: defaults.locale.clone(),
            timezone: defaults.timezone.clone(),
            msg_template: defaults.msg_template.clone(),
            delivery_modes: MODE_DM | MODE_MENTION,
            list_user: String::new(),
            list_id: 0,
            list_name: String::new(),
            include_retweets: true,
            persisted: false,
        }
    }

    /// Whether a given message class is delivered to this account.
    pub fn delivers(&self, mode: i64) -> bool {
        self.delivery_modes & mode != 0
    }
}

// =============================================================================
// Linked credential
// =============================================================================

/// Access-token material connecting an account to an external-service
/// identity.
///
/// At most one credential exists per (account, screen name) pair;
/// adding a duplicate replaces the old record rather than updating it
/// in place.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LinkedCredential {
    /// Surrogate key (ULID)
    pub id: String,
    /// Owning account JID
    pub account_jid: String,
    /// External display name; empty when the service reported none
    pub screen_name: String,
    pub token_key: String,
    pub token_secret: Option<String>,
    /// True once this record has been seen in the durable store
    #[sqlx(default)]
    #[serde(default)]
    pub persisted: bool,
}

impl LinkedCredential {
    /// Build a new credential with a fresh ULID.
    pub fn new(
        account_jid: &str,
        token_key: &str,
        token_secret: Option<&str>,
        screen_name: &str,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            account_jid: account_jid.to_string(),
            screen_name: screen_name.to_string(),
            token_key: token_key.to_string(),
            token_secret: token_secret.map(|s| s.to_string()),
            persisted: false,
        }
    }

    /// Composite cache key shared by the read and write paths.
    pub fn cache_key(&self) -> String {
        credential_cache_key(&self.account_jid, &self.screen_name)
    }
}

/// Cache key for a credential lookup: `{jid}:{screen_name}`.
pub fn credential_cache_key(account_jid: &str, screen_name: &str) -> String {
    format!("{}:{}", account_jid, screen_name)
}

// =============================================================================
// Rolling ID list
// =============================================================================

/// Sentinel value every slot starts out as.
pub const ID_LIST_SENTINEL: &str = "0";

/// Fixed-capacity recency buffer of previously-seen external IDs,
/// used for dedup within a shard.
///
/// Lives in two representations that are synchronized explicitly:
/// `serialized` (comma-delimited, the persisted and cached form) and
/// `slots` (the in-memory working form). `hydrate` rebuilds `slots`
/// after a load, `pack` rebuilds `serialized` before a store.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RollingIdList {
    /// Owning account JID
    pub jid: String,
    /// Worker partition this list belongs to
    pub shard: i64,
    /// Comma-delimited slot string, the durable form
    pub serialized: String,
    /// Next slot to overwrite, wraps at capacity
    pub pointer: i64,
    /// Working form; rebuilt from `serialized` on load
    #[sqlx(skip)]
    #[serde(skip)]
    pub slots: Vec<String>,
    /// True once this record has been seen in the durable store
    #[sqlx(default)]
    #[serde(default)]
    pub persisted: bool,
}

impl RollingIdList {
    /// Build a fresh list with every slot set to the sentinel.
    pub fn new(jid: &str, shard: i64, capacity: usize) -> Self {
        let slots = vec![ID_LIST_SENTINEL.to_string(); capacity];
        let serialized = slots.join(",");
        Self {
            jid: jid.to_string(),
            shard,
            serialized,
            pointer: 0,
            slots,
            persisted: false,
        }
    }

    /// Rebuild the working `slots` form from the delimited string.
    ///
    /// The rotation pointer is clamped to the rebuilt slot count, so a
    /// row persisted under a larger configured capacity stays usable
    /// after the capacity shrinks.
    pub fn hydrate(&mut self) {
        self.slots = self.serialized.split(',').map(|s| s.to_string()).collect();
        self.pointer = self.pointer.rem_euclid(self.slots.len() as i64);
    }

    /// Rebuild the delimited string from the working `slots` form.
    pub fn pack(&mut self) {
        self.serialized = self.slots.join(",");
    }

    /// Record an ID, overwriting the oldest slot.
    ///
    /// # Returns
    /// `false` if the ID was already present (a duplicate), `true` if
    /// it was written.
    pub fn record(&mut self, id: &str) -> bool {
        if self.slots.iter().any(|slot| slot == id) {
            return false;
        }
        let capacity = self.slots.len() as i64;
        self.slots[self.pointer as usize] = id.to_string();
        self.pointer = (self.pointer + 1) % capacity;
        true
    }
}

// =============================================================================
// Entity envelope
// =============================================================================

/// The durable entity kinds the persistence coordinator accepts.
#[derive(Debug, Clone)]
pub enum Entity {
    Account(Account),
    Credential(LinkedCredential),
    IdList(RollingIdList),
}

impl Entity {
    /// Whether this record already has a durable identity.
    ///
    /// Drives the coordinator's ordering: saved entities refresh the
    /// cache before the put, new entities only after a committed put.
    pub fn is_persisted(&self) -> bool {
        match self {
            Entity::Account(account) => account.persisted,
            Entity::Credential(credential) => credential.persisted,
            Entity::IdList(list) => list.persisted,
        }
    }

    /// Flip the persisted flag after a committed first write.
    pub fn mark_persisted(&mut self) {
        match self {
            Entity::Account(account) => account.persisted = true,
            Entity::Credential(credential) => credential.persisted = true,
            Entity::IdList(list) => list.persisted = true,
        }
    }

    /// Kind label for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Account(_) => "account",
            Entity::Credential(_) => "credential",
            Entity::IdList(_) => "id_list",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_id_list_round_trips_between_representations() {
        let mut list = RollingIdList::new("alice@example.com", 1, 4);
        assert_eq!(list.serialized, "0,0,0,0");

        assert!(list.record("101"));
        assert!(list.record("102"));
        assert!(!list.record("101"), "duplicates are rejected");
        list.pack();
        assert_eq!(list.serialized, "101,102,0,0");
        assert_eq!(list.pointer, 2);

        let mut reloaded = RollingIdList {
            jid: list.jid.clone(),
            shard: list.shard,
            serialized: list.serialized.clone(),
            pointer: list.pointer,
            slots: Vec::new(),
            persisted: true,
        };
        reloaded.hydrate();
        assert_eq!(reloaded.slots, vec!["101", "102", "0", "0"]);
    }

    #[test]
    fn rolling_id_list_pointer_wraps() {
        let mut list = RollingIdList::new("bob@example.com", 0, 2);
        assert!(list.record("1"));
        assert!(list.record("2"));
        assert!(list.record("3"));
        assert_eq!(list.pointer, 1);
        list.pack();
        assert_eq!(list.serialized, "3,2");
    }

    #[test]
    fn hydrate_clamps_pointer_to_the_rebuilt_capacity() {
        let mut list = RollingIdList {
            jid: "alice@example.com".to_string(),
            shard: 1,
            serialized: "7,8".to_string(),
            pointer: 5,
            slots: Vec::new(),
            persisted: true,
        };
        list.hydrate();

        assert_eq!(list.pointer, 1);
        assert!(list.record("9"));
        list.pack();
        assert_eq!(list.serialized, "7,9");
    }

    #[test]
    fn new_account_applies_defaults_and_mask() {
        let defaults = crate::config::AccountDefaults {
            interval: 3,
            command_prefix: "-".to_string(),
            date_format: "%m/%d %H:%M:%S".to_string(),
            locale: "en".to_string(),
            timezone: "UTC".to_string(),
            msg_template: "%user%: %text%".to_string(),
        };
        let account = Account::new("alice@example.com", 2, 1_700_000_000, &defaults);

        assert!(account.enabled);
        assert!(!account.persisted);
        assert_eq!(account.shard, 2);
        assert_eq!(account.last_update, 1_700_000_000);
        assert!(account.delivers(MODE_DM));
        assert!(account.delivers(MODE_MENTION));
        assert!(!account.delivers(MODE_HOME));
        assert!(!account.delivers(MODE_LIST));
    }

    #[test]
    fn cached_copy_keeps_persisted_flag() {
        let mut credential =
            LinkedCredential::new("alice@example.com", "tok", Some("secret"), "birdname");
        credential.persisted = true;

        let value = serde_json::to_value(&credential).unwrap();
        let back: LinkedCredential = serde_json::from_value(value).unwrap();
        assert!(back.persisted);
        assert_eq!(back.cache_key(), "alice@example.com:birdname");
    }
}
