//! Roost - persistence and caching layer for a per-user bridge-bot
//! state service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                           │
//! │  - Account registry (registration, shard assignment)        │
//! │  - Linked-credential registry (replace-on-conflict)         │
//! │  - Rolling ID lists (process-local, flush-on-demand)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Persistence Coordinator                     │
//! │  - write-through cache invalidation                         │
//! │  - bounded cache retry / unbounded transient-put retry      │
//! │  - tri-state write outcomes                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                             │
//! │  - SQLite (sqlx)                                            │
//! │  - Volatile namespaced cache (Moka)                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `service`: the registries the bot layer talks to
//! - `data`: store, cache, and coordinator
//! - `config`: configuration management
//! - `error`: error types
//! - `metrics`: Prometheus instruments

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Shared handle over the whole persistence layer
///
/// Cloned freely by the bot layer; all clones share one database
/// pool, one cache, one coordinator, and one live id-list table.
#[derive(Clone)]
pub struct StateStore {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Durable store (SQLite)
    pub db: Arc<data::Database>,

    /// Persistence coordinator (the write chokepoint)
    pub coordinator: Arc<data::Coordinator>,

    /// Account registry
    pub accounts: service::AccountService,

    /// Linked-credential registry
    pub credentials: service::CredentialService,

    /// Rolling ID list registry
    pub id_lists: service::IdListService,
}

impl StateStore {
    /// Initialize the persistence layer
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Build the volatile cache
    /// 3. Wire coordinator and registries
    ///
    /// # Errors
    /// Returns error if the database connection or migration fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::StoreError> {
        tracing::info!("Initializing persistence layer...");

        let config = Arc::new(config);
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        let cache = Arc::new(data::MemoryCache::new());

        let coordinator = Arc::new(data::Coordinator::new(
            db.clone(),
            cache,
            &config.cache,
        ));

        let accounts = service::AccountService::new(
            coordinator.clone(),
            &config.sharding,
            &config.defaults,
        );
        let credentials = service::CredentialService::new(coordinator.clone());
        let id_lists = service::IdListService::new(coordinator.clone(), config.id_list.capacity);

        tracing::info!(
            shard_count = config.sharding.shard_count,
            id_list_capacity = config.id_list.capacity,
            "Persistence layer ready"
        );

        Ok(Self {
            config,
            db,
            coordinator,
            accounts,
            credentials,
            id_lists,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data::EntityStore;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> config::AppConfig {
        config::AppConfig {
            database: config::DatabaseConfig {
                path: temp_dir.path().join("state.db"),
            },
            cache: config::CacheConfig {
                entity_ttl_secs: 180,
                status_ttl_secs: 86_400,
                max_set_retries: 3,
            },
            sharding: config::ShardingConfig {
                shard_count: 4,
                scan_page_size: 200,
            },
            id_list: config::IdListConfig { capacity: 8 },
            defaults: config::AccountDefaults {
                interval: 3,
                command_prefix: "-".to_string(),
                date_format: "%m/%d %H:%M:%S".to_string(),
                locale: "en".to_string(),
                timezone: "UTC".to_string(),
                msg_template: "%user%: %text%".to_string(),
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn registration_disable_scan_scenario() {
        let temp_dir = TempDir::new().unwrap();
        let store = StateStore::new(test_config(&temp_dir)).await.unwrap();

        // Counter pre-increment is 0, so the first account lands on
        // shard (0 + 1) % 4 = 1.
        let alice = store.accounts.add("alice@example.com").await.unwrap();
        assert_eq!(alice.shard, 1);

        store
            .credentials
            .add("alice@example.com", "tok", Some("secret"), Some("alice_bird"))
            .await
            .unwrap();

        let mut list = store
            .id_lists
            .get_by_jid("alice@example.com", alice.shard)
            .await
            .unwrap();
        assert!(list.record("9001"));
        store.id_lists.set("alice@example.com", list).await;
        store.id_lists.flush("alice@example.com").await.unwrap();

        store.accounts.disable("alice@example.com").await.unwrap();
        let reloaded = store
            .accounts
            .get_by_jid("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(!reloaded.enabled);
        assert_eq!(reloaded.shard, 1, "shard never changes after creation");

        let enabled = store.accounts.list_enabled(None, None).await.unwrap();
        assert!(enabled.accounts.is_empty());

        let credential = store
            .credentials
            .get_by_screen_name(Some("alice_bird"), "alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(credential.token_key, "tok");
    }

    #[tokio::test]
    async fn writes_disabled_rejects_but_reads_still_work() {
        let temp_dir = TempDir::new().unwrap();
        let store = StateStore::new(test_config(&temp_dir)).await.unwrap();

        let account = store.accounts.add("alice@example.com").await.unwrap();

        store.db.set_writes_enabled(false);
        let outcome = store.accounts.save(&account).await;
        assert_eq!(outcome, data::WriteOutcome::Rejected);

        // Reads are unaffected by the administrative flag.
        assert!(
            store
                .accounts
                .get_by_jid("alice@example.com")
                .await
                .unwrap()
                .is_some()
        );

        store.db.set_writes_enabled(true);
        assert!(store.accounts.save(&account).await.is_committed());
    }
}
