//! SQLite database operations
//!
//! The production [`EntityStore`] backend. All durable access goes
//! through this module; the pool is shared and every statement is a
//! single self-contained upsert or read, which is what makes the
//! coordinator's retry-until-success loop safe to run against it.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Sqlite, SqlitePool};

use super::models::{Account, Entity, LinkedCredential, RollingIdList};
use super::store::{AccountPage, EntityStore};
use crate::error::{Result, StoreError};

/// Database connection pool wrapper.
///
/// Carries the administrative write-capability flag: flipping it off
/// makes the coordinator reject durable writes without reaching the
/// store, the escape hatch for maintenance windows.
pub struct Database {
    pool: Pool<Sqlite>,
    writes_enabled: AtomicBool,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            StoreError::Internal(anyhow::anyhow!("Migration failed: {}", e))
        })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self {
            pool,
            writes_enabled: AtomicBool::new(true),
        })
    }

    // =========================================================================
    // Upserts
    // =========================================================================

    /// Create or update an account.
    ///
    /// The shard column is deliberately absent from the conflict
    /// branch: shard assignment is immutable after creation.
    async fn upsert_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                jid, enabled, shard, interval, last_update, retries,
                last_list_id, last_msg_id, last_mention_id, last_dm_id,
                bold_username, command_prefix, date_format, locale, timezone,
                msg_template, delivery_modes, list_user, list_id, list_name,
                include_retweets
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(jid) DO UPDATE SET
                enabled = excluded.enabled,
                interval = excluded.interval,
                last_update = excluded.last_update,
                retries = excluded.retries,
                last_list_id = excluded.last_list_id,
                last_msg_id = excluded.last_msg_id,
                last_mention_id = excluded.last_mention_id,
                last_dm_id = excluded.last_dm_id,
                bold_username = excluded.bold_username,
                command_prefix = excluded.command_prefix,
                date_format = excluded.date_format,
                locale = excluded.locale,
                timezone = excluded.timezone,
                msg_template = excluded.msg_template,
                delivery_modes = excluded.delivery_modes,
                list_user = excluded.list_user,
                list_id = excluded.list_id,
                list_name = excluded.list_name,
                include_retweets = excluded.include_retweets
            "#,
        )
        .bind(&account.jid)
        .bind(account.enabled)
        .bind(account.shard)
        .bind(account.interval)
        .bind(account.last_update)
        .bind(account.retries)
        .bind(account.last_list_id)
        .bind(account.last_msg_id)
        .bind(account.last_mention_id)
        .bind(account.last_dm_id)
        .bind(account.bold_username)
        .bind(&account.command_prefix)
        .bind(&account.date_format)
        .bind(&account.locale)
        .bind(&account.timezone)
        .bind(&account.msg_template)
        .bind(account.delivery_modes)
        .bind(&account.list_user)
        .bind(account.list_id)
        .bind(&account.list_name)
        .bind(account.include_retweets)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_credential(&self, credential: &LinkedCredential) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO credentials (
                id, account_jid, screen_name, token_key, token_secret
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&credential.id)
        .bind(&credential.account_jid)
        .bind(&credential.screen_name)
        .bind(&credential.token_key)
        .bind(&credential.token_secret)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_id_list(&self, list: &RollingIdList) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO id_lists (jid, shard, serialized, pointer)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(jid, shard) DO UPDATE SET
                serialized = excluded.serialized,
                pointer = excluded.pointer
            "#,
        )
        .bind(&list.jid)
        .bind(list.shard)
        .bind(&list.serialized)
        .bind(list.pointer)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl EntityStore for Database {
    async fn get_account(&self, jid: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE jid = ?")
            .bind(jid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account.map(|mut account| {
            account.persisted = true;
            account
        }))
    }

    async fn list_enabled_accounts(
        &self,
        shard: Option<i64>,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<AccountPage> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM accounts WHERE enabled = 1");
        if let Some(shard) = shard {
            query.push(" AND shard = ").push_bind(shard);
        }
        if let Some(cursor) = cursor {
            query.push(" AND jid > ").push_bind(cursor);
        }
        query.push(" ORDER BY jid LIMIT ").push_bind(limit as i64);

        let mut accounts = query
            .build_query_as::<Account>()
            .fetch_all(&self.pool)
            .await?;
        for account in &mut accounts {
            account.persisted = true;
        }

        let next_cursor = if accounts.len() == limit as usize {
            accounts.last().map(|account| account.jid.clone())
        } else {
            None
        };

        Ok(AccountPage {
            accounts,
            next_cursor,
        })
    }

    async fn credentials_by_account(&self, jid: &str) -> Result<Vec<LinkedCredential>> {
        let mut credentials = sqlx::query_as::<_, LinkedCredential>(
            "SELECT * FROM credentials WHERE account_jid = ? ORDER BY id",
        )
        .bind(jid)
        .fetch_all(&self.pool)
        .await?;
        for credential in &mut credentials {
            credential.persisted = true;
        }

        Ok(credentials)
    }

    async fn find_credential(
        &self,
        jid: &str,
        screen_name: &str,
    ) -> Result<Option<LinkedCredential>> {
        let credential = sqlx::query_as::<_, LinkedCredential>(
            "SELECT * FROM credentials WHERE account_jid = ? AND screen_name = ? LIMIT 1",
        )
        .bind(jid)
        .bind(screen_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential.map(|mut credential| {
            credential.persisted = true;
            credential
        }))
    }

    async fn delete_credential(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM credentials WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_id_list(&self, jid: &str, shard: i64) -> Result<Option<RollingIdList>> {
        let list = sqlx::query_as::<_, RollingIdList>(
            "SELECT * FROM id_lists WHERE jid = ? AND shard = ?",
        )
        .bind(jid)
        .bind(shard)
        .fetch_optional(&self.pool)
        .await?;

        Ok(list.map(|mut list| {
            list.persisted = true;
            list
        }))
    }

    async fn put(&self, entity: &Entity) -> Result<()> {
        match entity {
            Entity::Account(account) => self.upsert_account(account).await,
            Entity::Credential(credential) => self.upsert_credential(credential).await,
            Entity::IdList(list) => self.upsert_id_list(list).await,
        }
    }

    async fn increment_counter(&self, name: &str) -> Result<i64> {
        let value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO counters (name, value) VALUES (?, 1)
            ON CONFLICT(name) DO UPDATE SET value = value + 1
            RETURNING value
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }

    fn writes_enabled(&self) -> bool {
        self.writes_enabled.load(Ordering::SeqCst)
    }

    fn set_writes_enabled(&self, enabled: bool) {
        self.writes_enabled.store(enabled, Ordering::SeqCst);
        tracing::warn!(enabled, "Administrative write capability changed");
    }
}
