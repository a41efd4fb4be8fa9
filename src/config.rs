//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub sharding: ShardingConfig,
    pub id_list: IdListConfig,
    pub defaults: AccountDefaults,
    pub logging: LoggingConfig,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Volatile cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL for cached entities in seconds (default: 180)
    pub entity_ttl_secs: u64,
    /// TTL for cached status payloads in seconds (default: 86400)
    pub status_ttl_secs: u64,
    /// How many times a failing cache set is attempted (default: 3)
    pub max_set_retries: u32,
}

/// Worker partitioning configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ShardingConfig {
    /// Number of worker partitions accounts are assigned to (default: 4)
    pub shard_count: i64,
    /// Page size for enabled-account scans (default: 200)
    pub scan_page_size: u32,
}

/// Rolling ID list configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IdListConfig {
    /// Fixed slot count of each per-user rolling list (default: 100)
    pub capacity: usize,
}

/// Defaults applied to newly registered accounts
#[derive(Debug, Clone, Deserialize)]
pub struct AccountDefaults {
    /// Polling interval in scheduler ticks (default: 3)
    pub interval: i64,
    /// Command prefix the bot listens for (default: "-")
    pub command_prefix: String,
    /// strftime-style timestamp format
    pub date_format: String,
    /// BCP 47 language tag (default: "en")
    pub locale: String,
    /// IANA timezone name (default: "UTC")
    pub timezone: String,
    /// Message rendering template
    pub msg_template: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (ROOST_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::StoreError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("database.path", "data/roost.db")?
            .set_default("cache.entity_ttl_secs", 180)?
            .set_default("cache.status_ttl_secs", 86400)?
            .set_default("cache.max_set_retries", 3)?
            .set_default("sharding.shard_count", 4)?
            .set_default("sharding.scan_page_size", 200)?
            .set_default("id_list.capacity", 100)?
            .set_default("defaults.interval", 3)?
            .set_default("defaults.command_prefix", "-")?
            .set_default("defaults.date_format", "%m/%d %H:%M:%S")?
            .set_default("defaults.locale", "en")?
            .set_default("defaults.timezone", "UTC")?
            .set_default("defaults.msg_template", "%user%: %text%")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (ROOST_*)
            .add_source(
                Environment::with_prefix("ROOST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::StoreError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::StoreError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::StoreError> {
        if self.sharding.shard_count < 1 {
            return Err(crate::error::StoreError::Config(
                "sharding.shard_count must be at least 1".to_string(),
            ));
        }

        if self.sharding.scan_page_size == 0 {
            return Err(crate::error::StoreError::Config(
                "sharding.scan_page_size must be greater than 0".to_string(),
            ));
        }

        if self.id_list.capacity == 0 {
            return Err(crate::error::StoreError::Config(
                "id_list.capacity must be at least 1".to_string(),
            ));
        }

        if self.cache.max_set_retries == 0 {
            return Err(crate::error::StoreError::Config(
                "cache.max_set_retries must be at least 1".to_string(),
            ));
        }

        if self.sharding.shard_count > 64 {
            tracing::warn!(
                shard_count = self.sharding.shard_count,
                "Unusually high shard count; each shard maps to a scheduler partition"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/roost-test.db"),
            },
            cache: CacheConfig {
                entity_ttl_secs: 180,
                status_ttl_secs: 86_400,
                max_set_retries: 3,
            },
            sharding: ShardingConfig {
                shard_count: 4,
                scan_page_size: 200,
            },
            id_list: IdListConfig { capacity: 20 },
            defaults: AccountDefaults {
                interval: 3,
                command_prefix: "-".to_string(),
                date_format: "%m/%d %H:%M:%S".to_string(),
                locale: "en".to_string(),
                timezone: "UTC".to_string(),
                msg_template: "%user%: %text%".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        let config = valid_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_shards() {
        let mut config = valid_config();
        config.sharding.shard_count = 0;

        let error = config
            .validate()
            .expect_err("a zero shard count must fail validation");
        assert!(matches!(
            error,
            crate::error::StoreError::Config(message)
                if message.contains("sharding.shard_count")
        ));
    }

    #[test]
    fn validate_rejects_empty_id_list() {
        let mut config = valid_config();
        config.id_list.capacity = 0;

        let error = config
            .validate()
            .expect_err("a zero-capacity rolling list must fail validation");
        assert!(matches!(
            error,
            crate::error::StoreError::Config(message)
                if message.contains("id_list.capacity")
        ));
    }

    #[test]
    fn validate_rejects_zero_cache_retries() {
        let mut config = valid_config();
        config.cache.max_set_retries = 0;

        let error = config
            .validate()
            .expect_err("cache sets must be attempted at least once");
        assert!(matches!(
            error,
            crate::error::StoreError::Config(message)
                if message.contains("cache.max_set_retries")
        ));
    }
}
