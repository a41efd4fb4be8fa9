//! Linked-credential service
//!
//! Access-token records tying an account to its external-service
//! identities. Uniqueness per (account, screen name) is enforced by
//! replacement: adding over an existing pair deletes the old record
//! and creates a fresh one, never updates in place.

use std::sync::Arc;

use crate::data::{
    CacheItem, Coordinator, Entity, LinkedCredential, Namespace, WriteOutcome,
    credential_cache_key,
};
use crate::error::Result;

/// Credential service
#[derive(Clone)]
pub struct CredentialService {
    coordinator: Arc<Coordinator>,
}

impl CredentialService {
    /// Create new credential service
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// All credentials linked to an account.
    ///
    /// An account that was never saved simply has none; this is an
    /// empty vec, not an error.
    pub async fn list_by_account(&self, jid: &str) -> Result<Vec<LinkedCredential>> {
        self.coordinator.store().credentials_by_account(jid).await
    }

    /// Link a credential, replacing any existing one for the same
    /// (account, screen name) pair.
    ///
    /// # Arguments
    /// * `jid` - Owning account
    /// * `token_key` - Access-token key (required)
    /// * `token_secret` - Access-token secret
    /// * `screen_name` - External display name, if the service
    ///   reported one
    pub async fn add(
        &self,
        jid: &str,
        token_key: &str,
        token_secret: Option<&str>,
        screen_name: Option<&str>,
    ) -> Result<WriteOutcome> {
        let screen_name = screen_name.unwrap_or_default();

        if let Some(existing) = self.get_by_screen_name(Some(screen_name), jid).await? {
            self.coordinator.store().delete_credential(&existing.id).await?;
            // The row is gone; the cached copy must not outlive it in
            // case the replacement write does not commit.
            self.coordinator
                .cache()
                .remove(&credential_cache_key(jid, screen_name), Namespace::TwitterName)
                .await;
            tracing::debug!(
                jid = %jid,
                screen_name = %screen_name,
                "Replaced existing credential"
            );
        }

        let credential = LinkedCredential::new(jid, token_key, token_secret, screen_name);
        Ok(self
            .coordinator
            .durable_write(&Entity::Credential(credential))
            .await)
    }

    /// Look up a credential by (screen name, account).
    ///
    /// Cache-then-store with repopulation, like the account read path.
    pub async fn get_by_screen_name(
        &self,
        screen_name: Option<&str>,
        jid: &str,
    ) -> Result<Option<LinkedCredential>> {
        let screen_name = screen_name.unwrap_or_default();
        let key = credential_cache_key(jid, screen_name);

        if let Some(value) = self
            .coordinator
            .cache()
            .get(&key, Namespace::TwitterName)
            .await
        {
            if let Ok(credential) = serde_json::from_value::<LinkedCredential>(value) {
                return Ok(Some(credential));
            }
            self.coordinator
                .cache()
                .remove(&key, Namespace::TwitterName)
                .await;
        }

        match self
            .coordinator
            .store()
            .find_credential(jid, screen_name)
            .await?
        {
            Some(credential) => {
                self.coordinator
                    .cache_write(CacheItem::Credential(&credential))
                    .await;
                Ok(Some(credential))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::data::{Database, MemoryCache};
    use tempfile::TempDir;

    async fn create_service() -> (CredentialService, Arc<Coordinator>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("service-credential.db");
        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        let cache = Arc::new(MemoryCache::new());
        let coordinator = Arc::new(Coordinator::new(
            db,
            cache,
            &CacheConfig {
                entity_ttl_secs: 180,
                status_ttl_secs: 86_400,
                max_set_retries: 3,
            },
        ));
        let service = CredentialService::new(coordinator.clone());
        (service, coordinator, temp_dir)
    }

    #[tokio::test]
    async fn unknown_account_has_no_credentials() {
        let (service, _coordinator, _temp_dir) = create_service().await;
        let credentials = service.list_by_account("ghost@example.com").await.unwrap();
        assert!(credentials.is_empty());
    }

    #[tokio::test]
    async fn add_then_lookup_by_screen_name() {
        let (service, _coordinator, _temp_dir) = create_service().await;

        let outcome = service
            .add("alice@example.com", "key-1", Some("secret-1"), Some("birdname"))
            .await
            .unwrap();
        assert!(outcome.is_committed());

        let found = service
            .get_by_screen_name(Some("birdname"), "alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.token_key, "key-1");
        assert_eq!(found.token_secret.as_deref(), Some("secret-1"));
        assert!(found.persisted);

        let absent = service
            .get_by_screen_name(Some("nobody"), "alice@example.com")
            .await
            .unwrap();
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn duplicate_add_replaces_instead_of_erroring() {
        let (service, _coordinator, _temp_dir) = create_service().await;

        service
            .add("alice@example.com", "key-1", Some("secret-1"), Some("birdname"))
            .await
            .unwrap();
        service
            .add("alice@example.com", "key-2", None, Some("birdname"))
            .await
            .unwrap();

        let credentials = service.list_by_account("alice@example.com").await.unwrap();
        assert_eq!(credentials.len(), 1, "exactly one credential per pair");
        assert_eq!(credentials[0].token_key, "key-2");
        assert_eq!(credentials[0].token_secret, None);

        // An anonymous credential (no screen name) is its own pair.
        service
            .add("alice@example.com", "key-3", None, None)
            .await
            .unwrap();
        let credentials = service.list_by_account("alice@example.com").await.unwrap();
        assert_eq!(credentials.len(), 2);

        let anonymous = service
            .get_by_screen_name(None, "alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(anonymous.token_key, "key-3");
    }

    #[tokio::test]
    async fn replacement_drops_the_stale_cache_entry_when_rewrite_is_rejected() {
        let (service, coordinator, _temp_dir) = create_service().await;

        service
            .add("alice@example.com", "key-1", None, Some("birdname"))
            .await
            .unwrap();
        // Warm the cache with the soon-to-be-deleted credential.
        service
            .get_by_screen_name(Some("birdname"), "alice@example.com")
            .await
            .unwrap()
            .unwrap();

        // Replacement deletes the old row, then the rewrite is
        // administratively rejected.
        coordinator.store().set_writes_enabled(false);
        let outcome = service
            .add("alice@example.com", "key-2", None, Some("birdname"))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Rejected);

        // The deleted credential must not be served from the cache.
        assert!(
            service
                .get_by_screen_name(Some("birdname"), "alice@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn lookup_populates_the_cache_for_the_next_read() {
        let (service, coordinator, _temp_dir) = create_service().await;

        service
            .add("alice@example.com", "key-1", None, Some("birdname"))
            .await
            .unwrap();

        let key = credential_cache_key("alice@example.com", "birdname");
        coordinator
            .cache()
            .remove(&key, Namespace::TwitterName)
            .await;

        // Store hit repopulates the cache under the composite key.
        service
            .get_by_screen_name(Some("birdname"), "alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(
            coordinator
                .cache()
                .get(&key, Namespace::TwitterName)
                .await
                .is_some()
        );
    }
}
