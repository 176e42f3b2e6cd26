//! Account and log collection operations.

use crate::clock::{iso_millis, Clock};
use crate::config::PagerConfig;
use crate::error::{CoreError, CoreResult};
use crate::keys::{logs_key, user_key, username_from_key, USER_PREFIX};
use crate::pager::Pager;
use crate::record::AccountRecord;
use crate::snapshot::SnapshotManager;
use routelog_storage::KeyValueStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Payload returned for a token with no saved logs.
pub const EMPTY_LOGS: &str = "[]";

/// Hashes a password as lowercase hex SHA-256.
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Credentials issued at signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupReceipt {
    /// Session token; also keys the account's logs.
    pub token: String,
    /// Key for resetting a forgotten password.
    pub reset_key: String,
}

/// Account lifecycle on top of the key-value store.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    snapshots: SnapshotManager,
    pager: PagerConfig,
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("snapshots", &self.snapshots)
            .field("pager", &self.pager)
            .finish_non_exhaustive()
    }
}

impl AccountService {
    /// Creates a service over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let snapshots = SnapshotManager::new(store.clone(), clock.clone());
        Self {
            store,
            clock,
            snapshots,
            pager: PagerConfig::default(),
        }
    }

    /// Sets the enumeration settings for user and snapshot listings.
    #[must_use]
    pub fn with_pager_config(mut self, pager: PagerConfig) -> Self {
        self.snapshots = self.snapshots.with_pager_config(pager.clone());
        self.pager = pager;
        self
    }

    /// Returns the snapshot manager used for deletes and restores.
    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::UsernameTaken`] if any record, live or
    /// soft-deleted, exists under the name.
    pub async fn signup(&self, username: &str, password: &str) -> CoreResult<SignupReceipt> {
        require("username", username)?;
        require("password", password)?;

        let key = user_key(username);
        if self.store.get(&key).await?.is_some() {
            return Err(CoreError::UsernameTaken {
                username: username.to_string(),
            });
        }

        let receipt = SignupReceipt {
            token: Uuid::new_v4().to_string(),
            reset_key: Uuid::new_v4().to_string(),
        };
        let record = AccountRecord::new(
            hash_password(password),
            receipt.token.clone(),
            receipt.reset_key.clone(),
            iso_millis(self.clock.now()),
        );
        self.store.put(&key, &record.to_json()?, None).await?;

        info!(username, "account created");
        Ok(receipt)
    }

    /// Checks a password and returns the session token.
    ///
    /// A stored plaintext password that matches is replaced by its hash.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] for unknown or soft-deleted accounts,
    /// [`CoreError::InvalidCredentials`] for a wrong password.
    pub async fn login(&self, username: &str, password: &str) -> CoreResult<String> {
        let (key, mut record) = self.load_live(username).await?;
        let hashed = hash_password(password);

        if record.password != hashed {
            if record.password != password {
                return Err(CoreError::InvalidCredentials);
            }
            record.password = hashed;
            self.store.put(&key, &record.to_json()?, None).await?;
            info!(username, "upgraded legacy password");
        }

        if let Some(token) = record.log_token() {
            return Ok(token.to_string());
        }
        let token = Uuid::new_v4().to_string();
        record.token = Some(token.clone());
        self.store.put(&key, &record.to_json()?, None).await?;
        debug!(username, "issued missing session token");
        Ok(token)
    }

    /// Changes the password of a signed-in account.
    ///
    /// `current` may match either the stored hash or a legacy plaintext
    /// password.
    ///
    /// # Errors
    ///
    /// [`CoreError::Unauthorized`] on a token or password mismatch.
    pub async fn change_password(
        &self,
        username: &str,
        token: &str,
        current: &str,
        new_password: &str,
    ) -> CoreResult<()> {
        require("new password", new_password)?;
        let (key, mut record) = self.load_live(username).await?;

        let password_ok = record.password == current || record.password == hash_password(current);
        if record.log_token() != Some(token) || !password_ok {
            return Err(CoreError::Unauthorized);
        }

        record.password = hash_password(new_password);
        self.store.put(&key, &record.to_json()?, None).await?;
        info!(username, "password changed");
        Ok(())
    }

    /// Sets a new password using the account's reset key.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidCredentials`] if the reset key does not match.
    pub async fn reset_password(
        &self,
        username: &str,
        reset_key: &str,
        new_password: &str,
    ) -> CoreResult<()> {
        require("new password", new_password)?;
        let (key, mut record) = self.load_live(username).await?;

        if reset_key.is_empty() || record.reset_key.as_deref() != Some(reset_key) {
            return Err(CoreError::InvalidCredentials);
        }

        record.password = hash_password(new_password);
        self.store.put(&key, &record.to_json()?, None).await?;
        info!(username, "password reset");
        Ok(())
    }

    /// Sets a temporary password without any credential check.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if no record exists.
    pub async fn admin_reset_password(&self, username: &str, temp_password: &str) -> CoreResult<()> {
        require("temporary password", temp_password)?;
        let key = user_key(username);
        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("account {username}")))?;
        let mut record = AccountRecord::parse(&key, &raw)?;

        record.password = hash_password(temp_password);
        self.store.put(&key, &record.to_json()?, None).await?;
        info!(username, "password reset by admin");
        Ok(())
    }

    /// Soft-deletes a signed-in account after checking its credentials.
    ///
    /// # Errors
    ///
    /// [`CoreError::Unauthorized`] on a token or password mismatch.
    pub async fn delete_account(&self, username: &str, token: &str, password: &str) -> CoreResult<()> {
        let (_, record) = self.load_live(username).await?;
        if record.log_token() != Some(token) || record.password != hash_password(password) {
            return Err(CoreError::Unauthorized);
        }

        if !self.snapshots.soft_delete(username).await? {
            // Gone between the check and the delete.
            return Err(CoreError::not_found(format!("account {username}")));
        }
        Ok(())
    }

    /// Returns every username with a record, live or soft-deleted.
    ///
    /// # Errors
    ///
    /// Store errors propagate.
    pub async fn list_users(&self) -> CoreResult<Vec<String>> {
        let keys = Pager::new(self.store.as_ref(), self.pager.clone())
            .collect_keys(USER_PREFIX)
            .await?;
        Ok(keys
            .iter()
            .filter_map(|key| username_from_key(key))
            .map(str::to_string)
            .collect())
    }

    /// Returns the saved logs for `token`, or `[]` when there are none.
    ///
    /// # Errors
    ///
    /// Store errors propagate.
    pub async fn load_logs(&self, token: &str) -> CoreResult<String> {
        require("token", token)?;
        Ok(self
            .store
            .get(&logs_key(token))
            .await?
            .unwrap_or_else(|| EMPTY_LOGS.to_string()))
    }

    /// Replaces the saved logs for `token`.
    ///
    /// # Errors
    ///
    /// Store errors propagate.
    pub async fn save_logs(&self, token: &str, body: &str) -> CoreResult<()> {
        require("token", token)?;
        self.store.put(&logs_key(token), body, None).await?;
        debug!(bytes = body.len(), "logs saved");
        Ok(())
    }

    async fn load_live(&self, username: &str) -> CoreResult<(String, AccountRecord)> {
        let key = user_key(username);
        let not_found = || CoreError::not_found(format!("account {username}"));

        let raw = self.store.get(&key).await?.ok_or_else(not_found)?;
        let record = AccountRecord::parse(&key, &raw)?;
        if record.is_marked_deleted() {
            return Err(not_found());
        }
        Ok((key, record))
    }
}

fn require(what: &str, value: &str) -> CoreResult<()> {
    if value.is_empty() {
        return Err(CoreError::invalid_input(format!("missing {what}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use routelog_storage::InMemoryKvStore;

    fn service() -> (Arc<InMemoryKvStore>, AccountService) {
        let kv = Arc::new(InMemoryKvStore::new());
        let clock = Arc::new(ManualClock::from_millis(1_714_532_400_000));
        (kv.clone(), AccountService::new(kv, clock))
    }

    #[test]
    fn hash_is_lowercase_hex_sha256() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn signup_then_login() {
        let (kv, accounts) = service();
        let receipt = accounts.signup("amy", "pw").await.unwrap();

        let raw = kv.get("user:amy").await.unwrap().unwrap();
        let record = AccountRecord::parse("user:amy", &raw).unwrap();
        assert_eq!(record.password, hash_password("pw"));
        assert_eq!(record.created_at.as_deref(), Some("2024-05-01T03:00:00.000Z"));

        assert_eq!(accounts.login("amy", "pw").await.unwrap(), receipt.token);
        assert!(matches!(
            accounts.login("amy", "nope").await,
            Err(CoreError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.login("bob", "pw").await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn signup_rejects_taken_and_empty() {
        let (_kv, accounts) = service();
        accounts.signup("amy", "pw").await.unwrap();
        assert!(matches!(
            accounts.signup("amy", "other").await,
            Err(CoreError::UsernameTaken { .. })
        ));
        assert!(matches!(
            accounts.signup("", "pw").await,
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn login_upgrades_plaintext() {
        let (kv, accounts) = service();
        kv.put("user:old", r#"{"password":"secret","token":"t"}"#, None)
            .await
            .unwrap();

        assert_eq!(accounts.login("old", "secret").await.unwrap(), "t");
        let record = AccountRecord::parse("user:old", &kv.get("user:old").await.unwrap().unwrap())
            .unwrap();
        assert_eq!(record.password, hash_password("secret"));
        // Still works once hashed.
        assert_eq!(accounts.login("old", "secret").await.unwrap(), "t");
    }

    #[tokio::test]
    async fn change_password_checks_token_and_password() {
        let (_kv, accounts) = service();
        let receipt = accounts.signup("amy", "pw").await.unwrap();

        assert!(matches!(
            accounts.change_password("amy", "wrong", "pw", "new").await,
            Err(CoreError::Unauthorized)
        ));
        assert!(matches!(
            accounts.change_password("amy", &receipt.token, "bad", "new").await,
            Err(CoreError::Unauthorized)
        ));

        accounts
            .change_password("amy", &receipt.token, "pw", "new")
            .await
            .unwrap();
        assert!(accounts.login("amy", "new").await.is_ok());
    }

    #[tokio::test]
    async fn reset_with_key() {
        let (_kv, accounts) = service();
        let receipt = accounts.signup("amy", "pw").await.unwrap();

        assert!(matches!(
            accounts.reset_password("amy", "nope", "x").await,
            Err(CoreError::InvalidCredentials)
        ));
        accounts
            .reset_password("amy", &receipt.reset_key, "fresh")
            .await
            .unwrap();
        assert!(accounts.login("amy", "fresh").await.is_ok());
    }

    #[tokio::test]
    async fn admin_reset() {
        let (_kv, accounts) = service();
        accounts.signup("amy", "pw").await.unwrap();
        accounts.admin_reset_password("amy", "temp").await.unwrap();
        assert!(accounts.login("amy", "temp").await.is_ok());
        assert!(matches!(
            accounts.admin_reset_password("ghost", "temp").await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_account_is_soft() {
        let (kv, accounts) = service();
        let receipt = accounts.signup("amy", "pw").await.unwrap();
        accounts.save_logs(&receipt.token, "[1]").await.unwrap();

        assert!(matches!(
            accounts.delete_account("amy", &receipt.token, "bad").await,
            Err(CoreError::Unauthorized)
        ));
        accounts
            .delete_account("amy", &receipt.token, "pw")
            .await
            .unwrap();

        assert!(kv.get("user:amy").await.unwrap().is_some());
        assert!(matches!(
            accounts.login("amy", "pw").await,
            Err(CoreError::NotFound { .. })
        ));
        assert_eq!(accounts.list_users().await.unwrap(), vec!["amy"]);

        assert!(accounts.snapshots().restore("amy", None).await.unwrap());
        assert_eq!(accounts.login("amy", "pw").await.unwrap(), receipt.token);
        assert_eq!(accounts.load_logs(&receipt.token).await.unwrap(), "[1]");
    }

    #[tokio::test]
    async fn logs_default_to_empty_array() {
        let (_kv, accounts) = service();
        assert_eq!(accounts.load_logs("t").await.unwrap(), EMPTY_LOGS);
        accounts.save_logs("t", r#"[{"lat":1}]"#).await.unwrap();
        assert_eq!(accounts.load_logs("t").await.unwrap(), r#"[{"lat":1}]"#);
        assert!(accounts.save_logs("", "[]").await.is_err());
    }

    #[tokio::test]
    async fn list_users_pages_through_everything() {
        let kv = Arc::new(InMemoryKvStore::new());
        for i in 0..5 {
            kv.put(&format!("user:u{i}"), "{}", None).await.unwrap();
        }
        kv.put("logs:t", "[]", None).await.unwrap();
        let accounts = AccountService::new(kv, Arc::new(ManualClock::from_millis(0)))
            .with_pager_config(PagerConfig::new().with_page_size(2));

        assert_eq!(
            accounts.list_users().await.unwrap(),
            vec!["u0", "u1", "u2", "u3", "u4"]
        );
    }
}
