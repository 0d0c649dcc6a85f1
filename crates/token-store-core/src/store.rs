//! Multi-user token store
//!
//! [`MultiUserTokenStore`] keeps one token bundle per user in a secure vault,
//! under the key `{prefix}.{user_id}`. A store may be created before the user
//! is known: the first successful [`write`](MultiUserTokenStore::write) asks the
//! [`IdentityResolver`] who owns the token and fixes that identity for the
//! rest of the store's life.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError, VaultError};
use crate::identity::IdentityResolver;
use crate::key::{derive_key, StorageKey, DEFAULT_KEY_PREFIX};
use crate::storage::TokenVault;
use crate::token::TokenInfo;

const WRITE_FAILED: &str = "Cannot write to keychain";
const CLEAR_FAILED: &str = "Cannot clear keychain";

/// Read/write/clear access to a persisted token bundle
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn read(&self) -> Result<TokenInfo>;

    async fn write(&self, token: &TokenInfo) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Whether a store knows which user it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    /// No user id yet; reads and clears short-circuit without vault access
    Unidentified,
    /// User id fixed for the life of the store
    Identified,
}

/// Token store keyed per user.
///
/// The user id lives in a one-shot cell. Concurrent writes while the store is
/// unidentified share a single resolver call; once set, the id never changes.
pub struct MultiUserTokenStore {
    vault: TokenVault,
    resolver: Arc<dyn IdentityResolver>,
    key_prefix: String,
    user_id: OnceCell<String>,
}

impl MultiUserTokenStore {
    /// Create a store, optionally seeded with an already-known user id
    pub fn new(
        vault: TokenVault,
        resolver: Arc<dyn IdentityResolver>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            vault,
            resolver,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            user_id: OnceCell::new_with(user_id),
        }
    }

    /// Use a different namespace prefix for vault keys
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.get().map(String::as_str)
    }

    /// Whether a user id has been seeded or resolved.
    ///
    /// A store seeded with an empty id is `Identified` yet has an invalid
    /// [`storage_key`](Self::storage_key): it never resolves another user, and
    /// writes fail with [`StoreError::InvalidIdentifier`].
    pub fn state(&self) -> IdentityState {
        if self.user_id.initialized() {
            IdentityState::Identified
        } else {
            IdentityState::Unidentified
        }
    }

    /// The vault key this store currently reads and writes
    pub fn storage_key(&self) -> StorageKey {
        derive_key(&self.key_prefix, self.user_id())
    }

    /// Load the user's token bundle.
    ///
    /// Fails with [`StoreError::NoValue`] when the user is not identified,
    /// nothing is stored, or the stored entry cannot be decoded.
    pub async fn read(&self) -> Result<TokenInfo> {
        let key = match self.storage_key() {
            StorageKey::Valid(key) => key,
            StorageKey::Invalid => {
                debug!("Read on unidentified token store");
                return Err(StoreError::NoValue);
            }
        };

        match self.vault.get::<TokenInfo>(&key).await {
            Ok(token) => Ok(token),
            Err(VaultError::NotFound(_)) => Err(StoreError::NoValue),
            Err(VaultError::Decode(e)) | Err(VaultError::Crypto(e)) => {
                warn!("Discarding undecodable token for {}: {}", key, e);
                Err(StoreError::NoValue)
            }
            Err(e) if e.is_store_specific() => Err(StoreError::Vault(e)),
            Err(e) => Err(StoreError::UnhandledError {
                context: "Cannot read from keychain".to_string(),
                source: e,
            }),
        }
    }

    /// Like [`read`](Self::read) but any failure reads as "no token"
    pub async fn try_read(&self) -> Option<TokenInfo> {
        self.read().await.ok()
    }

    /// Persist `token` for this store's user.
    ///
    /// An unidentified store first resolves the token's owner; resolver errors
    /// are returned unchanged and leave the store unidentified.
    pub async fn write(&self, token: &TokenInfo) -> Result<()> {
        let user_id = self
            .user_id
            .get_or_try_init(|| self.resolve_user_id(token))
            .await?;

        let key = match derive_key(&self.key_prefix, Some(user_id.as_str())) {
            StorageKey::Valid(key) => key,
            StorageKey::Invalid => {
                return Err(StoreError::InvalidIdentifier(format!(
                    "user id {:?} does not form a storage key",
                    user_id
                )))
            }
        };

        self.vault
            .set(&key, token)
            .await
            .map_err(|e| StoreError::from_vault(WRITE_FAILED, e))?;

        debug!("Wrote token bundle to {}", key);
        Ok(())
    }

    /// Remove the user's token bundle.
    ///
    /// Clearing an unidentified store, or a user with nothing stored, succeeds
    /// without error.
    pub async fn clear(&self) -> Result<()> {
        let key = match self.storage_key() {
            StorageKey::Valid(key) => key,
            StorageKey::Invalid => {
                debug!("Clear on unidentified token store, nothing to remove");
                return Ok(());
            }
        };

        self.vault
            .remove(&key)
            .await
            .map_err(|e| StoreError::from_vault(CLEAR_FAILED, e))?;

        info!("Cleared token bundle at {}", key);
        Ok(())
    }

    async fn resolve_user_id(&self, token: &TokenInfo) -> Result<String> {
        debug!("Token store unidentified, resolving token owner");

        let user_id = self
            .resolver
            .resolve_current_user(token.access_token())
            .await?;

        if user_id.is_empty() {
            return Err(StoreError::InvalidIdentifier(
                "identity resolver returned an empty user id".to_string(),
            ));
        }

        info!("Token store identified user {}", user_id);
        Ok(user_id)
    }
}

#[async_trait]
impl TokenStore for MultiUserTokenStore {
    async fn read(&self) -> Result<TokenInfo> {
        MultiUserTokenStore::read(self).await
    }

    async fn write(&self, token: &TokenInfo) -> Result<()> {
        MultiUserTokenStore::write(self, token).await
    }

    async fn clear(&self) -> Result<()> {
        MultiUserTokenStore::clear(self).await
    }
}

impl std::fmt::Debug for MultiUserTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiUserTokenStore")
            .field("vault", &self.vault)
            .field("key_prefix", &self.key_prefix)
            .field("user_id", &self.user_id())
            .finish()
    }
}
