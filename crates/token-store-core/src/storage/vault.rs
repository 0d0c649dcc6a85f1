//! Typed facade over a [`SecureStorage`] backend

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::SecureStorage;
use crate::error::{VaultError, VaultResult};

/// Stores serde values as JSON under string keys
#[derive(Clone)]
pub struct TokenVault {
    storage: Arc<dyn SecureStorage>,
}

impl TokenVault {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Load and decode the value stored under `key`.
    ///
    /// Fails with [`VaultError::NotFound`] when nothing is stored and
    /// [`VaultError::Decode`] when the stored bytes are not a valid `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> VaultResult<T> {
        let data = self
            .storage
            .retrieve(key)
            .await?
            .ok_or_else(|| VaultError::NotFound(key.to_string()))?;

        serde_json::from_slice(&data).map_err(|e| VaultError::Decode(e.to_string()))
    }

    /// Encode `value` and store it under `key`
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> VaultResult<()> {
        let data = serde_json::to_vec(value).map_err(|e| VaultError::Encode(e.to_string()))?;
        self.storage.store(key, &data).await?;
        debug!("Set vault value for key: {}", key);
        Ok(())
    }

    /// Remove the value under `key`, succeeding if it was never stored
    pub async fn remove(&self, key: &str) -> VaultResult<()> {
        self.storage.delete(key).await
    }

    /// The backend this vault writes to
    pub fn storage(&self) -> &Arc<dyn SecureStorage> {
        &self.storage
    }
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault")
            .field("backend", &self.storage.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::token::TokenInfo;

    fn test_vault() -> (TokenVault, MemoryStorage) {
        let storage = MemoryStorage::new();
        (TokenVault::new(Arc::new(storage.clone())), storage)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (vault, _) = test_vault();
        let token = TokenInfo::new("tok1").with_refresh_token("ref1");

        vault.set("TokenInfo.u1", &token).await.unwrap();

        let loaded: TokenInfo = vault.get("TokenInfo.u1").await.unwrap();
        assert_eq!(loaded, token);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (vault, _) = test_vault();

        let result = vault.get::<TokenInfo>("TokenInfo.nobody").await;
        assert!(matches!(result, Err(VaultError::NotFound(key)) if key == "TokenInfo.nobody"));
    }

    #[tokio::test]
    async fn test_get_corrupted_is_decode_error() {
        let (vault, storage) = test_vault();
        storage.store("TokenInfo.u1", b"not json").await.unwrap();

        let result = vault.get::<TokenInfo>("TokenInfo.u1").await;
        assert!(matches!(result, Err(VaultError::Decode(_))));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (vault, storage) = test_vault();
        vault.set("k", &TokenInfo::new("t")).await.unwrap();

        vault.remove("k").await.unwrap();
        vault.remove("k").await.unwrap();
        assert!(storage.is_empty().await);
    }
}
