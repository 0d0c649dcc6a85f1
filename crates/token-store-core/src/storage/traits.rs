//! Storage trait definitions

use crate::error::VaultResult;
use async_trait::async_trait;

/// Trait for secure storage backends
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Store a value with the given key, replacing any previous value
    async fn store(&self, key: &str, value: &[u8]) -> VaultResult<()>;

    /// Retrieve a value by key, `None` if nothing is stored
    async fn retrieve(&self, key: &str) -> VaultResult<Option<Vec<u8>>>;

    /// Delete a value by key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> VaultResult<()>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> VaultResult<bool>;

    /// Check if this storage backend is hardware-backed
    fn is_hardware_backed(&self) -> bool;

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
