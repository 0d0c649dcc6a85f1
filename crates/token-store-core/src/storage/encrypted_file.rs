//! Encrypted file storage backend
//!
//! Fallback for hosts without a usable keychain. Entries live in a JSON file in
//! the user's data directory, each one sealed with AES-256-GCM under a key
//! derived from a passphrase.

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::SecureStorage;
use crate::crypto::{derive_vault_key, generate_salt, open, seal, KeyDerivationParams, VaultKey};
use crate::error::{VaultError, VaultResult};

/// Known plaintext sealed at first unlock to detect a wrong passphrase later
const VERIFICATION_PLAINTEXT: &[u8] = b"token-store-verification";

const FILE_VERSION: u32 = 1;

/// File format for persistent storage
#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    version: u32,
    /// Map of key -> sealed value
    entries: HashMap<String, String>,
}

/// Encrypted file storage backend.
///
/// Starts locked; every operation fails with [`VaultError::Locked`] until
/// [`unlock`](Self::unlock) succeeds.
pub struct EncryptedFileStorage {
    storage_dir: PathBuf,
    params: KeyDerivationParams,
    entries: Arc<RwLock<HashMap<String, String>>>,
    key: Arc<RwLock<Option<VaultKey>>>,
}

impl EncryptedFileStorage {
    /// Create encrypted file storage in `storage_dir`, creating it if needed
    pub fn new(storage_dir: impl Into<PathBuf>, params: KeyDerivationParams) -> VaultResult<Self> {
        let storage_dir = storage_dir.into();
        std::fs::create_dir_all(&storage_dir)?;

        debug!("Encrypted file storage initialized at: {:?}", storage_dir);

        Ok(Self {
            storage_dir,
            params,
            entries: Arc::new(RwLock::new(HashMap::new())),
            key: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the default storage directory
    pub fn default_dir() -> VaultResult<PathBuf> {
        ProjectDirs::from("dev", "token-store", "token-store")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| VaultError::Backend("Could not determine data directory".to_string()))
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn storage_file_path(&self) -> PathBuf {
        self.storage_dir.join("tokens.json")
    }

    fn salt_file_path(&self) -> PathBuf {
        self.storage_dir.join("salt")
    }

    fn verification_file_path(&self) -> PathBuf {
        self.storage_dir.join("verify")
    }

    /// Whether a passphrase has been set for this directory
    pub fn is_initialized(&self) -> bool {
        self.salt_file_path().exists() && self.verification_file_path().exists()
    }

    pub async fn is_unlocked(&self) -> bool {
        self.key.read().await.is_some()
    }

    /// Derive the key from `passphrase` and load the stored entries.
    ///
    /// The first unlock of a directory sets its passphrase. Later unlocks
    /// fail with [`VaultError::AccessDenied`] if the passphrase differs.
    pub async fn unlock(&self, passphrase: &str) -> VaultResult<()> {
        let salt = match self.load_salt().await? {
            Some(salt) => salt,
            None => {
                let salt = generate_salt();
                tokio::fs::write(self.salt_file_path(), &salt).await?;
                debug!("Generated new salt for {:?}", self.storage_dir);
                salt
            }
        };

        // Argon2 is deliberately slow, keep it off the async workers
        let passphrase = passphrase.to_string();
        let params = self.params;
        let key = tokio::task::spawn_blocking(move || derive_vault_key(&passphrase, &salt, params))
            .await
            .map_err(|e| VaultError::Backend(format!("Key derivation task failed: {}", e)))??;

        let entries = self.load().await?;

        let verification_path = self.verification_file_path();
        if verification_path.exists() {
            let sealed = tokio::fs::read_to_string(&verification_path).await?;
            let verified = open(sealed.trim(), &key)
                .map(|plaintext| plaintext == VERIFICATION_PLAINTEXT)
                .unwrap_or(false);
            if !verified {
                warn!("Rejected passphrase for {:?}", self.storage_dir);
                return Err(VaultError::AccessDenied("Wrong passphrase".to_string()));
            }
        } else {
            // Existing entries pin the passphrase even without a verify record
            if let Some(sealed) = entries.values().next() {
                if open(sealed, &key).is_err() {
                    warn!(
                        "Rejected passphrase for {:?}: existing entries do not open",
                        self.storage_dir
                    );
                    return Err(VaultError::AccessDenied("Wrong passphrase".to_string()));
                }
                info!("Restoring missing verification record in {:?}", self.storage_dir);
            }
            let sealed = seal(VERIFICATION_PLAINTEXT, &key)?;
            tokio::fs::write(&verification_path, sealed).await?;
        }

        info!("Unlocked encrypted file storage with {} entries", entries.len());

        *self.entries.write().await = entries;
        *self.key.write().await = Some(key);
        Ok(())
    }

    /// Forget the key and the cached entries
    pub async fn lock(&self) {
        *self.key.write().await = None;
        self.entries.write().await.clear();
        debug!("Locked encrypted file storage");
    }

    async fn load_salt(&self) -> VaultResult<Option<String>> {
        let path = self.salt_file_path();

        if !path.exists() {
            return Ok(None);
        }

        let salt = tokio::fs::read_to_string(&path).await?;
        Ok(Some(salt.trim().to_string()))
    }

    async fn load(&self) -> VaultResult<HashMap<String, String>> {
        let path = self.storage_file_path();

        if !path.exists() {
            debug!("No existing storage file found");
            return Ok(HashMap::new());
        }

        let contents = tokio::fs::read_to_string(&path).await?;
        let file: StorageFile = serde_json::from_str(&contents)
            .map_err(|e| VaultError::Decode(format!("Corrupted storage file: {}", e)))?;

        Ok(file.entries)
    }

    async fn save(&self, entries: &HashMap<String, String>) -> VaultResult<()> {
        let file = StorageFile {
            version: FILE_VERSION,
            entries: entries.clone(),
        };

        let contents =
            serde_json::to_string_pretty(&file).map_err(|e| VaultError::Encode(e.to_string()))?;
        let path = self.storage_file_path();

        // Write atomically using a temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!("Saved {} entries to storage", entries.len());
        Ok(())
    }
}

#[async_trait]
impl SecureStorage for EncryptedFileStorage {
    async fn store(&self, key: &str, value: &[u8]) -> VaultResult<()> {
        let vault_key = self.key.read().await;
        let vault_key = vault_key.as_ref().ok_or(VaultError::Locked)?;

        let sealed = seal(value, vault_key)?;

        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), sealed);
        self.save(&entries).await?;

        debug!("Stored key: {}", key);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> VaultResult<Option<Vec<u8>>> {
        let vault_key = self.key.read().await;
        let vault_key = vault_key.as_ref().ok_or(VaultError::Locked)?;

        let entries = self.entries.read().await;

        match entries.get(key) {
            Some(sealed) => Ok(Some(open(sealed, vault_key)?)),
            None => {
                debug!("Key not found: {}", key);
                Ok(None)
            }
        }
    }

    async fn delete(&self, key: &str) -> VaultResult<()> {
        if !self.is_unlocked().await {
            return Err(VaultError::Locked);
        }

        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            self.save(&entries).await?;
            debug!("Deleted key: {}", key);
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> VaultResult<bool> {
        if !self.is_unlocked().await {
            return Err(VaultError::Locked);
        }

        Ok(self.entries.read().await.contains_key(key))
    }

    fn is_hardware_backed(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "Encrypted File Storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast_params() -> KeyDerivationParams {
        KeyDerivationParams {
            memory_cost: 8192,
            time_cost: 1,
            parallelism: 1,
        }
    }

    async fn unlocked_storage(dir: &TempDir) -> EncryptedFileStorage {
        let storage = EncryptedFileStorage::new(dir.path(), fast_params()).unwrap();
        storage.unlock("test-passphrase").await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let dir = TempDir::new().unwrap();
        let storage = unlocked_storage(&dir).await;

        storage.store("TokenInfo.u1", b"token-json").await.unwrap();

        let retrieved = storage.retrieve("TokenInfo.u1").await.unwrap();
        assert_eq!(retrieved, Some(b"token-json".to_vec()));
        assert!(storage.exists("TokenInfo.u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_values_are_sealed_on_disk() {
        let dir = TempDir::new().unwrap();
        let storage = unlocked_storage(&dir).await;

        storage.store("TokenInfo.u1", b"plain-secret").await.unwrap();

        let on_disk = std::fs::read_to_string(dir.path().join("tokens.json")).unwrap();
        assert!(on_disk.contains("TokenInfo.u1"));
        assert!(!on_disk.contains("plain-secret"));
    }

    #[tokio::test]
    async fn test_locked_storage_rejects_operations() {
        let dir = TempDir::new().unwrap();
        let storage = EncryptedFileStorage::new(dir.path(), fast_params()).unwrap();

        assert!(matches!(storage.store("k", b"v").await, Err(VaultError::Locked)));
        assert!(matches!(storage.retrieve("k").await, Err(VaultError::Locked)));
        assert!(matches!(storage.delete("k").await, Err(VaultError::Locked)));
        assert!(matches!(storage.exists("k").await, Err(VaultError::Locked)));
    }

    #[tokio::test]
    async fn test_delete_missing_key() {
        let dir = TempDir::new().unwrap();
        let storage = unlocked_storage(&dir).await;

        storage.store("k", b"v").await.unwrap();
        storage.delete("k").await.unwrap();
        storage.delete("k").await.unwrap();

        assert_eq!(storage.retrieve("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let dir = TempDir::new().unwrap();

        {
            let storage = unlocked_storage(&dir).await;
            storage.store("persistent", b"value").await.unwrap();
        }

        let storage = unlocked_storage(&dir).await;
        assert!(storage.is_initialized());
        assert_eq!(
            storage.retrieve("persistent").await.unwrap(),
            Some(b"value".to_vec())
        );
    }

    #[tokio::test]
    async fn test_wrong_passphrase_is_denied() {
        let dir = TempDir::new().unwrap();
        unlocked_storage(&dir).await;

        let storage = EncryptedFileStorage::new(dir.path(), fast_params()).unwrap();
        let result = storage.unlock("not-the-passphrase").await;

        assert!(matches!(result, Err(VaultError::AccessDenied(_))));
        assert!(!storage.is_unlocked().await);
    }

    #[tokio::test]
    async fn test_lost_verify_record_still_denies_wrong_passphrase() {
        let dir = TempDir::new().unwrap();
        {
            let storage = unlocked_storage(&dir).await;
            storage.store("TokenInfo.u1", b"token-json").await.unwrap();
        }
        std::fs::remove_file(dir.path().join("verify")).unwrap();

        let storage = EncryptedFileStorage::new(dir.path(), fast_params()).unwrap();
        let result = storage.unlock("not-the-passphrase").await;
        assert!(matches!(result, Err(VaultError::AccessDenied(_))));
        assert!(!dir.path().join("verify").exists());

        let storage = unlocked_storage(&dir).await;
        assert!(storage.is_initialized());
        assert_eq!(
            storage.retrieve("TokenInfo.u1").await.unwrap(),
            Some(b"token-json".to_vec())
        );
    }

    #[tokio::test]
    async fn test_lock_clears_access() {
        let dir = TempDir::new().unwrap();
        let storage = unlocked_storage(&dir).await;
        storage.store("k", b"v").await.unwrap();

        storage.lock().await;

        assert!(matches!(storage.retrieve("k").await, Err(VaultError::Locked)));
    }
}
