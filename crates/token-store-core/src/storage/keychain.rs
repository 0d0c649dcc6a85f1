//! OS Keychain storage backend
//!
//! Uses the system keychain for secure storage:
//! - macOS: Keychain
//! - Windows: Credential Manager (DPAPI)
//! - Linux: Secret Service (GNOME Keyring, KWallet)

use async_trait::async_trait;
use base64::Engine;
use keyring::Entry;
use tracing::{debug, warn};

use super::SecureStorage;
use crate::error::{VaultError, VaultResult};

/// Account name used to probe whether the platform store accepts writes
const PROBE_ACCOUNT: &str = "__token_store_probe__";

/// OS Keychain storage backend.
///
/// Each vault key becomes one generic-password item whose account is the key
/// and whose service is the configured service name.
pub struct KeychainStorage {
    service: String,
}

impl KeychainStorage {
    /// Create keychain storage for the given service name
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Probe the platform keychain by writing and removing a throwaway item
    pub fn is_available(&self) -> bool {
        let entry = match Entry::new(&self.service, PROBE_ACCOUNT) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Keychain entry could not be created: {}", e);
                return false;
            }
        };

        match entry.set_password("probe") {
            Ok(()) => {
                let _ = entry.delete_password();
                debug!("Keychain storage is available");
                true
            }
            Err(e) => {
                warn!("Keychain storage is not available: {}", e);
                false
            }
        }
    }

    fn entry(&self, key: &str) -> VaultResult<Entry> {
        Entry::new(&self.service, key).map_err(|e| map_keyring_error(key, e))
    }
}

/// Translate keyring failures into vault errors.
///
/// `NoEntry` is handled by callers before this is reached.
fn map_keyring_error(key: &str, err: keyring::Error) -> VaultError {
    match err {
        keyring::Error::NoEntry => VaultError::NotFound(key.to_string()),
        keyring::Error::NoStorageAccess(e) => VaultError::AccessDenied(e.to_string()),
        keyring::Error::BadEncoding(_) => {
            VaultError::Decode(format!("Keychain item for {} is not UTF-8", key))
        }
        other => VaultError::Backend(other.to_string()),
    }
}

#[async_trait]
impl SecureStorage for KeychainStorage {
    async fn store(&self, key: &str, value: &[u8]) -> VaultResult<()> {
        let entry = self.entry(key)?;

        // Keychain items hold strings
        let encoded = base64::engine::general_purpose::STANDARD.encode(value);

        entry
            .set_password(&encoded)
            .map_err(|e| map_keyring_error(key, e))?;

        debug!("Stored key in keychain: {}", key);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> VaultResult<Option<Vec<u8>>> {
        let entry = self.entry(key)?;

        match entry.get_password() {
            Ok(encoded) => {
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| VaultError::Decode(format!("Base64 decode error: {}", e)))?;
                debug!("Retrieved key from keychain: {}", key);
                Ok(Some(decoded))
            }
            Err(keyring::Error::NoEntry) => {
                debug!("Key not found in keychain: {}", key);
                Ok(None)
            }
            Err(e) => Err(map_keyring_error(key, e)),
        }
    }

    async fn delete(&self, key: &str) -> VaultResult<()> {
        let entry = self.entry(key)?;

        match entry.delete_password() {
            Ok(()) => {
                debug!("Deleted key from keychain: {}", key);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(map_keyring_error(key, e)),
        }
    }

    async fn exists(&self, key: &str) -> VaultResult<bool> {
        let entry = self.entry(key)?;

        match entry.get_password() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(map_keyring_error(key, e)),
        }
    }

    fn is_hardware_backed(&self) -> bool {
        // OS keychains protect items with platform-level keys
        true
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(target_os = "macos")]
        return "macOS Keychain";

        #[cfg(target_os = "windows")]
        return "Windows Credential Manager";

        #[cfg(target_os = "linux")]
        return "Linux Secret Service";

        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        return "System Keychain";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keychain_availability() {
        let storage = KeychainStorage::new("token-store-test");
        // Headless CI has no keychain; only check the probe does not panic
        let _ = storage.is_available();
        assert_eq!(storage.service(), "token-store-test");
    }

    #[test]
    fn test_map_keyring_errors() {
        assert!(matches!(
            map_keyring_error("k", keyring::Error::NoEntry),
            VaultError::NotFound(key) if key == "k"
        ));
        assert!(matches!(
            map_keyring_error("k", keyring::Error::BadEncoding(vec![0xff])),
            VaultError::Decode(_)
        ));
        assert!(matches!(
            map_keyring_error("k", keyring::Error::Invalid("service".into(), "empty".into())),
            VaultError::Backend(_)
        ));
    }
}
