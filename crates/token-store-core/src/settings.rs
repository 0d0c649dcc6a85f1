//! Token store settings
//!
//! Stores non-sensitive configuration in a plain JSON file. Missing fields
//! fall back to defaults so older files keep loading.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::crypto::KeyDerivationParams;
use crate::error::{ConfigError, IdentityError, VaultResult};
use crate::identity::HttpIdentityResolver;
use crate::key::DEFAULT_KEY_PREFIX;
use crate::storage::{EncryptedFileStorage, KeychainStorage};

const SETTINGS_VERSION: u32 = 1;
const DEFAULT_SERVICE_NAME: &str = "token-store";
const DEFAULT_IDENTITY_URL: &str = "https://api.box.com/2.0/";
const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 30;

/// Which vault backend holds the tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    /// Keychain when the platform store accepts writes, encrypted file otherwise
    #[default]
    Auto,
    Keychain,
    EncryptedFile,
}

/// Identity service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentitySettings {
    /// API root; `users/me` is resolved against it
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_IDENTITY_URL.to_string(),
            timeout_secs: DEFAULT_IDENTITY_TIMEOUT_SECS,
        }
    }
}

/// Token store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Settings file version
    pub version: u32,
    /// Namespace for vault keys (`{keyPrefix}.{userId}`)
    pub key_prefix: String,
    /// Keychain service name
    pub service_name: String,
    pub backend: BackendKind,
    /// Directory for the encrypted file backend, platform data dir if unset
    pub data_dir: Option<PathBuf>,
    pub identity: IdentitySettings,
    pub key_derivation: KeyDerivationParams,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            backend: BackendKind::Auto,
            data_dir: None,
            identity: IdentitySettings::default(),
            key_derivation: KeyDerivationParams::default(),
        }
    }
}

impl StoreSettings {
    /// Build the HTTP identity resolver these settings describe
    pub fn identity_resolver(&self) -> Result<HttpIdentityResolver, IdentityError> {
        let base_url = Url::parse(&self.identity.base_url)
            .map_err(|e| IdentityError::InvalidUrl(format!("{}: {}", self.identity.base_url, e)))?;
        HttpIdentityResolver::new(&base_url, Duration::from_secs(self.identity.timeout_secs))
    }

    pub fn keychain(&self) -> KeychainStorage {
        KeychainStorage::new(&self.service_name)
    }

    /// Encrypted file storage in the configured data directory, still locked
    pub fn encrypted_file(&self) -> VaultResult<EncryptedFileStorage> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => EncryptedFileStorage::default_dir()?,
        };
        EncryptedFileStorage::new(dir, self.key_derivation)
    }

    /// Settle `Auto` by probing the keychain
    pub fn resolve_backend(&self) -> BackendKind {
        match self.backend {
            BackendKind::Auto if self.keychain().is_available() => BackendKind::Keychain,
            BackendKind::Auto => {
                info!("Keychain unavailable, falling back to encrypted file storage");
                BackendKind::EncryptedFile
            }
            other => other,
        }
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: StoreSettings,
}

impl SettingsManager {
    /// Open the settings file at `settings_file`, using defaults if absent
    pub fn open(settings_file: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let settings_file = settings_file.into();
        let settings = Self::load_from_file(&settings_file)?;

        Ok(Self {
            settings_file,
            settings,
        })
    }

    /// Platform config location: `<config_dir>/settings.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("dev", "token-store", "token-store")
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    fn load_from_file(path: &Path) -> Result<StoreSettings, ConfigError> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(StoreSettings::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: StoreSettings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(&self.settings)?;

        if let Some(parent) = self.settings_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    pub fn get(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut StoreSettings {
        &mut self.settings
    }

    /// Update settings and save
    pub async fn update(&mut self, settings: StoreSettings) -> Result<(), ConfigError> {
        self.settings = settings;
        self.save().await
    }

    pub fn path(&self) -> &Path {
        &self.settings_file
    }
}
