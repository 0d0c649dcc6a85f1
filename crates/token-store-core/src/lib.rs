//! # token-store-core
//!
//! Per-user persistence of authentication token bundles, including:
//! - Storage keys derived as `{prefix}.{user_id}`
//! - Lazy resolution of the token owner on first write
//! - OS keychain integration with encrypted file fallback
//! - Token material zeroized on drop and redacted from `Debug`

pub mod crypto;
pub mod error;
pub mod identity;
pub mod key;
pub mod settings;
pub mod storage;
pub mod store;
pub mod token;

pub use error::{ConfigError, IdentityError, Result, StoreError, VaultError, VaultResult};
pub use identity::{HttpIdentityResolver, IdentityResolver};
pub use key::{derive_key, StorageKey, DEFAULT_KEY_PREFIX};
pub use settings::{BackendKind, IdentitySettings, SettingsManager, StoreSettings};
pub use storage::{EncryptedFileStorage, KeychainStorage, MemoryStorage, SecureStorage, TokenVault};
pub use store::{IdentityState, MultiUserTokenStore, TokenStore};
pub use token::TokenInfo;
