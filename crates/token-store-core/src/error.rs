//! Error types for token-store-core
//!
//! Each layer has its own error enum:
//! - [`VaultError`] from the secure storage backends
//! - [`IdentityError`] from the identity resolver
//! - [`ConfigError`] from the settings file
//! - [`StoreError`] from the token store, which wraps or passes through vault
//!   and identity errors

use thiserror::Error;

/// Result type alias for token store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Result type alias for vault operations
pub type VaultResult<T> = std::result::Result<T, VaultError>;

/// Token store error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// Nothing is stored for this user, or the user is not identified yet.
    /// Callers treat this as "not logged in".
    #[error("No token stored in keychain")]
    NoValue,

    #[error("Invalid user identifier: {0}")]
    InvalidIdentifier(String),

    #[error("{context}")]
    UnhandledError {
        context: String,
        #[source]
        source: VaultError,
    },

    /// Raised by the vault itself and passed through unchanged
    #[error(transparent)]
    Vault(VaultError),

    /// Raised by the identity resolver and passed through unchanged
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl StoreError {
    /// Wrap a vault failure for the given operation context.
    ///
    /// Store-specific vault errors are passed through; anything the store
    /// cannot categorize becomes [`StoreError::UnhandledError`].
    pub(crate) fn from_vault(context: &str, err: VaultError) -> Self {
        if err.is_store_specific() {
            StoreError::Vault(err)
        } else {
            tracing::warn!("{}: {}", context, err);
            StoreError::UnhandledError {
                context: context.to_string(),
                source: err,
            }
        }
    }

    /// Whether this is the normal "not logged in" outcome
    pub fn is_no_value(&self) -> bool {
        matches!(self, StoreError::NoValue)
    }
}

/// Secure vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("No vault entry for key: {0}")]
    NotFound(String),

    #[error("Vault access denied: {0}")]
    AccessDenied(String),

    #[error("Vault is locked - unlock with passphrase first")]
    Locked,

    #[error("Vault backend error: {0}")]
    Backend(String),

    #[error("Failed to encode vault value: {0}")]
    Encode(String),

    #[error("Failed to decode vault value: {0}")]
    Decode(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// Errors raised by the vault backend itself, as opposed to
    /// serialization or filesystem failures around it
    pub fn is_store_specific(&self) -> bool {
        matches!(
            self,
            VaultError::NotFound(_)
                | VaultError::AccessDenied(_)
                | VaultError::Locked
                | VaultError::Backend(_)
        )
    }
}

/// Identity resolver error types
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity request failed: {0}")]
    Request(String),

    #[error("Identity service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Identity response did not contain a user id")]
    MissingUserId,

    #[error("Invalid identity response: {0}")]
    InvalidResponse(String),

    #[error("Invalid identity service URL: {0}")]
    InvalidUrl(String),
}

/// Settings file error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_store_specific_vault_errors_pass_through() {
        let err = StoreError::from_vault(
            "Cannot write to keychain",
            VaultError::AccessDenied("user cancelled".to_string()),
        );
        assert!(matches!(err, StoreError::Vault(VaultError::AccessDenied(_))));
        assert_eq!(err.to_string(), "Vault access denied: user cancelled");
    }

    #[test]
    fn test_uncategorized_vault_errors_are_wrapped() {
        let err = StoreError::from_vault(
            "Cannot clear keychain",
            VaultError::Encode("bad value".to_string()),
        );
        assert_eq!(err.to_string(), "Cannot clear keychain");
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "Failed to encode vault value: bad value");
    }

    #[test]
    fn test_identity_error_is_transparent() {
        let err: StoreError = IdentityError::Status {
            status: 401,
            message: "unauthorized".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Identity service returned 401: unauthorized");
        assert!(!err.is_no_value());
        assert!(StoreError::NoValue.is_no_value());
    }
}
