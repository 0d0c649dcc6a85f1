//! Storage key derivation
//!
//! Every user's token bundle lives under `{prefix}.{user_id}`. A store that
//! does not know its user yet has no key at all, which is modelled as
//! [`StorageKey::Invalid`] so callers check a single precondition.

use std::fmt;

/// Prefix used for token bundle entries unless configured otherwise
pub const DEFAULT_KEY_PREFIX: &str = "TokenInfo";

/// Vault key for a user's token bundle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// No user identifier is known, nothing may be read or written
    Invalid,
    Valid(String),
}

impl StorageKey {
    pub fn is_valid(&self) -> bool {
        matches!(self, StorageKey::Valid(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StorageKey::Valid(key) => Some(key),
            StorageKey::Invalid => None,
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or(""))
    }
}

/// Derive the vault key for `user_id` under `prefix`
pub fn derive_key(prefix: &str, user_id: Option<&str>) -> StorageKey {
    match user_id {
        Some(id) if !id.is_empty() => StorageKey::Valid(format!("{}.{}", prefix, id)),
        _ => StorageKey::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_with_user() {
        let key = derive_key(DEFAULT_KEY_PREFIX, Some("user42"));
        assert_eq!(key, StorageKey::Valid("TokenInfo.user42".to_string()));
        assert_eq!(key.as_str(), Some("TokenInfo.user42"));
        assert!(key.is_valid());
    }

    #[test]
    fn test_derive_key_custom_prefix() {
        let key = derive_key("com.example.tokens", Some("7"));
        assert_eq!(key.to_string(), "com.example.tokens.7");
    }

    #[test]
    fn test_missing_user_is_invalid_for_every_prefix() {
        for prefix in ["TokenInfo", "", "other.prefix"] {
            assert_eq!(derive_key(prefix, None), StorageKey::Invalid);
            assert_eq!(derive_key(prefix, Some("")), StorageKey::Invalid);
        }
    }

    #[test]
    fn test_invalid_key_renders_empty() {
        let key = StorageKey::Invalid;
        assert!(!key.is_valid());
        assert_eq!(key.as_str(), None);
        assert_eq!(key.to_string(), "");
    }
}
