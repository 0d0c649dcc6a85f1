//! Sealing primitives for the encrypted file vault
//!
//! - Argon2id derives a 256-bit [`VaultKey`] from the user's passphrase
//! - AES-256-GCM seals each entry as `{nonce_hex}:{ciphertext_hex}`, where the
//!   ciphertext carries the 16-byte auth tag

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{password_hash::SaltString, Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{VaultError, VaultResult};

const NONCE_LEN: usize = 12;

/// Symmetric key for vault entries - automatically zeroed when dropped
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; 32],
}

impl VaultKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKey").field("key", &"[REDACTED]").finish()
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDerivationParams {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Generate a random base64 salt for key derivation
pub fn generate_salt() -> String {
    SaltString::generate(&mut OsRng).to_string()
}

/// Derive the vault key from a passphrase and stored salt
pub fn derive_vault_key(
    passphrase: &str,
    salt: &str,
    params: KeyDerivationParams,
) -> VaultResult<VaultKey> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| VaultError::Crypto(format!("Invalid key derivation params: {}", e)))?;

    let salt = SaltString::from_b64(salt)
        .map_err(|e| VaultError::Crypto(format!("Invalid salt: {}", e)))?;

    let mut key = [0u8; 32];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params)
        .hash_password_into(passphrase.as_bytes(), salt.as_str().as_bytes(), &mut key)
        .map_err(|e| VaultError::Crypto(e.to_string()))?;

    Ok(VaultKey::new(key))
}

/// Encrypt `plaintext` under `key` with a fresh random nonce
pub fn seal(plaintext: &[u8], key: &VaultKey) -> VaultResult<String> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Crypto(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| VaultError::Crypto(format!("Encryption failed: {}", e)))?;

    Ok(format!("{}:{}", hex::encode(nonce), hex::encode(ciphertext)))
}

/// Decrypt a value produced by [`seal`]
pub fn open(sealed: &str, key: &VaultKey) -> VaultResult<Vec<u8>> {
    let (nonce_hex, ciphertext_hex) = sealed
        .split_once(':')
        .ok_or_else(|| VaultError::Decode("Expected nonce:ciphertext".to_string()))?;

    let nonce = hex::decode(nonce_hex)
        .map_err(|e| VaultError::Decode(format!("Invalid nonce hex: {}", e)))?;
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::Decode(format!(
            "Invalid nonce length: expected {}, got {}",
            NONCE_LEN,
            nonce.len()
        )));
    }
    let ciphertext = hex::decode(ciphertext_hex)
        .map_err(|e| VaultError::Decode(format!("Invalid ciphertext hex: {}", e)))?;

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Crypto(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|e| VaultError::Crypto(format!("Decryption failed: {}", e)))
}
