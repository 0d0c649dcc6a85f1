//! Secure vault backends for token persistence
//!
//! This module provides three storage backends behind [`SecureStorage`]:
//! 1. OS Keychain (hardware-backed where available)
//! 2. Encrypted file (fallback)
//! 3. In-memory (tests and embedding)
//!
//! [`TokenVault`] layers typed get/set/remove on top of any of them.

mod encrypted_file;
mod keychain;
mod memory;
mod traits;
mod vault;

pub use encrypted_file::EncryptedFileStorage;
pub use keychain::KeychainStorage;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;
pub use vault::TokenVault;
