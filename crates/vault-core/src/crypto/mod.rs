//! Cryptographic primitives for the vault
//!
//! This module provides:
//! - Authenticated encryption tokens over AES-256-GCM
//! - PBKDF2-HMAC-SHA256 key derivation from passwords
//! - Secure memory handling with zeroize

mod key_derivation;
mod secure_memory;
mod token;

pub use key_derivation::{derive_key, generate_salt, KDF_ITERATIONS, SALT_LEN};
pub use secure_memory::{DerivedKey, SecretString};
pub use token::{decrypt, encrypt, issued_at};
