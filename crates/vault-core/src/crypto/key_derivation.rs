//! Password-based key derivation using PBKDF2-HMAC-SHA256

use pbkdf2::pbkdf2_hmac_array;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use super::DerivedKey;
use crate::error::{Result, VaultError};

/// Salt length in bytes - fixed by the on-disk `.bin` file format
pub const SALT_LEN: usize = 16;

/// PBKDF2 iteration count - deliberately slow to make brute force expensive
pub const KDF_ITERATIONS: u32 = 100_000;

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit key from a password using PBKDF2-HMAC-SHA256
///
/// Deterministic: the same (password, salt) pair always yields the same key.
/// This call takes a perceptible amount of time and must run off any
/// latency-sensitive thread.
///
/// # Arguments
/// * `password` - The user's vault password
/// * `salt` - Exactly 16 salt bytes (use `generate_salt()` to create one)
///
/// # Returns
/// A 32-byte key suitable for AES-256 encryption
pub fn derive_key(password: &str, salt: &[u8]) -> Result<DerivedKey> {
    if salt.len() != SALT_LEN {
        return Err(VaultError::InvalidSaltLength {
            expected: SALT_LEN,
            actual: salt.len(),
        });
    }

    let key_bytes =
        pbkdf2_hmac_array::<Sha256, 32>(password.as_bytes(), salt, KDF_ITERATIONS);

    Ok(DerivedKey::new(key_bytes))
}
