//! Authenticated encryption token format over AES-256-GCM
//!
//! Token layout (before base64): `version(1) || timestamp(8, BE seconds) || nonce(12) || ciphertext+tag`
//! - Version: 1 byte, currently `0x01`
//! - Timestamp: unix seconds at creation, big-endian
//! - Nonce: 12 bytes (96 bits) - standard for GCM
//! - Ciphertext with 16-byte auth tag appended
//!
//! The version and timestamp header is authenticated as associated data, so
//! header tampering fails verification just like ciphertext tampering. The
//! whole token is serialized as URL-safe base64 without padding.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;

use super::DerivedKey;
use crate::error::{Result, VaultError};

/// Current token format version
const TOKEN_VERSION: u8 = 0x01;

/// Header (version + timestamp) length in bytes
const HEADER_LEN: usize = 1 + 8;

/// GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// GCM auth tag length in bytes
const TAG_LEN: usize = 16;

/// Smallest structurally valid token: header, nonce, and the tag of an
/// empty ciphertext
const MIN_TOKEN_LEN: usize = HEADER_LEN + NONCE_LEN + TAG_LEN;

/// Encrypt plaintext into a URL-safe token string
///
/// Not deterministic: every call draws a fresh nonce and embeds the current
/// time, so two tokens over the same plaintext differ.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

    let mut header = [0u8; HEADER_LEN];
    header[0] = TOKEN_VERSION;
    let timestamp = Utc::now().timestamp().max(0) as u64;
    header[1..].copy_from_slice(&timestamp.to_be_bytes());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    // aes-gcm appends the auth tag to the ciphertext
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &header,
            },
        )
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

    let mut token = Vec::with_capacity(HEADER_LEN + NONCE_LEN + ciphertext.len());
    token.extend_from_slice(&header);
    token.extend_from_slice(&nonce_bytes);
    token.extend_from_slice(&ciphertext);

    Ok(URL_SAFE_NO_PAD.encode(token))
}

/// Decrypt a token string back into plaintext
///
/// Fails with `MalformedToken` when the input is not a structurally valid
/// token, and `AuthenticationFailed` when the tag does not verify under
/// `key` (the expected signal for a wrong password).
pub fn decrypt(key: &DerivedKey, token: &str) -> Result<Vec<u8>> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| VaultError::MalformedToken(format!("invalid base64: {}", e)))?;

    if raw.len() < MIN_TOKEN_LEN {
        return Err(VaultError::MalformedToken(format!(
            "truncated: {} bytes, need at least {}",
            raw.len(),
            MIN_TOKEN_LEN
        )));
    }

    if raw[0] != TOKEN_VERSION {
        return Err(VaultError::MalformedToken(format!(
            "unsupported version {:#04x}",
            raw[0]
        )));
    }

    let header = &raw[..HEADER_LEN];
    let nonce = Nonce::from_slice(&raw[HEADER_LEN..HEADER_LEN + NONCE_LEN]);
    let ciphertext = &raw[HEADER_LEN + NONCE_LEN..];

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| VaultError::AuthenticationFailed)
}

/// Read the creation timestamp embedded in a token without decrypting it
///
/// The timestamp is only trustworthy after a successful `decrypt` of the
/// same token, since reading it performs no verification.
pub fn issued_at(token: &str) -> Result<DateTime<Utc>> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| VaultError::MalformedToken(format!("invalid base64: {}", e)))?;

    if raw.len() < MIN_TOKEN_LEN {
        return Err(VaultError::MalformedToken(format!(
            "truncated: {} bytes, need at least {}",
            raw.len(),
            MIN_TOKEN_LEN
        )));
    }

    let mut ts_bytes = [0u8; 8];
    ts_bytes.copy_from_slice(&raw[1..9]);
    let seconds = u64::from_be_bytes(ts_bytes);

    Utc.timestamp_opt(seconds as i64, 0)
        .single()
        .ok_or_else(|| VaultError::MalformedToken(format!("timestamp out of range: {}", seconds)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_derivation::{derive_key, generate_salt};

    fn test_key() -> DerivedKey {
        derive_key("test-password", &generate_salt()).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = b"Hello, World!";

        let token = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &token).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let key = test_key();

        let token = encrypt(&key, b"").unwrap();
        let decrypted = decrypt(&key, &token).unwrap();

        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_token_is_url_safe_text() {
        let key = test_key();
        let token = encrypt(&key, b"payload").unwrap();

        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_differ_for_same_plaintext() {
        let key = test_key();

        let token1 = encrypt(&key, b"same plaintext").unwrap();
        let token2 = encrypt(&key, b"same plaintext").unwrap();

        // Fresh nonce per call
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let key1 = test_key();
        let key2 = derive_key("other-password", &generate_salt()).unwrap();

        let token = encrypt(&key1, b"secret data").unwrap();
        let result = decrypt(&key2, &token);

        assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let key = test_key();
        let token = encrypt(&key, b"secret data").unwrap();

        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = URL_SAFE_NO_PAD.encode(raw);

        let result = decrypt(&key, &tampered);
        assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_timestamp_fails_authentication() {
        let key = test_key();
        let token = encrypt(&key, b"secret data").unwrap();

        // The header is bound as associated data
        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        raw[5] ^= 0xFF;
        let tampered = URL_SAFE_NO_PAD.encode(raw);

        let result = decrypt(&key, &tampered);
        assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let key = test_key();

        // Not base64
        assert!(matches!(
            decrypt(&key, "not a token!"),
            Err(VaultError::MalformedToken(_))
        ));

        // Valid base64 but too short to hold a header, nonce, and tag
        let short = URL_SAFE_NO_PAD.encode([TOKEN_VERSION, 0, 0, 0]);
        assert!(matches!(
            decrypt(&key, &short),
            Err(VaultError::MalformedToken(_))
        ));

        // Unknown version byte
        let token = encrypt(&key, b"data").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        raw[0] = 0x7F;
        let wrong_version = URL_SAFE_NO_PAD.encode(raw);
        assert!(matches!(
            decrypt(&key, &wrong_version),
            Err(VaultError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_issued_at_matches_creation_time() {
        let key = test_key();
        let before = Utc::now().timestamp();
        let token = encrypt(&key, b"data").unwrap();
        let after = Utc::now().timestamp();

        let issued = issued_at(&token).unwrap().timestamp();
        assert!(issued >= before && issued <= after);
    }
}
