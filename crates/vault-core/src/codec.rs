//! Canonical serialization of the account map
//!
//! The serialized bytes are what gets encrypted, and the store compares
//! serialized forms to decide whether a database needs saving, so encoding
//! must be deterministic: `BTreeMap` ordering plus a fixed field layout make
//! re-serializing a deserialized map byte-identical.
//!
//! An empty map serializes to an empty byte sequence, not `"{}"`.

use crate::account::AccountMap;
use crate::error::{Result, VaultError};

/// Serialize an account map to its canonical byte form
pub fn serialize(accounts: &AccountMap) -> Result<Vec<u8>> {
    if accounts.is_empty() {
        return Ok(Vec::new());
    }

    serde_json::to_vec(accounts).map_err(|e| VaultError::CorruptedFormat(e.to_string()))
}

/// Deserialize canonical bytes back into an account map
///
/// Fails with `CorruptedFormat` when the bytes are not valid encoded data.
/// This is distinct from `AuthenticationFailed` one layer down: reaching a
/// decode failure means the ciphertext verified, so the password was right
/// and the plaintext itself is bad.
pub fn deserialize(bytes: &[u8]) -> Result<AccountMap> {
    if bytes.is_empty() {
        return Ok(AccountMap::new());
    }

    let accounts: AccountMap =
        serde_json::from_slice(bytes).map_err(|e| VaultError::CorruptedFormat(e.to_string()))?;

    for (key, account) in &accounts {
        if account.account_name.is_empty() {
            return Err(VaultError::CorruptedFormat(
                "account with empty name".to_string(),
            ));
        }
        if *key != account.account_name {
            return Err(VaultError::CorruptedFormat(format!(
                "map key '{}' does not match account name '{}'",
                key, account.account_name
            )));
        }
    }

    Ok(accounts)
}
