//! Process-wide cache of derived keys
//!
//! Key derivation costs hundreds of milliseconds, so repeated opens and
//! saves within a session must not re-pay it. The cache is an explicit,
//! injectable object owned by the application context and shared with the
//! store by handle - no singletons.
//!
//! Entries are keyed by (password, salt): keying by password alone would
//! return the wrong key for two databases sharing a password with
//! different salts. `invalidate` still takes just the password and drops
//! every salt variant under it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::debug;

use crate::crypto::{derive_key, DerivedKey, SALT_LEN};
use crate::error::{Result, VaultError};

type CacheKey = (String, [u8; SALT_LEN]);

/// Shared memoization of password-derived keys
#[derive(Default)]
pub struct KeyCache {
    entries: Mutex<HashMap<CacheKey, DerivedKey>>,
    derivations: AtomicU64,
}

impl KeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached key for (password, salt), deriving and caching it
    /// on a miss
    ///
    /// A miss pays the full KDF cost; callers on latency-sensitive threads
    /// must route through a worker. Concurrent misses for the same pair may
    /// each derive; both arrive at the same key, so either insert wins.
    pub fn get_or_derive(&self, password: &str, salt: &[u8]) -> Result<DerivedKey> {
        if salt.len() != SALT_LEN {
            return Err(VaultError::InvalidSaltLength {
                expected: SALT_LEN,
                actual: salt.len(),
            });
        }
        let mut salt_bytes = [0u8; SALT_LEN];
        salt_bytes.copy_from_slice(salt);
        let cache_key = (password.to_string(), salt_bytes);

        if let Some(key) = self
            .entries
            .lock()
            .expect("key cache poisoned")
            .get(&cache_key)
        {
            debug!("key cache hit");
            return Ok(key.clone());
        }

        debug!("key cache miss, deriving");
        let key = derive_key(password, salt)?;
        self.derivations.fetch_add(1, Ordering::Relaxed);

        self.entries
            .lock()
            .expect("key cache poisoned")
            .insert(cache_key, key.clone());

        Ok(key)
    }

    /// Drop every cached key derived from `password`
    ///
    /// Called after a failed authentication: a wrong password string will
    /// never legitimately recur, so retaining its key only grows the cache.
    pub fn invalidate(&self, password: &str) {
        let mut entries = self.entries.lock().expect("key cache poisoned");
        let before = entries.len();
        entries.retain(|(pw, _), _| pw != password);
        if entries.len() < before {
            debug!("invalidated {} cached key(s)", before - entries.len());
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.lock().expect("key cache poisoned").len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of KDF runs performed through this cache
    pub fn derivation_count(&self) -> u64 {
        self.derivations.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("entries", &self.len())
            .field("derivations", &self.derivation_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_salt;

    #[test]
    fn test_hit_does_not_rederive() {
        let cache = KeyCache::new();
        let salt = generate_salt();

        let key1 = cache.get_or_derive("p@ss", &salt).unwrap();
        assert_eq!(cache.derivation_count(), 1);

        let key2 = cache.get_or_derive("p@ss", &salt).unwrap();
        assert_eq!(cache.derivation_count(), 1);
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_same_password_different_salt_rederives() {
        let cache = KeyCache::new();

        let key1 = cache.get_or_derive("p@ss", &generate_salt()).unwrap();
        let key2 = cache.get_or_derive("p@ss", &generate_salt()).unwrap();

        assert_eq!(cache.derivation_count(), 2);
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_invalidate_forces_rederive() {
        let cache = KeyCache::new();
        let salt = generate_salt();

        cache.get_or_derive("p@ss", &salt).unwrap();
        cache.invalidate("p@ss");
        assert!(cache.is_empty());

        cache.get_or_derive("p@ss", &salt).unwrap();
        assert_eq!(cache.derivation_count(), 2);
    }

    #[test]
    fn test_invalidate_drops_all_salts_for_password() {
        let cache = KeyCache::new();

        cache.get_or_derive("p@ss", &generate_salt()).unwrap();
        cache.get_or_derive("p@ss", &generate_salt()).unwrap();
        cache.get_or_derive("other", &generate_salt()).unwrap();
        assert_eq!(cache.len(), 3);

        cache.invalidate("p@ss");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalid_salt_length_rejected() {
        let cache = KeyCache::new();
        let result = cache.get_or_derive("p@ss", &[0u8; 8]);
        assert!(matches!(
            result,
            Err(VaultError::InvalidSaltLength { actual: 8, .. })
        ));
        assert_eq!(cache.derivation_count(), 0);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;

        let cache = Arc::new(KeyCache::new());
        let salt = generate_salt();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    cache
                        .get_or_derive(&format!("password-{}", i % 2), &salt)
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 2);
    }
}
