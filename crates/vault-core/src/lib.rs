//! # vault-core
//!
//! Core vault functionality for Keeper including:
//! - PBKDF2-HMAC-SHA256 key derivation with process-wide key caching
//! - Authenticated encryption tokens over AES-256-GCM
//! - Async encrypted database storage with atomic writes
//! - Structural validation of import archives
//!
//! The UI layer drives everything through [`DatabaseStore`]: create or open
//! a [`Database`] with a password, mutate its accounts, save, and check
//! [`DatabaseStore::is_saved`] to skip redundant writes. The [`KeyCache`] is
//! owned by the application context and shared with the store by handle.

pub mod account;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod import;
pub mod key_cache;
pub mod store;

pub use account::{Account, AccountMap, Database};
pub use crypto::{derive_key, generate_salt, DerivedKey, SecretString, SALT_LEN};
pub use error::{Result, VaultError};
pub use import::ValidatedArchive;
pub use key_cache::KeyCache;
pub use store::DatabaseStore;
