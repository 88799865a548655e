//! Database store - orchestrates open, save, and import
//!
//! A database named `X` lives in the storage directory as `X.db` (an
//! encrypted token over the serialized account map) plus `X.bin` (16 raw
//! salt bytes). Key derivation and the AEAD both run on a blocking worker;
//! the async entry points never stall the caller's scheduler thread.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::account::Database;
use crate::codec;
use crate::crypto::{self, SALT_LEN};
use crate::error::{Result, VaultError};
use crate::import::{self, ValidatedArchive};
use crate::key_cache::KeyCache;

/// Extension of the encrypted data file
const DATA_EXT: &str = "db";

/// Extension of the salt file
const SALT_EXT: &str = "bin";

/// Store for encrypted database files
pub struct DatabaseStore {
    /// Directory holding the `.db`/`.bin` file pairs
    storage_dir: PathBuf,
    /// Shared derived-key cache, injected by the application context
    key_cache: Arc<KeyCache>,
    /// Names of databases with an open or save currently running
    in_flight: Mutex<HashSet<String>>,
}

/// Removes a database name from the in-flight set when the operation ends,
/// on success and on every error path
struct InFlightGuard<'a> {
    store: &'a DatabaseStore,
    name: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.store
            .in_flight
            .lock()
            .expect("in-flight set poisoned")
            .remove(&self.name);
    }
}

impl DatabaseStore {
    /// Create a store over the given directory, creating it if needed
    pub fn new(storage_dir: PathBuf, key_cache: Arc<KeyCache>) -> Result<Self> {
        std::fs::create_dir_all(&storage_dir)?;

        debug!("database store initialized at {:?}", storage_dir);

        Ok(Self {
            storage_dir,
            key_cache,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// The directory this store reads and writes
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Path of the encrypted data file for a database name
    fn data_path(&self, name: &str) -> PathBuf {
        self.storage_dir.join(format!("{}.{}", name, DATA_EXT))
    }

    /// Path of the salt file for a database name
    fn salt_path(&self, name: &str) -> PathBuf {
        self.storage_dir.join(format!("{}.{}", name, SALT_EXT))
    }

    /// Whether a database with this name exists on disk
    pub fn contains(&self, name: &str) -> bool {
        self.data_path(name).exists() || self.salt_path(name).exists()
    }

    /// Create a new, empty database
    ///
    /// The database gets a fresh random salt and is persisted on its first
    /// `save`. Fails with `FileAlreadyExists` if the name is taken on disk.
    pub fn create(&self, name: &str, password: &str) -> Result<Database> {
        if self.contains(name) {
            return Err(VaultError::FileAlreadyExists {
                name: name.to_string(),
            });
        }

        info!("created database '{}'", name);
        Ok(Database::new(name, password))
    }

    fn begin(&self, name: &str) -> Result<InFlightGuard<'_>> {
        let mut jobs = self.in_flight.lock().expect("in-flight set poisoned");
        if !jobs.insert(name.to_string()) {
            return Err(VaultError::OperationInFlight {
                database: name.to_string(),
            });
        }
        Ok(InFlightGuard {
            store: self,
            name: name.to_string(),
        })
    }

    /// Open a database: read salt and ciphertext from disk, derive (or fetch
    /// the cached) key, decrypt, and decode into the account map
    ///
    /// A wrong password surfaces as `WrongPassword` and evicts the cached
    /// key for it. Plaintext that decrypts but will not decode surfaces as
    /// `CorruptedDatabase` - the password was right, so the cached key stays.
    pub async fn open(&self, database: &mut Database) -> Result<()> {
        let name = database.name().to_string();
        let _guard = self.begin(&name)?;

        info!("opening database '{}'", name);

        let salt_bytes = tokio::fs::read(self.salt_path(&name)).await?;
        if salt_bytes.len() != SALT_LEN {
            return Err(VaultError::InvalidSaltLength {
                expected: SALT_LEN,
                actual: salt_bytes.len(),
            });
        }
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&salt_bytes);

        let token = tokio::fs::read_to_string(self.data_path(&name)).await?;

        let password = database.password().expose().to_string();
        let cache = Arc::clone(&self.key_cache);
        let decrypted = tokio::task::spawn_blocking(move || {
            let key = cache.get_or_derive(&password, &salt)?;
            crypto::decrypt(&key, &token)
        })
        .await
        .map_err(|e| VaultError::EncryptionError(format!("worker task failed: {}", e)))?;

        let plaintext = match decrypted {
            Ok(plaintext) => plaintext,
            Err(VaultError::AuthenticationFailed) => {
                warn!("authentication failed for database '{}'", name);
                self.key_cache.invalidate(database.password().expose());
                return Err(VaultError::WrongPassword { database: name });
            }
            Err(VaultError::MalformedToken(reason)) => {
                warn!("malformed token for database '{}': {}", name, reason);
                return Err(VaultError::CorruptedDatabase { database: name });
            }
            Err(e) => return Err(e),
        };

        let accounts = match codec::deserialize(&plaintext) {
            Ok(accounts) => accounts,
            Err(VaultError::CorruptedFormat(reason)) => {
                // Authentication succeeded, so the password was right and
                // the cached key must be retained
                warn!("corrupted plaintext in database '{}': {}", name, reason);
                return Err(VaultError::CorruptedDatabase { database: name });
            }
            Err(e) => return Err(e),
        };

        info!("opened database '{}' ({} accounts)", name, accounts.len());

        database.set_salt(salt);
        database.mark_open(accounts, plaintext);
        Ok(())
    }

    /// Save a database: serialize, encrypt under its (cached) derived key,
    /// and atomically write the salt and token files
    ///
    /// Writes go to a temp file first and are renamed into place, so a
    /// crash mid-save never leaves a half-written database behind.
    pub async fn save(&self, database: &mut Database) -> Result<()> {
        let name = database.name().to_string();
        let _guard = self.begin(&name)?;

        info!(
            "saving database '{}' ({} accounts)",
            name,
            database.accounts().len()
        );

        let serialized = codec::serialize(database.accounts())?;

        let password = database.password().expose().to_string();
        let salt = *database.salt();
        let cache = Arc::clone(&self.key_cache);
        let plaintext = serialized.clone();
        let token = tokio::task::spawn_blocking(move || {
            let key = cache.get_or_derive(&password, &salt)?;
            crypto::encrypt(&key, &plaintext)
        })
        .await
        .map_err(|e| VaultError::EncryptionError(format!("worker task failed: {}", e)))??;

        write_atomic(&self.salt_path(&name), database.salt()).await?;
        write_atomic(&self.data_path(&name), token.as_bytes()).await?;

        database.mark_saved(serialized);

        info!("saved database '{}'", name);
        Ok(())
    }

    /// Whether the in-memory account map matches what was last written to
    /// (or read from) disk
    ///
    /// Compares canonical serialized forms against the snapshot kept from
    /// the last open or save, so no decryption is needed. Used to skip
    /// redundant saves, each of which costs a KDF run on a cache miss plus
    /// a disk write.
    pub fn is_saved(&self, database: &Database) -> Result<bool> {
        match database.last_saved() {
            None => Ok(false),
            Some(snapshot) => Ok(codec::serialize(database.accounts())? == snapshot),
        }
    }

    /// Validate an import archive and admit its files into the store
    ///
    /// The archive is checked structurally (see `import::validate`) without
    /// any decryption; on success its two members land in the storage
    /// directory and the returned name is openable through `open`.
    pub async fn import_archive(&self, archive_bytes: &[u8]) -> Result<String> {
        let ValidatedArchive { name, data, salt } = import::validate(archive_bytes)?;

        if self.contains(&name) {
            return Err(VaultError::FileAlreadyExists { name });
        }

        write_atomic(&self.salt_path(&name), &salt).await?;
        write_atomic(&self.data_path(&name), &data).await?;

        info!("imported database '{}'", name);
        Ok(name)
    }
}

impl std::fmt::Debug for DatabaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseStore")
            .field("storage_dir", &self.storage_dir)
            .finish()
    }
}

/// Write bytes to a temp file and rename it into place
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp: OsString = path.as_os_str().to_os_string();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    tokio::fs::write(&temp, bytes).await?;
    tokio::fs::rename(&temp, path).await?;
    Ok(())
}
