//! Account and database model types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::{generate_salt, SecretString, SALT_LEN};

/// A single credential record
///
/// The account name doubles as the record's key inside its owning database,
/// so it must be non-empty and unique there. Passwords are held in memory
/// only; they leave the process exclusively inside an encrypted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Unique name within the owning database
    pub account_name: String,

    /// Login name for the service
    #[serde(default)]
    pub username: String,

    /// Contact email
    #[serde(default)]
    pub email: String,

    /// The stored password
    #[serde(default)]
    pub password: String,

    /// Free-text date field
    #[serde(default)]
    pub date: String,

    /// Free-text comment
    #[serde(default)]
    pub comment: String,

    /// Attachment name -> base64-encoded content
    #[serde(default)]
    pub attached_files: BTreeMap<String, String>,
}

impl Account {
    /// Create a new account with the given name and password
    pub fn new(name: &str, password: &str) -> Self {
        Self {
            account_name: name.to_string(),
            username: String::new(),
            email: String::new(),
            password: password.to_string(),
            date: String::new(),
            comment: String::new(),
            attached_files: BTreeMap::new(),
        }
    }
}

/// The plaintext credential set of one database
///
/// A `BTreeMap` keyed by account name: names are unique and iteration order
/// is stable, which keeps the serialized form canonical.
pub type AccountMap = BTreeMap<String, Account>;

/// One named encrypted vault
///
/// Created empty with a fresh random salt; becomes open once its encrypted
/// file has been read and decrypted into `data`. Lives in memory for the
/// process lifetime - the password is never persisted.
pub struct Database {
    name: String,
    password: SecretString,
    salt: [u8; SALT_LEN],
    data: AccountMap,
    open: bool,
    /// Serialized form of the data as last written to (or read from) disk
    last_saved: Option<Vec<u8>>,
}

impl Database {
    /// Create a new empty database with a fresh random salt
    pub fn new(name: &str, password: &str) -> Self {
        Self {
            name: name.to_string(),
            password: SecretString::new(password.to_string()),
            salt: generate_salt(),
            data: AccountMap::new(),
            open: false,
            last_saved: None,
        }
    }

    /// Create a handle for a database that already exists on disk
    ///
    /// The salt is read from disk during `open`, so the placeholder here is
    /// never used for derivation.
    pub fn for_existing(name: &str, password: &str) -> Self {
        Self {
            name: name.to_string(),
            password: SecretString::new(password.to_string()),
            salt: [0u8; SALT_LEN],
            data: AccountMap::new(),
            open: false,
            last_saved: None,
        }
    }

    /// Database name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vault password
    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Change the in-memory password used for subsequent saves
    pub fn set_password(&mut self, password: &str) {
        self.password = SecretString::new(password.to_string());
    }

    /// Salt bytes
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// Whether the database has been decrypted into memory
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The account map (empty until the database is opened)
    pub fn accounts(&self) -> &AccountMap {
        &self.data
    }

    /// Look up one account by name
    pub fn account(&self, name: &str) -> Option<&Account> {
        self.data.get(name)
    }

    /// Insert or replace an account, keyed by its name
    pub fn put_account(&mut self, account: Account) {
        self.data.insert(account.account_name.clone(), account);
    }

    /// Remove an account by name, returning it if present
    pub fn remove_account(&mut self, name: &str) -> Option<Account> {
        self.data.remove(name)
    }

    pub(crate) fn set_salt(&mut self, salt: [u8; SALT_LEN]) {
        self.salt = salt;
    }

    pub(crate) fn mark_open(&mut self, data: AccountMap, serialized: Vec<u8>) {
        self.data = data;
        self.last_saved = Some(serialized);
        self.open = true;
    }

    pub(crate) fn mark_saved(&mut self, serialized: Vec<u8>) {
        self.last_saved = Some(serialized);
        self.open = true;
    }

    pub(crate) fn last_saved(&self) -> Option<&[u8]> {
        self.last_saved.as_deref()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("open", &self.open)
            .field("accounts", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_database_is_closed_and_empty() {
        let db = Database::new("vault", "p@ss");

        assert_eq!(db.name(), "vault");
        assert!(!db.is_open());
        assert!(db.accounts().is_empty());
        assert_eq!(db.salt().len(), SALT_LEN);
    }

    #[test]
    fn test_fresh_salts_differ() {
        let a = Database::new("a", "pw");
        let b = Database::new("b", "pw");
        assert_ne!(a.salt(), b.salt());
    }

    #[test]
    fn test_put_and_remove_account() {
        let mut db = Database::new("vault", "p@ss");

        db.put_account(Account::new("github", "hunter2"));
        assert_eq!(db.account("github").unwrap().password, "hunter2");

        let removed = db.remove_account("github").unwrap();
        assert_eq!(removed.account_name, "github");
        assert!(db.account("github").is_none());
    }

    #[test]
    fn test_put_account_replaces_by_name() {
        let mut db = Database::new("vault", "p@ss");

        db.put_account(Account::new("github", "old"));
        db.put_account(Account::new("github", "new"));

        assert_eq!(db.accounts().len(), 1);
        assert_eq!(db.account("github").unwrap().password, "new");
    }

    #[test]
    fn test_debug_hides_password() {
        let db = Database::new("vault", "p@ss");
        let debug = format!("{:?}", db);
        assert!(!debug.contains("p@ss"));
    }
}
