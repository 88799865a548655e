//! Error types for vault-core

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Invalid salt length: expected {expected} bytes, got {actual}")]
    InvalidSaltLength { expected: usize, actual: usize },

    #[error("Authentication failed - token does not verify under this key")]
    AuthenticationFailed,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Corrupted format: {0}")]
    CorruptedFormat(String),

    #[error("Wrong password for database '{database}'")]
    WrongPassword { database: String },

    #[error("Database '{database}' is corrupted")]
    CorruptedDatabase { database: String },

    #[error("Import archive must contain exactly 2 files, found {count}")]
    WrongFileCount { count: usize },

    #[error("Import archive members '{first}' and '{second}' do not share a base name")]
    NameMismatch { first: String, second: String },

    #[error("Salt member '{member}' must be exactly 16 bytes, got {size}")]
    BadSaltSize { member: String, size: u64 },

    #[error("Data member '{member}' is too small: {size} bytes (minimum 100)")]
    TooSmall { member: String, size: u64 },

    #[error("A database named '{name}' already exists")]
    FileAlreadyExists { name: String },

    #[error("An open or save operation is already running for database '{database}'")]
    OperationInFlight { database: String },

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
