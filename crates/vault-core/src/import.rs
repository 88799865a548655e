//! Import archive validation
//!
//! An import archive is a tar bundle carrying one database as a `.db`/`.bin`
//! file pair sharing a base name (legacy exports used `.bin` for both).
//! Validation is purely structural - member count, names, and sizes - and
//! never attempts decryption; a successfully admitted archive is opened
//! through the normal store path, where authentication happens.

use std::io::Read;
use std::path::Path;

use tar::Archive;
use tracing::debug;

use crate::crypto::SALT_LEN;
use crate::error::{Result, VaultError};

/// Minimum size of the data member, in bytes
///
/// Rejects trivially truncated or empty files before any decryption is
/// attempted. A real token over even an empty account map is longer.
pub const MIN_DATA_LEN: usize = 100;

/// An archive that passed validation, ready to be admitted into a store
#[derive(Debug)]
pub struct ValidatedArchive {
    /// Logical database name (shared base name of the members)
    pub name: String,
    /// Content of the encrypted data member
    pub data: Vec<u8>,
    /// Content of the salt member
    pub salt: Vec<u8>,
}

/// Validate a tar archive against the import constraints
///
/// Checks, in order: exactly two regular-file members (`WrongFileCount`),
/// members share a base name (`NameMismatch`), salt member is exactly 16
/// bytes (`BadSaltSize`), data member is at least 100 bytes (`TooSmall`).
/// Every error carries the offending names or sizes for user-facing
/// messages.
pub fn validate(archive_bytes: &[u8]) -> Result<ValidatedArchive> {
    let mut archive = Archive::new(archive_bytes);
    let mut members: Vec<(String, Vec<u8>)> = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| VaultError::CorruptedFormat(format!("unreadable archive: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| VaultError::CorruptedFormat(format!("unreadable archive: {}", e)))?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry
            .path()
            .map_err(|e| VaultError::CorruptedFormat(format!("bad member path: {}", e)))?
            .into_owned();
        let name = member_name(&path)?;

        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| VaultError::CorruptedFormat(format!("unreadable member: {}", e)))?;

        members.push((name, content));
    }

    if members.len() != 2 {
        return Err(VaultError::WrongFileCount {
            count: members.len(),
        });
    }

    let (second_name, second) = members.pop().expect("two members");
    let (first_name, first) = members.pop().expect("two members");

    if stem(&first_name) != stem(&second_name) {
        return Err(VaultError::NameMismatch {
            first: first_name,
            second: second_name,
        });
    }

    let ((data_name, data), (salt_name, salt)) =
        classify((first_name, first), (second_name, second))?;

    if salt.len() != SALT_LEN {
        return Err(VaultError::BadSaltSize {
            member: salt_name,
            size: salt.len() as u64,
        });
    }

    if data.len() < MIN_DATA_LEN {
        return Err(VaultError::TooSmall {
            member: data_name,
            size: data.len() as u64,
        });
    }

    let name = stem(&data_name).to_string();
    debug!("validated import archive for database '{}'", name);

    Ok(ValidatedArchive { name, data, salt })
}

/// Member file name with any leading `src/` path component stripped
fn member_name(path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .ok_or_else(|| VaultError::CorruptedFormat(format!("bad member path: {:?}", path)))?;

    Ok(file_name.to_string_lossy().into_owned())
}

/// Base name without the extension
fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Extension after the final dot, if any
fn extension(name: &str) -> Option<&str> {
    name.rfind('.').map(|idx| &name[idx + 1..])
}

/// Decide which member is the data file and which is the salt
///
/// A `.db`/`.bin` pair is unambiguous. Legacy exports named both members
/// `.bin`; there the salt is the smaller member. Any other extension pair
/// is not a recognizable database bundle.
fn classify(
    a: (String, Vec<u8>),
    b: (String, Vec<u8>),
) -> Result<((String, Vec<u8>), (String, Vec<u8>))> {
    let ext_a = extension(&a.0).unwrap_or("");
    let ext_b = extension(&b.0).unwrap_or("");

    match (ext_a, ext_b) {
        ("db", "bin") => Ok((a, b)),
        ("bin", "db") => Ok((b, a)),
        ("bin", "bin") => {
            if a.1.len() >= b.1.len() {
                Ok((a, b))
            } else {
                Ok((b, a))
            }
        }
        _ => Err(VaultError::NameMismatch {
            first: a.0,
            second: b.0,
        }),
    }
}
