//! Encrypted journal of session lifecycle events.
//!
//! The journal is sealed under the session key like any dataset, holds at
//! most [`AUDIT_CAPACITY`] entries and is best effort: an entry that cannot
//! be written is dropped with a warning, and a journal that cannot be
//! decrypted reads as empty and is replaced by the next entry.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{DERIVED_KEY_LEN, SALT_LEN};
use crate::error::VaultError;
use crate::persist;
use crate::schema::{VaultFile, VaultFileV2};

pub const AUDIT_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event: String,
    pub time: DateTime<Utc>,
}

pub(crate) fn append(
    path: &Path,
    key: &[u8; DERIVED_KEY_LEN],
    salt: &[u8; SALT_LEN],
    event: &str,
) -> Result<(), VaultError> {
    let mut entries = read(path, key).unwrap_or_default();
    entries.push(AuditEntry {
        event: event.to_string(),
        time: Utc::now(),
    });
    if entries.len() > AUDIT_CAPACITY {
        let excess = entries.len() - AUDIT_CAPACITY;
        entries.drain(..excess);
    }
    write(path, key, salt, &entries)
}

pub(crate) fn write(
    path: &Path,
    key: &[u8; DERIVED_KEY_LEN],
    salt: &[u8; SALT_LEN],
    entries: &[AuditEntry],
) -> Result<(), VaultError> {
    let json = serde_json::to_vec(entries)?;
    let sealed = VaultFileV2::seal(key, salt, &json)?;
    persist::write_atomic(path, &sealed.to_json()?)?;
    Ok(())
}

pub(crate) fn read(
    path: &Path,
    key: &[u8; DERIVED_KEY_LEN],
) -> Result<Vec<AuditEntry>, VaultError> {
    let raw = match persist::read_if_exists(path)? {
        Some(raw) => raw,
        None => return Ok(Vec::new()),
    };
    let file = VaultFile::parse(&raw)?;
    let plaintext = file.open(key)?;
    Ok(serde_json::from_slice(&plaintext)?)
}
