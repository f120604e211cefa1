//! On-disk vault file formats.
//!
//! Current format (v2): AES-256-GCM with a detached tag, all binary fields
//! hex-encoded. Legacy format (v1): AES-256-CBC plus a known-plaintext
//! check token. v1 is decode-only; every write emits v2, so a vault touched
//! once by this code never carries the check token again.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{self, DERIVED_KEY_LEN, IV_LEN, SALT_LEN, TAG_LEN};
use crate::error::VaultError;

pub const SCHEMA_VERSION: u32 = 2;
/// Sealed into legacy files at creation time; compared on unlock.
pub const LEGACY_CHECK_TOKEN: &[u8] = b"DOCKET_OK";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultFileV2 {
    pub v: u32,
    pub salt: String,
    pub iv: String,
    #[serde(rename = "authTag")]
    pub auth_tag: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultFileV1 {
    pub salt: String,
    pub iv: String,
    pub check: String,
    pub data: String,
}

/// The two formats a vault file on disk can take. Decoded by shape: v2
/// carries `v` and `authTag`, v1 carries `check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VaultFile {
    Current(VaultFileV2),
    Legacy(VaultFileV1),
}

impl VaultFile {
    pub fn parse(raw: &[u8]) -> Result<Self, VaultError> {
        let file: VaultFile = serde_json::from_slice(raw)?;
        if let VaultFile::Current(inner) = &file {
            if inner.v != SCHEMA_VERSION {
                return Err(VaultError::Malformed(format!(
                    "unsupported schema version {}",
                    inner.v
                )));
            }
        }
        Ok(file)
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, VaultFile::Legacy(_))
    }

    /// The key-derivation salt, fixed for the life of the vault.
    pub fn salt(&self) -> Result<[u8; SALT_LEN], VaultError> {
        let salt = match self {
            VaultFile::Current(f) => &f.salt,
            VaultFile::Legacy(f) => &f.salt,
        };
        decode_fixed(salt, "salt")
    }

    /// Decrypt the payload with an already-derived key.
    pub fn open(&self, key: &[u8; DERIVED_KEY_LEN]) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        match self {
            VaultFile::Current(f) => {
                let iv: [u8; IV_LEN] = decode_fixed(&f.iv, "iv")?;
                let tag: [u8; TAG_LEN] = decode_fixed(&f.auth_tag, "authTag")?;
                let data = hex::decode(&f.data)?;
                crypto::open(key, &iv, &tag, &data)
            }
            VaultFile::Legacy(f) => {
                let iv: [u8; IV_LEN] = decode_fixed(&f.iv, "iv")?;
                let data = hex::decode(&f.data)?;
                crypto::open_legacy_cbc(key, &iv, &data)
            }
        }
    }

    /// Authenticate a candidate key without handing out the payload. For v2
    /// the AEAD tag is the proof; for v1 the check token is.
    pub fn verify_key(&self, key: &[u8; DERIVED_KEY_LEN]) -> Result<(), VaultError> {
        match self {
            VaultFile::Current(_) => self.open(key).map(|_| ()),
            VaultFile::Legacy(f) => {
                let iv: [u8; IV_LEN] = decode_fixed(&f.iv, "iv")?;
                let check = hex::decode(&f.check)?;
                let token = crypto::open_legacy_cbc(key, &iv, &check)?;
                if token.as_slice() != LEGACY_CHECK_TOKEN {
                    return Err(VaultError::Integrity);
                }
                Ok(())
            }
        }
    }
}

impl VaultFileV2 {
    /// Seal plaintext into a fresh v2 file. The salt is carried through
    /// unchanged; the IV is new on every call.
    pub fn seal(
        key: &[u8; DERIVED_KEY_LEN],
        salt: &[u8; SALT_LEN],
        plaintext: &[u8],
    ) -> Result<Self, VaultError> {
        let blob = crypto::seal(key, plaintext)?;
        Ok(Self {
            v: SCHEMA_VERSION,
            salt: hex::encode(salt),
            iv: hex::encode(blob.iv),
            auth_tag: hex::encode(blob.tag),
            data: hex::encode(&blob.ciphertext),
        })
    }

    pub fn to_json(&self) -> Result<Vec<u8>, VaultError> {
        Ok(serde_json::to_vec(self)?)
    }
}

fn decode_fixed<const N: usize>(field: &str, name: &str) -> Result<[u8; N], VaultError> {
    let bytes = hex::decode(field)?;
    <[u8; N]>::try_from(bytes.as_slice())
        .map_err(|_| VaultError::Malformed(format!("{name} must be {N} bytes")))
}
