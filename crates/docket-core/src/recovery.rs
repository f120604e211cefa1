//! One-time recovery codes.
//!
//! The code is shown to the user exactly once at vault creation. Settings
//! keep a salted PBKDF2-SHA-512 digest of it; a successful reset destroys
//! the vault files and the digest, so a code can never be replayed.

use std::fmt;

use rand::RngCore;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::crypto;
use crate::error::VaultError;
use crate::settings::SettingsStore;

/// 32 uppercase hex characters backed by 16 bytes of OS randomness.
pub struct RecoveryCode(Zeroizing<String>);

impl RecoveryCode {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        RecoveryCode(Zeroizing::new(hex::encode_upper(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// The code itself must never land in logs or debug output.
impl fmt::Debug for RecoveryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecoveryCode(..)")
    }
}

/// Hash a fresh code into `store`; the returned code exists nowhere else.
pub fn issue(store: &SettingsStore) -> Result<RecoveryCode, VaultError> {
    let code = RecoveryCode::generate();
    let salt = crypto::generate_recovery_salt();
    let digest = crypto::recovery_digest(code.as_str(), &salt);

    let mut settings = store.load();
    settings.recovery_hash = Some(hex::encode(digest));
    settings.recovery_salt = Some(hex::encode(salt));
    store.save(&settings)?;
    info!("recovery code issued");
    Ok(code)
}

/// Check `code` against the stored digest. Mismatch and missing
/// configuration are the same outward error.
pub fn verify(store: &SettingsStore, code: &str) -> Result<(), VaultError> {
    let settings = store.load();
    let (hash_hex, salt_hex) = match (&settings.recovery_hash, &settings.recovery_salt) {
        (Some(hash), Some(salt)) => (hash, salt),
        _ => {
            debug!("recovery verification attempted without a configured code");
            return Err(VaultError::RecoveryMismatch);
        }
    };
    let salt = hex::decode(salt_hex).map_err(|_| VaultError::RecoveryMismatch)?;
    let expected = hex::decode(hash_hex).map_err(|_| VaultError::RecoveryMismatch)?;
    let digest = crypto::recovery_digest(&code.to_uppercase(), &salt);
    if digest.as_slice() != expected.as_slice() {
        return Err(VaultError::RecoveryMismatch);
    }
    Ok(())
}

/// Drop the stored digest after a successful reset.
pub fn clear(store: &SettingsStore) -> Result<(), VaultError> {
    let mut settings = store.load();
    settings.recovery_hash = None;
    settings.recovery_salt = None;
    store.save(&settings)
}
