//! Key derivation and the authenticated file codec.
//!
//! No custom crypto; every primitive comes from the RustCrypto crates.
//! PBKDF2-HMAC-SHA-256 derives the master key, PBKDF2-HMAC-SHA-512 derives
//! the machine key and the recovery digest. Files are sealed with
//! AES-256-GCM using a 16-byte IV and a detached 16-byte tag; AES-256-CBC
//! is accepted read-only for files written before the AEAD format.

use aes::Aes256;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::{AeadInPlace, AesGcm, KeyInit};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use crate::error::VaultError;

pub const KDF_ITERATIONS: u32 = 100_000;
pub const DERIVED_KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
pub const RECOVERY_SALT_LEN: usize = 32;
pub const RECOVERY_DIGEST_LEN: usize = 64;

/// AES-256-GCM parameterised for the 16-byte IV the file format carries.
type FileCipher = AesGcm<Aes256, U16>;
type LegacyDecryptor = cbc::Decryptor<Aes256>;

/// Derive the 32-byte master key from a password and per-vault salt.
pub fn derive_master_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; DERIVED_KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut *key);
    key
}

/// Derive the machine key that seals the biometric credential.
pub fn derive_machine_key(identity: &str, salt: &[u8]) -> Zeroizing<[u8; DERIVED_KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    pbkdf2_hmac::<Sha512>(identity.as_bytes(), salt, KDF_ITERATIONS, &mut *key);
    key
}

/// Digest stored in settings to verify a recovery code without keeping it.
pub fn recovery_digest(code: &str, salt: &[u8]) -> [u8; RECOVERY_DIGEST_LEN] {
    let mut digest = [0u8; RECOVERY_DIGEST_LEN];
    pbkdf2_hmac::<Sha512>(code.as_bytes(), salt, KDF_ITERATIONS, &mut digest);
    digest
}

/// Output of one AEAD seal.
pub struct SealedBlob {
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

/// Encrypt under a fresh random IV. A new IV is drawn on every call,
/// including retries of a failed write.
pub fn seal(key: &[u8; DERIVED_KEY_LEN], plaintext: &[u8]) -> Result<SealedBlob, VaultError> {
    let cipher = FileCipher::new_from_slice(key).map_err(|_| VaultError::Encrypt)?;
    let iv = generate_iv();
    let mut buf = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buf)
        .map_err(|_| VaultError::Encrypt)?;
    Ok(SealedBlob {
        iv,
        tag: tag.into(),
        ciphertext: buf,
    })
}

/// Decrypt a detached-tag blob. Any mismatch is `Integrity`; no plaintext
/// ever comes back from a failed authentication.
pub fn open(
    key: &[u8; DERIVED_KEY_LEN],
    iv: &[u8; IV_LEN],
    tag: &[u8; TAG_LEN],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let cipher = FileCipher::new_from_slice(key).map_err(|_| VaultError::Integrity)?;
    let mut buf = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(iv),
            b"",
            &mut buf,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| VaultError::Integrity)?;
    Ok(Zeroizing::new(buf))
}

/// Decrypt a pre-AEAD CBC payload. Decode only; nothing writes this format.
pub fn open_legacy_cbc(
    key: &[u8; DERIVED_KEY_LEN],
    iv: &[u8; IV_LEN],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let plaintext = LegacyDecryptor::new_from_slices(key, iv)
        .map_err(|_| VaultError::Integrity)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| VaultError::Integrity)?;
    Ok(Zeroizing::new(plaintext))
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

pub fn generate_recovery_salt() -> [u8; RECOVERY_SALT_LEN] {
    let mut salt = [0u8; RECOVERY_SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}
