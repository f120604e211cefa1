use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Wrong master password or an unreadable vault file. The two cases are
    /// deliberately indistinguishable to the caller.
    #[error("master password incorrect or vault file corrupted")]
    AuthenticationFailed,

    #[error("vault is locked")]
    VaultLocked,

    /// Authentication tag mismatch. Surfaced as `AuthenticationFailed` for
    /// vault data and as `CredentialUnusable` for the biometric store.
    #[error("ciphertext failed authentication")]
    Integrity,

    #[error("recovery code not valid")]
    RecoveryMismatch,

    #[error("biometric authentication is not available on this device")]
    BiometricUnavailable,

    #[error("biometric prompt was not authorized")]
    BiometricDenied,

    #[error("no biometric credential is stored")]
    CredentialMissing,

    #[error("stored biometric credential cannot be used on this device")]
    CredentialUnusable,

    #[error("malformed vault file: {0}")]
    Malformed(String),

    #[error("encryption failed")]
    Encrypt,

    #[error("cannot determine an application data directory")]
    DataDirUnavailable,

    #[error("hex field: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
