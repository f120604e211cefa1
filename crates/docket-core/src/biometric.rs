//! Biometric quick unlock.
//!
//! The master password is sealed under a key derived from hardware and
//! account identity, so the user can reopen the vault with Touch ID
//! instead of retyping it. No user secret enters the derivation: the
//! credential binds to this machine and account and is worthless anywhere
//! else. Platforms without a real biometric prompt report unavailable
//! rather than fabricate success.

use std::path::PathBuf;

use tracing::info;
use zeroize::Zeroizing;

use crate::crypto;
use crate::error::VaultError;
use crate::hwid;
use crate::paths::VaultPaths;
use crate::persist;
use crate::schema::{VaultFile, VaultFileV2};

/// Synchronous OS prompt capability.
pub trait BiometricGate: Send + Sync {
    /// True only when the platform exposes a prompt this process can
    /// invoke and verify.
    fn available(&self) -> bool;

    /// Show the prompt. `Ok(false)` is an explicit refusal by the user.
    fn authorize(&self, reason: &str) -> Result<bool, VaultError>;
}

/// Touch ID via a short LocalAuthentication helper process on macOS;
/// everywhere else the gate reports unavailable.
pub struct OsBiometricGate;

impl BiometricGate for OsBiometricGate {
    fn available(&self) -> bool {
        platform_probe()
    }

    fn authorize(&self, reason: &str) -> Result<bool, VaultError> {
        platform_prompt(reason)
    }
}

/// The encrypted credential file and the gate guarding it.
pub struct BiometricStore {
    path: PathBuf,
    identity: String,
    gate: Box<dyn BiometricGate>,
}

impl BiometricStore {
    pub fn new(paths: &VaultPaths) -> Self {
        Self::with_gate(paths.biometric(), machine_identity(), Box::new(OsBiometricGate))
    }

    /// Explicit path, identity and gate, for hosts and tests that supply
    /// their own prompt.
    pub fn with_gate(path: PathBuf, identity: String, gate: Box<dyn BiometricGate>) -> Self {
        Self {
            path,
            identity,
            gate,
        }
    }

    pub fn available(&self) -> bool {
        self.gate.available()
    }

    pub fn has_saved(&self) -> bool {
        self.path.exists()
    }

    /// Seal the master password under a fresh machine key. The salt is
    /// per-credential and lives in the file.
    pub fn save(&self, password: &str) -> Result<(), VaultError> {
        let salt = crypto::generate_salt();
        let key = crypto::derive_machine_key(&self.identity, &salt);
        let sealed = VaultFileV2::seal(&key, &salt, password.as_bytes())?;
        persist::write_atomic(&self.path, &sealed.to_json()?)?;
        info!("biometric credential saved");
        Ok(())
    }

    /// Prompt, then unseal the password. A credential that cannot be
    /// decrypted (changed hardware, damaged file) is `CredentialUnusable`
    /// and the caller falls back to password entry.
    pub fn retrieve(&self, reason: &str) -> Result<Zeroizing<String>, VaultError> {
        let raw =
            persist::read_if_exists(&self.path)?.ok_or(VaultError::CredentialMissing)?;
        if !self.gate.authorize(reason)? {
            return Err(VaultError::BiometricDenied);
        }
        let file = VaultFile::parse(&raw).map_err(|_| VaultError::CredentialUnusable)?;
        if file.is_legacy() {
            return Err(VaultError::CredentialUnusable);
        }
        let salt = file.salt().map_err(|_| VaultError::CredentialUnusable)?;
        let key = crypto::derive_machine_key(&self.identity, &salt);
        let plaintext = file.open(&key).map_err(|_| VaultError::CredentialUnusable)?;
        String::from_utf8(plaintext.to_vec())
            .map(Zeroizing::new)
            .map_err(|_| VaultError::CredentialUnusable)
    }

    pub fn clear(&self) -> Result<(), VaultError> {
        persist::remove_if_exists(&self.path)?;
        Ok(())
    }
}

/// Hardware id composed with the OS account: stable on one machine, never
/// portable.
fn machine_identity() -> String {
    let home = directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}{}{}", hwid::hardware_id(), whoami::username(), home)
}

#[cfg(target_os = "macos")]
fn platform_probe() -> bool {
    const PROBE: &str = "import LocalAuthentication\nlet ctx = LAContext()\nvar err: NSError?\nif ctx.canEvaluatePolicy(.deviceOwnerAuthenticationWithBiometrics, error: &err) { exit(0) } else { exit(1) }";
    run_swift(PROBE.to_string()).unwrap_or(false)
}

#[cfg(not(target_os = "macos"))]
fn platform_probe() -> bool {
    false
}

#[cfg(target_os = "macos")]
fn platform_prompt(reason: &str) -> Result<bool, VaultError> {
    const PROMPT: &str = "import LocalAuthentication\nlet ctx = LAContext()\nvar err: NSError?\nif ctx.canEvaluatePolicy(.deviceOwnerAuthenticationWithBiometrics, error: &err) {\n  let sema = DispatchSemaphore(value: 0)\n  var ok = false\n  ctx.evaluatePolicy(.deviceOwnerAuthenticationWithBiometrics, localizedReason: \"REASON\") { granted, _ in ok = granted; sema.signal() }\n  sema.wait()\n  if ok { exit(0) } else { exit(1) }\n} else { exit(1) }";

    if !platform_probe() {
        return Err(VaultError::BiometricUnavailable);
    }
    // The reason lands inside a Swift string literal.
    let sanitized = reason.replace(['"', '\\', '\n'], " ");
    run_swift(PROMPT.replace("REASON", &sanitized)).map_err(|err| {
        tracing::debug!(%err, "biometric helper failed to run");
        VaultError::BiometricUnavailable
    })
}

#[cfg(not(target_os = "macos"))]
fn platform_prompt(_reason: &str) -> Result<bool, VaultError> {
    Err(VaultError::BiometricUnavailable)
}

#[cfg(target_os = "macos")]
fn run_swift(source: String) -> std::io::Result<bool> {
    let path = std::env::temp_dir().join(format!("docket-bio-{}.swift", uuid::Uuid::new_v4()));
    std::fs::write(&path, source)?;
    let status = std::process::Command::new("swift").arg(&path).status();
    let _ = std::fs::remove_file(&path);
    Ok(status?.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct StubGate {
        available: bool,
        grant: bool,
    }

    impl BiometricGate for StubGate {
        fn available(&self) -> bool {
            self.available
        }

        fn authorize(&self, _reason: &str) -> Result<bool, VaultError> {
            if !self.available {
                return Err(VaultError::BiometricUnavailable);
            }
            Ok(self.grant)
        }
    }

    fn store(path: PathBuf, identity: &str, grant: bool) -> BiometricStore {
        BiometricStore::with_gate(
            path,
            identity.to_string(),
            Box::new(StubGate {
                available: true,
                grant,
            }),
        )
    }

    #[test]
    fn save_and_retrieve_roundtrip() {
        let dir = tempdir().unwrap();
        let store = store(dir.path().join("biometric.cred"), "machine-a", true);
        assert!(!store.has_saved());
        store.save("Hunter2!").unwrap();
        assert!(store.has_saved());
        let password = store.retrieve("unlock the vault").unwrap();
        assert_eq!(&*password, "Hunter2!");
    }

    #[test]
    fn refusal_keeps_the_password_sealed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("biometric.cred");
        store(path.clone(), "machine-a", true).save("Hunter2!").unwrap();

        let refusing = store(path, "machine-a", false);
        assert!(matches!(
            refusing.retrieve("unlock"),
            Err(VaultError::BiometricDenied)
        ));
    }

    #[test]
    fn missing_credential_never_prompts() {
        let dir = tempdir().unwrap();
        let store = store(dir.path().join("biometric.cred"), "machine-a", true);
        assert!(matches!(
            store.retrieve("unlock"),
            Err(VaultError::CredentialMissing)
        ));
    }

    #[test]
    fn foreign_machine_cannot_unseal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("biometric.cred");
        store(path.clone(), "machine-a", true).save("Hunter2!").unwrap();

        let elsewhere = store(path, "machine-b", true);
        assert!(matches!(
            elsewhere.retrieve("unlock"),
            Err(VaultError::CredentialUnusable)
        ));
    }

    #[test]
    fn damaged_credential_is_unusable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("biometric.cred");
        std::fs::write(&path, b"not a credential").unwrap();
        let store = store(path, "machine-a", true);
        assert!(matches!(
            store.retrieve("unlock"),
            Err(VaultError::CredentialUnusable)
        ));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("biometric.cred");
        let store = store(path.clone(), "machine-a", true);
        store.save("Hunter2!").unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(!store.has_saved());
    }

    #[test]
    fn unavailable_gate_blocks_retrieval() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("biometric.cred");
        store(path.clone(), "machine-a", true).save("Hunter2!").unwrap();

        let gate = StubGate {
            available: false,
            grant: false,
        };
        let blocked = BiometricStore::with_gate(path, "machine-a".to_string(), Box::new(gate));
        assert!(!blocked.available());
        assert!(matches!(
            blocked.retrieve("unlock"),
            Err(VaultError::BiometricUnavailable)
        ));
    }
}
