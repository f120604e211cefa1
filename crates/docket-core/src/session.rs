//! Vault session: custody of the derived master key.
//!
//! One `VaultSession` guards all key material behind a single mutex. Callers
//! unlock with the master password, read and write records through the typed
//! accessors, and lock to zeroize the key. A wrong password and a corrupt
//! vault file fail with the same error so the caller learns nothing about
//! which it was.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::audit::{self, AuditEntry};
use crate::crypto::{self, DERIVED_KEY_LEN, SALT_LEN};
use crate::error::VaultError;
use crate::models::{AgendaEvent, CaseFile};
use crate::paths::{Dataset, VaultPaths};
use crate::persist;
use crate::recovery::{self, RecoveryCode};
use crate::schema::{VaultFile, VaultFileV2};
use crate::settings::SettingsStore;

/// Key material held only while the vault is unlocked. The salt is public,
/// the key is wiped when the session locks or drops.
#[derive(Zeroize, ZeroizeOnDrop)]
struct SessionKey {
    key: [u8; DERIVED_KEY_LEN],
    #[zeroize(skip)]
    salt: [u8; SALT_LEN],
}

/// How `unlock` got the vault open.
#[derive(Debug)]
pub enum UnlockOutcome {
    /// An existing vault was opened. `migrated` is true when legacy files
    /// were re-encrypted under the current schema.
    Opened { migrated: bool },
    /// No vault existed, so one was initialised. The recovery code is
    /// returned exactly once and stored nowhere in clear.
    Created { recovery_code: RecoveryCode },
}

/// Counts reported back after a backup import.
#[derive(Debug, Clone)]
pub struct BackupSummary {
    pub cases: usize,
    pub events: usize,
    pub exported_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupPayload {
    exported_at: DateTime<Utc>,
    cases: Vec<CaseFile>,
    agenda: Vec<AgendaEvent>,
}

pub struct VaultSession {
    paths: VaultPaths,
    settings: SettingsStore,
    state: Mutex<Option<SessionKey>>,
}

impl VaultSession {
    /// Session rooted at the platform data directory.
    pub fn open_default() -> Result<Self, VaultError> {
        Self::open(VaultPaths::from_default_dir()?)
    }

    /// Session over an explicit directory. Creates the directory, tightens
    /// its permissions and clears staging files left by a crash.
    pub fn open(paths: VaultPaths) -> Result<Self, VaultError> {
        paths.ensure()?;
        let settings = SettingsStore::new(paths.settings());
        Ok(Self {
            paths,
            settings,
            state: Mutex::new(None),
        })
    }

    pub fn paths(&self) -> &VaultPaths {
        &self.paths
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn vault_exists(&self) -> bool {
        self.paths.dataset(Dataset::Cases).exists()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Unlock with the master password, creating the vault on first run.
    pub fn unlock(&self, password: &str) -> Result<UnlockOutcome, VaultError> {
        let mut state = self.state.lock();
        let primary = self.paths.dataset(Dataset::Cases);
        let raw = match persist::read_if_exists(&primary)? {
            Some(raw) => raw,
            None => {
                let recovery_code = self.create_vault(&mut state, password)?;
                return Ok(UnlockOutcome::Created { recovery_code });
            }
        };

        let file = VaultFile::parse(&raw).map_err(|_| VaultError::AuthenticationFailed)?;
        let salt = file.salt().map_err(|_| VaultError::AuthenticationFailed)?;
        let key = crypto::derive_master_key(password, &salt);
        file.verify_key(&key)
            .map_err(|_| VaultError::AuthenticationFailed)?;

        let session = SessionKey { key: *key, salt };
        let migrated = self.migrate_legacy(&session)?;
        self.record_event(&session, "vault unlocked");
        *state = Some(session);
        info!(migrated, "vault unlocked");
        Ok(UnlockOutcome::Opened { migrated })
    }

    /// Drop the key. Safe to call when already locked.
    pub fn lock(&self) {
        let mut state = self.state.lock();
        if let Some(session) = state.take() {
            self.record_event(&session, "vault locked");
            info!("vault locked");
        }
    }

    pub fn load_cases(&self) -> Result<Vec<CaseFile>, VaultError> {
        let plaintext = self.load_dataset(Dataset::Cases)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    pub fn save_cases(&self, cases: &[CaseFile]) -> Result<(), VaultError> {
        let json = Zeroizing::new(serde_json::to_vec(cases)?);
        self.store_dataset(Dataset::Cases, &json)
    }

    pub fn load_events(&self) -> Result<Vec<AgendaEvent>, VaultError> {
        let plaintext = self.load_dataset(Dataset::Agenda)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    pub fn save_events(&self, events: &[AgendaEvent]) -> Result<(), VaultError> {
        let json = Zeroizing::new(serde_json::to_vec(events)?);
        self.store_dataset(Dataset::Agenda, &json)
    }

    /// Re-derive under a fresh salt and re-encrypt every dataset. Ends with
    /// the session unlocked under the new key. The biometric credential is
    /// removed because it seals the old password.
    pub fn change_password(&self, current: &str, new: &str) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        let primary = self.paths.dataset(Dataset::Cases);
        let raw =
            persist::read_if_exists(&primary)?.ok_or(VaultError::AuthenticationFailed)?;
        let file = VaultFile::parse(&raw).map_err(|_| VaultError::AuthenticationFailed)?;
        let salt = file.salt().map_err(|_| VaultError::AuthenticationFailed)?;
        let old_key = crypto::derive_master_key(current, &salt);
        file.verify_key(&old_key)
            .map_err(|_| VaultError::AuthenticationFailed)?;

        // Decrypt everything before the first rewrite touches disk.
        let mut plaintexts = Vec::new();
        for dataset in Dataset::ALL {
            let plaintext = match persist::read_if_exists(&self.paths.dataset(dataset))? {
                Some(raw) => VaultFile::parse(&raw)
                    .and_then(|file| file.open(&old_key))
                    .map_err(|_| VaultError::AuthenticationFailed)?,
                None => Zeroizing::new(b"[]".to_vec()),
            };
            plaintexts.push((dataset, plaintext));
        }
        let journal = audit::read(&self.paths.audit(), &old_key).unwrap_or_default();

        let new_salt = crypto::generate_salt();
        let new_key = crypto::derive_master_key(new, &new_salt);
        for (dataset, plaintext) in &plaintexts {
            let sealed = VaultFileV2::seal(&new_key, &new_salt, plaintext)?;
            persist::write_atomic(&self.paths.dataset(*dataset), &sealed.to_json()?)?;
        }
        if let Err(err) = audit::write(&self.paths.audit(), &new_key, &new_salt, &journal) {
            warn!(%err, "audit journal not carried across the key change");
        }
        persist::remove_if_exists(&self.paths.biometric())?;

        let session = SessionKey {
            key: *new_key,
            salt: new_salt,
        };
        self.record_event(&session, "password changed");
        *state = Some(session);
        info!("master password changed");
        Ok(())
    }

    /// Write every record into one password-protected file outside the
    /// vault directory. The backup carries its own salt; its password need
    /// not match the vault's.
    pub fn export_backup(&self, dest: &Path, password: &str) -> Result<(), VaultError> {
        let payload = BackupPayload {
            exported_at: Utc::now(),
            cases: self.load_cases()?,
            agenda: self.load_events()?,
        };
        let json = Zeroizing::new(serde_json::to_vec(&payload)?);
        let salt = crypto::generate_salt();
        let key = crypto::derive_master_key(password, &salt);
        let sealed = VaultFileV2::seal(&key, &salt, &json)?;
        persist::write_atomic(dest, &sealed.to_json()?)?;
        self.record_event_if_unlocked("backup exported");
        info!(path = %dest.display(), "encrypted backup written");
        Ok(())
    }

    /// Replace the current records with the contents of a backup file.
    pub fn import_backup(
        &self,
        source: &Path,
        password: &str,
    ) -> Result<BackupSummary, VaultError> {
        if !self.is_unlocked() {
            return Err(VaultError::VaultLocked);
        }
        let raw = persist::read_if_exists(source)?.ok_or_else(|| {
            VaultError::Malformed(format!("no backup file at {}", source.display()))
        })?;
        let file = VaultFile::parse(&raw).map_err(|_| VaultError::AuthenticationFailed)?;
        let salt = file.salt().map_err(|_| VaultError::AuthenticationFailed)?;
        let key = crypto::derive_master_key(password, &salt);
        let plaintext = file
            .open(&key)
            .map_err(|_| VaultError::AuthenticationFailed)?;
        let payload: BackupPayload = serde_json::from_slice(&plaintext)?;

        self.save_cases(&payload.cases)?;
        self.save_events(&payload.agenda)?;
        self.record_event_if_unlocked("backup imported");
        info!(
            cases = payload.cases.len(),
            events = payload.agenda.len(),
            "backup imported"
        );
        Ok(BackupSummary {
            cases: payload.cases.len(),
            events: payload.agenda.len(),
            exported_at: payload.exported_at,
        })
    }

    /// Destroy the vault after a valid recovery code: every dataset, the
    /// audit journal, the biometric credential and the stored code digest
    /// are removed. The records are unrecoverable afterwards.
    pub fn reset_with_code(&self, code: &str) -> Result<(), VaultError> {
        recovery::verify(&self.settings, code)?;
        let mut state = self.state.lock();
        *state = None;
        for dataset in Dataset::ALL {
            persist::remove_if_exists(&self.paths.dataset(dataset))?;
        }
        persist::remove_if_exists(&self.paths.audit())?;
        persist::remove_if_exists(&self.paths.biometric())?;
        recovery::clear(&self.settings)?;
        warn!("vault reset, all encrypted records destroyed");
        Ok(())
    }

    /// Lifecycle events recorded while the vault was unlocked, oldest
    /// first. Requires the unlocked session.
    pub fn audit_log(&self) -> Result<Vec<AuditEntry>, VaultError> {
        let state = self.state.lock();
        let session = state.as_ref().ok_or(VaultError::VaultLocked)?;
        Ok(
            audit::read(&self.paths.audit(), &session.key).unwrap_or_else(|err| {
                warn!(%err, "audit journal unreadable");
                Vec::new()
            }),
        )
    }

    fn create_vault(
        &self,
        state: &mut Option<SessionKey>,
        password: &str,
    ) -> Result<RecoveryCode, VaultError> {
        let salt = crypto::generate_salt();
        let key = crypto::derive_master_key(password, &salt);
        let recovery_code = recovery::issue(&self.settings)?;
        for dataset in Dataset::ALL {
            let sealed = VaultFileV2::seal(&key, &salt, b"[]")?;
            persist::write_atomic(&self.paths.dataset(dataset), &sealed.to_json()?)?;
        }
        let session = SessionKey { key: *key, salt };
        self.record_event(&session, "vault created");
        *state = Some(session);
        info!("vault initialised");
        Ok(recovery_code)
    }

    /// Best effort: a failed journal write never fails the operation.
    fn record_event(&self, session: &SessionKey, event: &str) {
        if let Err(err) = audit::append(&self.paths.audit(), &session.key, &session.salt, event)
        {
            warn!(%err, event, "audit entry dropped");
        }
    }

    fn record_event_if_unlocked(&self, event: &str) {
        let state = self.state.lock();
        if let Some(session) = state.as_ref() {
            self.record_event(session, event);
        }
    }

    /// Re-encrypt any dataset still in the legacy schema. Runs on every
    /// unlock so a rewrite interrupted half way heals on the next one.
    fn migrate_legacy(&self, session: &SessionKey) -> Result<bool, VaultError> {
        let mut migrated = false;
        for dataset in Dataset::ALL {
            let path = self.paths.dataset(dataset);
            let raw = match persist::read_if_exists(&path)? {
                Some(raw) => raw,
                None => continue,
            };
            let file = VaultFile::parse(&raw).map_err(|_| VaultError::AuthenticationFailed)?;
            if !file.is_legacy() {
                continue;
            }
            let plaintext = file
                .open(&session.key)
                .map_err(|_| VaultError::AuthenticationFailed)?;
            let sealed = VaultFileV2::seal(&session.key, &session.salt, &plaintext)?;
            persist::write_atomic(&path, &sealed.to_json()?)?;
            info!(file = dataset.file_name(), "legacy vault file re-encrypted");
            migrated = true;
        }
        Ok(migrated)
    }

    fn load_dataset(&self, dataset: Dataset) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let state = self.state.lock();
        let session = state.as_ref().ok_or(VaultError::VaultLocked)?;
        let raw = match persist::read_if_exists(&self.paths.dataset(dataset))? {
            Some(raw) => raw,
            None => return Ok(Zeroizing::new(b"[]".to_vec())),
        };
        let file = VaultFile::parse(&raw).map_err(|_| VaultError::AuthenticationFailed)?;
        file.open(&session.key)
            .map_err(|_| VaultError::AuthenticationFailed)
    }

    fn store_dataset(&self, dataset: Dataset, plaintext: &[u8]) -> Result<(), VaultError> {
        let state = self.state.lock();
        let session = state.as_ref().ok_or(VaultError::VaultLocked)?;
        let sealed = VaultFileV2::seal(&session.key, &session.salt, plaintext)?;
        persist::write_atomic(&self.paths.dataset(dataset), &sealed.to_json()?)?;
        Ok(())
    }
}
