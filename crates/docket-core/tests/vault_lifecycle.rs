//! End-to-end flows over the public API, including on-disk fixtures that
//! imitate files written by releases that predate the authenticated format.

use std::path::Path;

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use tempfile::tempdir;

use docket_core::biometric::{BiometricGate, BiometricStore};
use docket_core::models::{AgendaEvent, CaseFile, EventCategory, MatterType};
use docket_core::{Dataset, UnlockOutcome, VaultError, VaultPaths, VaultSession};

type CbcEnc = cbc::Encryptor<Aes256>;

const LEGACY_SALT: [u8; 16] = *b"fixture-salt-16b";
const LEGACY_IV: [u8; 16] = *b"fixture-iv-16byt";

fn cbc_hex(key: &[u8; 32], iv: &[u8; 16], plaintext: &[u8]) -> String {
    let ciphertext = CbcEnc::new_from_slices(key, iv)
        .unwrap()
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    hex::encode(ciphertext)
}

/// Write a pre-AEAD vault file the way the old CBC releases did: one IV
/// shared by the check token and the payload.
fn write_legacy_file(path: &Path, password: &str, records_json: &[u8]) {
    let key = docket_core::crypto::derive_master_key(password, &LEGACY_SALT);
    let check = cbc_hex(&key, &LEGACY_IV, docket_core::schema::LEGACY_CHECK_TOKEN);
    let data = cbc_hex(&key, &LEGACY_IV, records_json);
    let json = format!(
        r#"{{"salt":"{}","iv":"{}","check":"{}","data":"{}"}}"#,
        hex::encode(LEGACY_SALT),
        hex::encode(LEGACY_IV),
        check,
        data,
    );
    std::fs::write(path, json).unwrap();
}

fn sample_case() -> CaseFile {
    let mut case = CaseFile::new(MatterType::Civil, "Allianz SPA", "Damages claim");
    case.docket_number = "RG 4521/2026".to_string();
    case
}

fn sample_event() -> AgendaEvent {
    let mut event = AgendaEvent::new(
        "Udienza Tribunale di Roma",
        chrono::NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
        EventCategory::Hearing,
    );
    event.time_start = "09:00".to_string();
    event.time_end = "10:30".to_string();
    event
}

#[test]
fn full_lifecycle_round_trip() {
    let dir = tempdir().unwrap();
    let session = VaultSession::open(VaultPaths::at(dir.path())).unwrap();

    let code = match session.unlock("Correct1!").unwrap() {
        UnlockOutcome::Created { recovery_code } => recovery_code,
        UnlockOutcome::Opened { .. } => panic!("first unlock must create the vault"),
    };
    assert_eq!(code.as_str().len(), 32);

    session.save_cases(&[sample_case()]).unwrap();
    session.save_events(&[sample_event()]).unwrap();
    session.lock();

    // A wrong password is rejected and leaves the file byte-identical.
    let bytes_before = std::fs::read(session.paths().dataset(Dataset::Cases)).unwrap();
    assert!(matches!(
        session.unlock("Wrong1!"),
        Err(VaultError::AuthenticationFailed)
    ));
    let bytes_after = std::fs::read(session.paths().dataset(Dataset::Cases)).unwrap();
    assert_eq!(bytes_before, bytes_after);

    match session.unlock("Correct1!").unwrap() {
        UnlockOutcome::Opened { migrated } => assert!(!migrated),
        UnlockOutcome::Created { .. } => panic!("vault must persist across sessions"),
    }
    let cases = session.load_cases().unwrap();
    assert_eq!(cases[0].docket_number, "RG 4521/2026");
    let events = session.load_events().unwrap();
    assert_eq!(events[0].time_start, "09:00");
}

#[test]
fn legacy_vault_migrates_transparently() {
    let dir = tempdir().unwrap();
    let cases_json = serde_json::to_vec(&vec![sample_case()]).unwrap();
    let agenda_json = serde_json::to_vec(&vec![sample_event()]).unwrap();
    write_legacy_file(&dir.path().join("cases.vault"), "LegacyPass1!", &cases_json);
    write_legacy_file(&dir.path().join("agenda.vault"), "LegacyPass1!", &agenda_json);

    let session = VaultSession::open(VaultPaths::at(dir.path())).unwrap();
    match session.unlock("LegacyPass1!").unwrap() {
        UnlockOutcome::Opened { migrated } => assert!(migrated),
        UnlockOutcome::Created { .. } => panic!("fixture vault not recognised"),
    }

    // Both files are rewritten in the current schema, salt preserved,
    // check token gone for good.
    for name in ["cases.vault", "agenda.vault"] {
        let raw = std::fs::read_to_string(dir.path().join(name)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["v"], 2);
        assert!(value.get("authTag").is_some());
        assert!(value.get("check").is_none());
        assert_eq!(value["salt"], hex::encode(LEGACY_SALT));
    }

    let cases = session.load_cases().unwrap();
    assert_eq!(cases[0].client, "Allianz SPA");
    let events = session.load_events().unwrap();
    assert_eq!(events[0].category, EventCategory::Hearing);

    session.lock();
    match session.unlock("LegacyPass1!").unwrap() {
        UnlockOutcome::Opened { migrated } => assert!(!migrated),
        UnlockOutcome::Created { .. } => panic!("vault lost after migration"),
    }
}

#[test]
fn legacy_vault_rejects_a_wrong_password() {
    let dir = tempdir().unwrap();
    let cases_json = serde_json::to_vec(&vec![sample_case()]).unwrap();
    write_legacy_file(&dir.path().join("cases.vault"), "LegacyPass1!", &cases_json);

    let session = VaultSession::open(VaultPaths::at(dir.path())).unwrap();
    assert!(matches!(
        session.unlock("NotThePassword1!"),
        Err(VaultError::AuthenticationFailed)
    ));
    assert!(!session.is_unlocked());
}

#[test]
fn backup_moves_records_between_vaults() {
    let source_dir = tempdir().unwrap();
    let target_dir = tempdir().unwrap();
    let backup_path = source_dir.path().join("docket-backup.vault");

    let source = VaultSession::open(VaultPaths::at(source_dir.path().join("data"))).unwrap();
    source.unlock("SourcePass1!").unwrap();
    source.save_cases(&[sample_case()]).unwrap();
    source.save_events(&[sample_event()]).unwrap();
    source.export_backup(&backup_path, "BackupPass1!").unwrap();

    let target = VaultSession::open(VaultPaths::at(target_dir.path())).unwrap();
    target.unlock("TargetPass1!").unwrap();

    assert!(matches!(
        target.import_backup(&backup_path, "WrongBackupPass!"),
        Err(VaultError::AuthenticationFailed)
    ));
    assert!(target.load_cases().unwrap().is_empty());

    let summary = target.import_backup(&backup_path, "BackupPass1!").unwrap();
    assert_eq!(summary.cases, 1);
    assert_eq!(summary.events, 1);
    assert_eq!(target.load_cases().unwrap()[0].client, "Allianz SPA");
    assert_eq!(
        target.load_events().unwrap()[0].title,
        "Udienza Tribunale di Roma"
    );
}

#[test]
fn recovery_reset_makes_room_for_a_new_vault() {
    let dir = tempdir().unwrap();
    let session = VaultSession::open(VaultPaths::at(dir.path())).unwrap();
    let first_code = match session.unlock("FirstPass1!").unwrap() {
        UnlockOutcome::Created { recovery_code } => recovery_code,
        UnlockOutcome::Opened { .. } => panic!("expected a fresh vault"),
    };
    session.save_cases(&[sample_case()]).unwrap();

    // Codes are accepted case-insensitively.
    session
        .reset_with_code(&first_code.as_str().to_lowercase())
        .unwrap();
    assert!(!session.vault_exists());

    let second_code = match session.unlock("SecondPass1!").unwrap() {
        UnlockOutcome::Created { recovery_code } => recovery_code,
        UnlockOutcome::Opened { .. } => panic!("reset must leave no vault behind"),
    };
    assert_ne!(first_code.as_str(), second_code.as_str());
    assert!(session.load_cases().unwrap().is_empty());
}

#[test]
fn startup_sweeps_stale_staging_files() {
    let dir = tempdir().unwrap();
    {
        let session = VaultSession::open(VaultPaths::at(dir.path())).unwrap();
        session.unlock("Correct1!").unwrap();
        session.save_cases(&[sample_case()]).unwrap();
    }
    let stale = dir.path().join(".deadbeef.tmp");
    std::fs::write(&stale, b"half a write").unwrap();

    let session = VaultSession::open(VaultPaths::at(dir.path())).unwrap();
    assert!(!stale.exists());
    session.unlock("Correct1!").unwrap();
    assert_eq!(session.load_cases().unwrap().len(), 1);
}

#[test]
fn every_save_rotates_the_iv() {
    let dir = tempdir().unwrap();
    let session = VaultSession::open(VaultPaths::at(dir.path())).unwrap();
    session.unlock("Correct1!").unwrap();

    let iv_of = || -> String {
        let raw = std::fs::read_to_string(session.paths().dataset(Dataset::Cases)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value["iv"].as_str().unwrap().to_string()
    };

    session.save_cases(&[sample_case()]).unwrap();
    let first = iv_of();
    session.save_cases(&[sample_case()]).unwrap();
    let second = iv_of();
    assert_ne!(first, second);
}

struct GrantingGate;

impl BiometricGate for GrantingGate {
    fn available(&self) -> bool {
        true
    }

    fn authorize(&self, _reason: &str) -> Result<bool, VaultError> {
        Ok(true)
    }
}

#[test]
fn biometric_credential_reopens_the_vault() {
    let dir = tempdir().unwrap();
    let session = VaultSession::open(VaultPaths::at(dir.path())).unwrap();
    session.unlock("Correct1!").unwrap();

    let store = BiometricStore::with_gate(
        session.paths().biometric(),
        "this-machine".to_string(),
        Box::new(GrantingGate),
    );
    store.save("Correct1!").unwrap();
    session.lock();

    let password = store.retrieve("reopen the vault").unwrap();
    match session.unlock(&password).unwrap() {
        UnlockOutcome::Opened { .. } => {}
        UnlockOutcome::Created { .. } => panic!("credential must reopen the existing vault"),
    }

    // Changing the password invalidates the stored credential.
    session.change_password("Correct1!", "Changed1!").unwrap();
    assert!(!store.has_saved());
}
