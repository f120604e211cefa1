use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use uuid::Uuid;

use docket_core::biometric::BiometricStore;
use docket_core::models::{AgendaEvent, CaseFile, EventCategory, MatterType};
use docket_core::{Dataset, UnlockOutcome, VaultError, VaultPaths, VaultSession};

const VAULT_PASSWORD_ENV: &str = "DOCKET_VAULT_PASSWORD";
const BACKUP_PASSWORD_ENV: &str = "DOCKET_BACKUP_PASSWORD";
const MIN_PASSWORD_LEN: usize = 12;

#[derive(Parser)]
#[command(name = "docket")]
#[command(about = "Encrypted vault for the Docket legal practice manager", long_about = None)]
struct Cli {
    /// Vault directory (defaults to the per-user application data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show vault location and state
    Status,

    /// Unlock the vault, creating it on first run
    Unlock,

    /// Print the decrypted records of one dataset
    List {
        /// "cases" or "agenda"
        dataset: String,
    },

    /// Add a case file
    AddCase {
        /// civil, criminal, administrative or advisory
        #[arg(long)]
        matter: MatterType,
        #[arg(long)]
        client: String,
        /// Short description of the matter
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "")]
        counterparty: String,
        #[arg(long, default_value = "")]
        court: String,
        /// Court register number, e.g. "RG 4521/2026"
        #[arg(long, default_value = "")]
        docket_number: String,
    },

    /// Add an agenda event
    AddEvent {
        #[arg(long)]
        title: String,
        /// ISO date, e.g. 2026-09-14
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value = "09:00")]
        start: String,
        #[arg(long, default_value = "10:00")]
        end: String,
        /// hearing, study, deadline, meeting, personal or other
        #[arg(long, default_value = "other")]
        category: EventCategory,
        #[arg(long)]
        notes: Option<String>,
        /// Link the event to a case by id
        #[arg(long)]
        case: Option<Uuid>,
    },

    /// Change the master password (clears any saved biometric credential)
    ChangePassword,

    /// Export every record into a password-protected backup file
    Export {
        /// Destination file
        #[arg(long)]
        output: PathBuf,
    },

    /// Replace the vault records with the contents of a backup file
    Import {
        /// Backup file written by `export`
        #[arg(long)]
        input: PathBuf,
    },

    /// Print the vault audit journal
    Audit,

    /// Destroy the vault with a recovery code
    Recover {
        /// The 32-character code shown at vault creation
        #[arg(long)]
        code: String,
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },

    /// Biometric quick-unlock credential
    Bio {
        #[command(subcommand)]
        command: BioCommands,
    },

    /// Unencrypted application settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand)]
enum BioCommands {
    /// Report prompt availability and whether a credential is saved
    Status,
    /// Save the master password behind the OS biometric prompt
    Enable,
    /// Delete the saved credential
    Disable,
    /// Unlock the vault with the saved credential
    Unlock,
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print the settings file
    Show,
    /// Set one key to a JSON value (bare words are taken as strings)
    Set { key: String, value: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let session = match cli.data_dir {
        Some(dir) => VaultSession::open(VaultPaths::at(dir))?,
        None => VaultSession::open_default()?,
    };

    match cli.command {
        Commands::Status => status(&session),
        Commands::Unlock => unlock(&session),
        Commands::List { dataset } => list(&session, &dataset),
        Commands::AddCase {
            matter,
            client,
            subject,
            counterparty,
            court,
            docket_number,
        } => add_case(
            &session,
            matter,
            client,
            subject,
            counterparty,
            court,
            docket_number,
        ),
        Commands::AddEvent {
            title,
            date,
            start,
            end,
            category,
            notes,
            case,
        } => add_event(&session, title, date, start, end, category, notes, case),
        Commands::ChangePassword => change_password(&session),
        Commands::Export { output } => export(&session, &output),
        Commands::Import { input } => import(&session, &input),
        Commands::Audit => audit(&session),
        Commands::Recover { code, yes } => recover(&session, &code, yes),
        Commands::Bio { command } => match command {
            BioCommands::Status => bio_status(&session),
            BioCommands::Enable => bio_enable(&session),
            BioCommands::Disable => bio_disable(&session),
            BioCommands::Unlock => bio_unlock(&session),
        },
        Commands::Settings { command } => match command {
            SettingsCommands::Show => settings_show(&session),
            SettingsCommands::Set { key, value } => settings_set(&session, &key, &value),
        },
    }
}

fn env_password(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn prompt_password(env: &str, prompt: &str) -> Result<String> {
    if let Some(value) = env_password(env) {
        return Ok(value);
    }
    rpassword::prompt_password(prompt).map_err(|e| anyhow!("password prompt: {e}"))
}

/// Prompt for a password that is being set for the first time: minimum
/// length, typed twice. The env override skips the confirmation.
fn prompt_password_twice(env: Option<&str>, prompt: &str) -> Result<String> {
    if let Some(value) = env.and_then(env_password) {
        if value.len() < MIN_PASSWORD_LEN {
            bail!("password too short; minimum {MIN_PASSWORD_LEN} characters");
        }
        return Ok(value);
    }
    let first = rpassword::prompt_password(prompt).map_err(|e| anyhow!("password prompt: {e}"))?;
    if first.len() < MIN_PASSWORD_LEN {
        bail!("password too short; minimum {MIN_PASSWORD_LEN} characters");
    }
    let second = rpassword::prompt_password("Confirm password: ")
        .map_err(|e| anyhow!("password prompt: {e}"))?;
    if first != second {
        bail!("passwords do not match");
    }
    Ok(first)
}

fn require_vault(session: &VaultSession) -> Result<()> {
    if !session.vault_exists() {
        bail!(
            "no vault at {}; run `docket unlock` to create one",
            session.paths().data_dir().display()
        );
    }
    Ok(())
}

/// Unlock an existing vault for a data command. Refuses to create one so
/// that a typo in `--data-dir` never silently issues a recovery code.
fn unlock_existing(session: &VaultSession) -> Result<()> {
    require_vault(session)?;
    let password = prompt_password(VAULT_PASSWORD_ENV, "Master password: ")?;
    match session.unlock(&password)? {
        UnlockOutcome::Opened { migrated } => {
            if migrated {
                println!("Legacy files upgraded to the authenticated format.");
            }
        }
        UnlockOutcome::Created { recovery_code } => print_recovery_code(recovery_code.as_str()),
    }
    Ok(())
}

fn print_recovery_code(code: &str) {
    println!();
    println!("Recovery code (shown exactly once, store it safely):");
    println!();
    println!("    {code}");
    println!();
    println!("Anyone with this code can destroy the vault; no one can read it.");
}

fn status(session: &VaultSession) -> Result<()> {
    let paths = session.paths();
    let settings = session.settings().load();
    let store = BiometricStore::new(paths);
    println!("Vault directory: {}", paths.data_dir().display());
    println!(
        "Vault present:   {}",
        if session.vault_exists() { "yes" } else { "no" }
    );
    println!(
        "Recovery code:   {}",
        if settings.recovery_hash.is_some() {
            "configured"
        } else {
            "not configured"
        }
    );
    println!(
        "Privacy blur:    {}",
        if settings.privacy_blur_enabled {
            "on"
        } else {
            "off"
        }
    );
    println!(
        "Biometric:       prompt {}, credential {}",
        if store.available() {
            "available"
        } else {
            "unavailable"
        },
        if store.has_saved() { "saved" } else { "none" }
    );
    Ok(())
}

fn unlock(session: &VaultSession) -> Result<()> {
    let password = if session.vault_exists() {
        prompt_password(VAULT_PASSWORD_ENV, "Master password: ")?
    } else {
        println!(
            "No vault found; creating one at {}.",
            session.paths().data_dir().display()
        );
        prompt_password_twice(Some(VAULT_PASSWORD_ENV), "New master password: ")?
    };
    match session.unlock(&password)? {
        UnlockOutcome::Created { recovery_code } => {
            println!("Vault created.");
            print_recovery_code(recovery_code.as_str());
        }
        UnlockOutcome::Opened { migrated } => {
            println!("Vault unlocked.");
            if migrated {
                println!("Legacy files upgraded to the authenticated format.");
            }
        }
    }
    Ok(())
}

fn parse_dataset(name: &str) -> Result<Dataset> {
    match name {
        "cases" => Ok(Dataset::Cases),
        "agenda" => Ok(Dataset::Agenda),
        other => Err(anyhow!(
            "unknown dataset {other:?}; expected \"cases\" or \"agenda\""
        )),
    }
}

fn list(session: &VaultSession, dataset: &str) -> Result<()> {
    let dataset = parse_dataset(dataset)?;
    unlock_existing(session)?;
    match dataset {
        Dataset::Cases => {
            let cases = session.load_cases()?;
            println!("{}", serde_json::to_string_pretty(&cases)?);
        }
        Dataset::Agenda => {
            let events = session.load_events()?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
    }
    Ok(())
}

fn add_case(
    session: &VaultSession,
    matter: MatterType,
    client: String,
    subject: String,
    counterparty: String,
    court: String,
    docket_number: String,
) -> Result<()> {
    unlock_existing(session)?;
    let mut case = CaseFile::new(matter, client, subject);
    case.counterparty = counterparty;
    case.court = court;
    case.docket_number = docket_number;
    let id = case.id;
    let mut cases = session.load_cases()?;
    cases.push(case);
    session.save_cases(&cases)?;
    println!("Case {id} added ({} on file).", cases.len());
    Ok(())
}

fn add_event(
    session: &VaultSession,
    title: String,
    date: NaiveDate,
    start: String,
    end: String,
    category: EventCategory,
    notes: Option<String>,
    case: Option<Uuid>,
) -> Result<()> {
    unlock_existing(session)?;
    let mut event = AgendaEvent::new(title, date, category);
    event.time_start = start;
    event.time_end = end;
    event.notes = notes.unwrap_or_default();
    event.case_id = case;
    let id = event.id;
    let mut events = session.load_events()?;
    events.push(event);
    session.save_events(&events)?;
    println!("Event {id} added ({} in the agenda).", events.len());
    Ok(())
}

fn change_password(session: &VaultSession) -> Result<()> {
    require_vault(session)?;
    let current = prompt_password(VAULT_PASSWORD_ENV, "Current master password: ")?;
    let new = prompt_password_twice(None, "New master password: ")?;
    session.change_password(&current, &new)?;
    println!("Master password changed. Any saved biometric credential was removed.");
    Ok(())
}

fn export(session: &VaultSession, output: &Path) -> Result<()> {
    unlock_existing(session)?;
    let password = prompt_password_twice(Some(BACKUP_PASSWORD_ENV), "Backup password: ")?;
    session.export_backup(output, &password)?;
    println!("Backup written to {}.", output.display());
    Ok(())
}

fn import(session: &VaultSession, input: &Path) -> Result<()> {
    unlock_existing(session)?;
    let password = prompt_password(BACKUP_PASSWORD_ENV, "Backup password: ")?;
    let summary = match session.import_backup(input, &password) {
        Ok(summary) => summary,
        Err(VaultError::AuthenticationFailed) => {
            bail!("backup password incorrect or backup file corrupted")
        }
        Err(err) => return Err(err.into()),
    };
    println!(
        "Imported {} cases and {} events (backup from {}).",
        summary.cases,
        summary.events,
        summary.exported_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

fn audit(session: &VaultSession) -> Result<()> {
    unlock_existing(session)?;
    let entries = session.audit_log()?;
    if entries.is_empty() {
        println!("Audit journal is empty.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {}",
            entry.time.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.event
        );
    }
    Ok(())
}

fn recover(session: &VaultSession, code: &str, yes: bool) -> Result<()> {
    if !yes {
        bail!(
            "this permanently deletes every record in {}; re-run with --yes to confirm",
            session.paths().data_dir().display()
        );
    }
    match session.reset_with_code(code) {
        Ok(()) => {
            println!("Vault destroyed. The recovery code is now spent.");
            Ok(())
        }
        Err(VaultError::RecoveryMismatch) => bail!("recovery code not accepted"),
        Err(err) => Err(err.into()),
    }
}

fn bio_status(session: &VaultSession) -> Result<()> {
    let store = BiometricStore::new(session.paths());
    println!(
        "Biometric prompt: {}",
        if store.available() {
            "available"
        } else {
            "unavailable"
        }
    );
    println!(
        "Saved credential: {}",
        if store.has_saved() { "yes" } else { "no" }
    );
    Ok(())
}

fn bio_enable(session: &VaultSession) -> Result<()> {
    let store = BiometricStore::new(session.paths());
    if !store.available() {
        bail!("no biometric prompt is available on this machine");
    }
    require_vault(session)?;
    let password = prompt_password(VAULT_PASSWORD_ENV, "Master password: ")?;
    // proves the password against the vault before sealing it
    session.unlock(&password)?;
    store.save(&password)?;
    println!("Master password saved behind the biometric prompt.");
    Ok(())
}

fn bio_disable(session: &VaultSession) -> Result<()> {
    let store = BiometricStore::new(session.paths());
    store.clear()?;
    println!("Saved credential removed.");
    Ok(())
}

fn bio_unlock(session: &VaultSession) -> Result<()> {
    require_vault(session)?;
    let store = BiometricStore::new(session.paths());
    let password = match store.retrieve("unlock your Docket vault") {
        Ok(password) => password,
        Err(VaultError::CredentialMissing) => {
            bail!("no saved credential; run `docket bio enable` first")
        }
        Err(VaultError::BiometricUnavailable) => {
            bail!("no biometric prompt is available on this machine")
        }
        Err(VaultError::BiometricDenied) => bail!("biometric prompt was refused"),
        Err(VaultError::CredentialUnusable) => {
            bail!("saved credential cannot be opened on this machine; run `docket bio enable` again")
        }
        Err(err) => return Err(err.into()),
    };
    match session.unlock(&password) {
        Ok(UnlockOutcome::Opened { .. }) => {
            println!("Vault unlocked with the saved credential.");
            Ok(())
        }
        Ok(UnlockOutcome::Created { recovery_code }) => {
            println!("Vault created.");
            print_recovery_code(recovery_code.as_str());
            Ok(())
        }
        Err(VaultError::AuthenticationFailed) => {
            bail!("saved credential no longer matches the vault; run `docket bio enable` again")
        }
        Err(err) => Err(err.into()),
    }
}

fn settings_show(session: &VaultSession) -> Result<()> {
    let settings = session.settings().load();
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn settings_set(session: &VaultSession, key: &str, value: &str) -> Result<()> {
    let parsed: Value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    let mut partial = Map::new();
    partial.insert(key.to_string(), parsed);
    let updated = session.settings().merge(&partial)?;
    println!("{}", serde_json::to_string_pretty(&updated)?);
    Ok(())
}
