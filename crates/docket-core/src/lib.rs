//! docket-core — encrypted vault for the Docket legal practice manager
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zero knowledge at rest: without the master password nothing on disk
//!   is readable, including by us.
//! - Zeroize all secret material on drop.
//! - Atomic writes only; a partial vault file must be impossible.
//!
//! # Module layout
//! - `session`    — master-key custody, unlock/lock, record load/save
//! - `crypto`     — PBKDF2 derivation + AES-256-GCM file codec
//! - `schema`     — versioned on-disk vault file formats (v2 + legacy v1)
//! - `persist`    — atomic write/rename, staging-file hygiene
//! - `recovery`   — one-time recovery codes and destructive reset
//! - `biometric`  — machine-bound quick unlock credential
//! - `audit`      — encrypted journal of session lifecycle events
//! - `settings`   — unencrypted preferences and recovery digest
//! - `models`     — case and agenda record shapes
//! - `hwid`       — stable hardware identity with graceful fallback
//! - `paths`      — application data directory layout
//! - `error`      — unified error type

pub mod audit;
pub mod biometric;
pub mod crypto;
pub mod error;
pub mod hwid;
pub mod models;
pub mod paths;
pub mod persist;
pub mod recovery;
pub mod schema;
pub mod session;
pub mod settings;

pub use audit::AuditEntry;
pub use error::VaultError;
pub use paths::{Dataset, VaultPaths};
pub use session::{BackupSummary, UnlockOutcome, VaultSession};
