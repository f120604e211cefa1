use directories::ProjectDirs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::VaultError;
use crate::persist;

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "docketworks";
pub const APP_NAME: &str = "docket";

/// Logical datasets, one encrypted file each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Cases,
    Agenda,
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [Dataset::Cases, Dataset::Agenda];

    pub fn file_name(self) -> &'static str {
        match self {
            Dataset::Cases => "cases.vault",
            Dataset::Agenda => "agenda.vault",
        }
    }
}

/// Platform data directory for the application.
pub fn default_data_dir() -> Result<PathBuf, VaultError> {
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or(VaultError::DataDirUnavailable)?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Resolved locations of everything the vault subsystem persists.
#[derive(Debug, Clone)]
pub struct VaultPaths {
    data_dir: PathBuf,
}

impl VaultPaths {
    pub fn from_default_dir() -> Result<Self, VaultError> {
        Ok(Self::at(default_data_dir()?))
    }

    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn dataset(&self, dataset: Dataset) -> PathBuf {
        self.data_dir.join(dataset.file_name())
    }

    pub fn settings(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn biometric(&self) -> PathBuf {
        self.data_dir.join("biometric.cred")
    }

    pub fn audit(&self) -> PathBuf {
        self.data_dir.join("audit.vault")
    }

    /// Create the directory, tighten its permissions and sweep staging
    /// leftovers from a previous crash.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        persist::restrict_dir_permissions(&self.data_dir);
        persist::cleanup_stale_temps(&self.data_dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_layout_is_flat() {
        let dir = tempdir().unwrap();
        let paths = VaultPaths::at(dir.path());
        assert!(paths.dataset(Dataset::Cases).ends_with("cases.vault"));
        assert!(paths.dataset(Dataset::Agenda).ends_with("agenda.vault"));
        assert!(paths.audit().ends_with("audit.vault"));
        assert_eq!(paths.settings().parent().unwrap(), dir.path());
        assert_eq!(paths.biometric().parent().unwrap(), dir.path());
    }

    #[test]
    fn ensure_creates_the_directory() {
        let dir = tempdir().unwrap();
        let paths = VaultPaths::at(dir.path().join("nested").join("data"));
        paths.ensure().unwrap();
        assert!(paths.data_dir().is_dir());
    }
}
