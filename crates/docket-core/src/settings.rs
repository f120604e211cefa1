//! Unencrypted application settings, readable before the vault is unlocked.
//! Must never hold secrets; the recovery entry is a salted digest only.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::warn;

use crate::error::VaultError;
use crate::persist;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_privacy_blur")]
    pub privacy_blur_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_salt: Option<String>,
    /// Host-defined keys ride along untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            privacy_blur_enabled: true,
            recovery_hash: None,
            recovery_salt: None,
            extra: Map::new(),
        }
    }
}

fn default_privacy_blur() -> bool {
    true
}

/// Loads and persists `Settings` at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Missing or unreadable settings fall back to defaults.
    pub fn load(&self) -> Settings {
        let raw = match persist::read_if_exists(&self.path) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Settings::default(),
            Err(e) => {
                warn!(error = %e, "settings unreadable, using defaults");
                return Settings::default();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "settings unparsable, using defaults");
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), VaultError> {
        let json = serde_json::to_vec_pretty(settings)?;
        persist::write_atomic(&self.path, &json)?;
        Ok(())
    }

    /// Apply a partial update: present keys overwrite, `null` removes,
    /// everything else stays.
    pub fn merge(&self, partial: &Map<String, Value>) -> Result<Settings, VaultError> {
        let current = self.load();
        let mut tree = match serde_json::to_value(&current)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in partial {
            if value.is_null() {
                tree.remove(key);
            } else {
                tree.insert(key.clone(), value.clone());
            }
        }
        let merged: Settings = serde_json::from_value(Value::Object(tree))?;
        self.save(&merged)?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn defaults_when_missing_or_corrupt() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert!(store.load().privacy_blur_enabled);

        std::fs::write(dir.path().join("settings.json"), "{{{").unwrap();
        let loaded = store.load();
        assert!(loaded.privacy_blur_enabled);
        assert!(loaded.recovery_hash.is_none());
    }

    #[test]
    fn save_and_reload_keeps_unknown_keys() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let mut settings = Settings::default();
        settings
            .extra
            .insert("theme".into(), Value::String("dark".into()));
        store.save(&settings).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.extra["theme"], "dark");
    }

    #[test]
    fn merge_overwrites_and_removes() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let mut settings = Settings::default();
        settings.recovery_hash = Some("aa".into());
        settings.recovery_salt = Some("bb".into());
        store.save(&settings).unwrap();

        let mut partial = Map::new();
        partial.insert("privacyBlurEnabled".into(), json!(false));
        partial.insert("recoveryHash".into(), Value::Null);
        partial.insert("locale".into(), json!("en-GB"));
        let merged = store.merge(&partial).unwrap();

        assert!(!merged.privacy_blur_enabled);
        assert!(merged.recovery_hash.is_none());
        assert_eq!(merged.recovery_salt.as_deref(), Some("bb"));
        assert_eq!(merged.extra["locale"], "en-GB");

        let reloaded = store.load();
        assert!(!reloaded.privacy_blur_enabled);
        assert_eq!(reloaded.extra["locale"], "en-GB");
    }
}
