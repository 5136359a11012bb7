//! Persisted settings: manual declaration and feature toggles

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use envsense_common::config::{load_toml_or_default, write_toml_atomic};
use tracing::debug;

use crate::error::{Error, Result};

/// Settings key holding the raw manual selection
pub const MANUAL_SELECTION_KEY: &str = "manual_environment";

/// User-controlled feature toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    MismatchAlerts,
    AiLogging,
    ManualLogging,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::MismatchAlerts, Feature::AiLogging, Feature::ManualLogging];

    pub fn key(&self) -> &'static str {
        match self {
            Feature::MismatchAlerts => "mismatch_alerts_enabled",
            Feature::AiLogging => "ai_logging_enabled",
            Feature::ManualLogging => "manual_logging_enabled",
        }
    }

    /// Accepts the settings key or a short alias ("alerts", "ai-logging", ...)
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        Feature::ALL.into_iter().find(|f| {
            f.key() == normalized
                || match f {
                    Feature::MismatchAlerts => normalized == "alerts" || normalized == "mismatch_alerts",
                    Feature::AiLogging => normalized == "ai_logging",
                    Feature::ManualLogging => normalized == "manual_logging",
                }
        })
    }

    /// Value used when the store has no entry
    pub fn default_enabled(&self) -> bool {
        true
    }
}

/// Key/value persistence surviving process restart
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value`, or remove the key when None
    fn set(&self, key: &str, value: Option<&str>) -> Result<()>;

    fn feature_enabled(&self, feature: Feature) -> bool {
        match self.get(feature.key()) {
            Some(value) => value.trim().eq_ignore_ascii_case("true"),
            None => feature.default_enabled(),
        }
    }

    fn set_feature(&self, feature: Feature, enabled: bool) -> Result<()> {
        self.set(feature.key(), Some(if enabled { "true" } else { "false" }))
    }

    fn manual_selection(&self) -> Option<String> {
        self.get(MANUAL_SELECTION_KEY)
    }

    fn set_manual_selection(&self, raw_name: Option<&str>) -> Result<()> {
        self.set(MANUAL_SELECTION_KEY, raw_name)
    }
}

/// Settings kept in a TOML file, rewritten atomically on every change
#[derive(Debug)]
pub struct TomlSettingsStore {
    path: PathBuf,
    table: Mutex<toml::Table>,
}

impl TomlSettingsStore {
    /// Open (or lazily create) the settings file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let table: toml::Table = load_toml_or_default(&path)?;
        debug!("Loaded {} settings from {}", table.len(), path.display());
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.get(key).map(|value| match value {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    fn set(&self, key: &str, value: Option<&str>) -> Result<()> {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        match value {
            Some(v) => {
                table.insert(key.to_string(), toml::Value::String(v.to_string()));
            }
            None => {
                table.remove(key);
            }
        }
        write_toml_atomic(&*table, &self.path)
            .map_err(|e| Error::Settings(format!("failed to write {}: {}", self.path.display(), e)))
    }
}

/// Volatile settings for tests and embedders
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Option<&str>) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        match value {
            Some(v) => values.insert(key.to_string(), v.to_string()),
            None => values.remove(key),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_features_default_enabled() {
        let store = MemorySettingsStore::new();
        for feature in Feature::ALL {
            assert!(store.feature_enabled(feature));
        }
        store.set_feature(Feature::AiLogging, false).unwrap();
        assert!(!store.feature_enabled(Feature::AiLogging));
    }

    #[test]
    fn test_feature_aliases() {
        assert_eq!(Feature::from_name("alerts"), Some(Feature::MismatchAlerts));
        assert_eq!(Feature::from_name("ai-logging"), Some(Feature::AiLogging));
        assert_eq!(Feature::from_name("manual_logging_enabled"), Some(Feature::ManualLogging));
        assert_eq!(Feature::from_name("camera"), None);
    }

    #[test]
    fn test_toml_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        {
            let store = TomlSettingsStore::open(&path).unwrap();
            store.set_manual_selection(Some("Outside")).unwrap();
            store.set_feature(Feature::MismatchAlerts, false).unwrap();
        }

        let reopened = TomlSettingsStore::open(&path).unwrap();
        assert_eq!(reopened.manual_selection().as_deref(), Some("Outside"));
        assert!(!reopened.feature_enabled(Feature::MismatchAlerts));
        assert!(reopened.feature_enabled(Feature::ManualLogging));
    }

    #[test]
    fn test_clearing_manual_selection() {
        let dir = TempDir::new().unwrap();
        let store = TomlSettingsStore::open(dir.path().join("s.toml")).unwrap();
        store.set_manual_selection(Some("Inside")).unwrap();
        store.set_manual_selection(None).unwrap();
        assert_eq!(store.manual_selection(), None);
    }

    #[test]
    fn test_non_string_values_are_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "ai_logging_enabled = false\n").unwrap();

        let store = TomlSettingsStore::open(&path).unwrap();
        assert!(!store.feature_enabled(Feature::AiLogging));
    }
}
