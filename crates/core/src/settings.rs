//! User settings persistence
//!
//! Settings are a small JSON document in the installation root. Reading never
//! fails: a missing or unreadable file yields the defaults, and each section
//! of a saved file is merged key by key over the defaults so that files
//! written by older launchers keep working.

use crate::config::DefaultSettings;
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// User-editable settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(rename = "java")]
    pub runtime: RuntimeSettings,
    pub launcher: LauncherSettings,
}

/// Java runtime settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSettings {
    #[serde(rename = "minRam")]
    pub min_memory: String,
    #[serde(rename = "maxRam")]
    pub max_memory: String,
    #[serde(rename = "javaPath", default, skip_serializing_if = "Option::is_none")]
    pub runtime_path: Option<PathBuf>,
}

/// Launcher behavior settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LauncherSettings {
    pub minimize_on_launch: bool,
    pub language: String,
}

impl Settings {
    /// Settings built from the configured defaults
    pub fn from_defaults(defaults: &DefaultSettings) -> Self {
        Self {
            runtime: RuntimeSettings {
                min_memory: defaults.min_memory.clone(),
                max_memory: defaults.max_memory.clone(),
                runtime_path: None,
            },
            launcher: LauncherSettings {
                minimize_on_launch: defaults.minimize_on_launch,
                language: defaults.language.clone(),
            },
        }
    }
}

/// Reads and writes `settings.json`
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    defaults: Settings,
}

impl SettingsStore {
    pub fn new(root: &Path, defaults: &DefaultSettings) -> Self {
        Self {
            path: crate::paths::settings_file(root),
            defaults: Settings::from_defaults(defaults),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults
    pub fn load(&self) -> Settings {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}, using defaults", self.path.display());
                return self.defaults.clone();
            }
            Err(e) => {
                warn!("Failed to read settings, using defaults: {}", e);
                return self.defaults.clone();
            }
        };

        match self.merge(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                self.defaults.clone()
            }
        }
    }

    fn merge(&self, content: &str) -> std::result::Result<Settings, serde_json::Error> {
        let saved: Value = serde_json::from_str(content)?;
        let mut merged = serde_json::to_value(&self.defaults)?;

        for section in ["java", "launcher"] {
            let (Some(Value::Object(saved_section)), Some(Value::Object(target))) =
                (saved.get(section), merged.get_mut(section))
            else {
                continue;
            };
            for (key, value) in saved_section {
                target.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(merged)
    }

    /// Persist settings as pretty-printed JSON
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings).map_err(|e| {
            crate::errors::LauncherError::Persist {
                what: "settings".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            }
        })?;
        crate::paths::write_atomic(&self.path, json.as_bytes(), "settings")?;
        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    /// Record a discovered runtime path, keeping every other setting
    pub fn save_runtime_path(&self, runtime_path: &Path) -> Result<()> {
        let mut settings = self.load();
        settings.runtime.runtime_path = Some(runtime_path.to_path_buf());
        self.save(&settings)
    }
}
