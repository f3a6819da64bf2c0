use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::prefs::FilePreferenceStore;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// User signed in when the app last closed, restored on start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_user: Option<String>,

    /// Preview pane collapsed (text frame expanded)
    #[serde(default)]
    pub preview_collapsed: bool,

    /// Preference file override, defaults to preferences.toml next to this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences_path: Option<PathBuf>,

    /// Colour overrides by role name, e.g. `accent = "#FFC107"`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub theme: BTreeMap<String, String>,
}

impl AppConfig {
    /// Directory holding config, preferences and the log file
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("barcode-text");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir)
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from file, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = match Self::config_path() {
            Ok(p) => p,
            Err(_) => return Ok(AppConfig::default()),
        };

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
        }

        Ok(AppConfig::default())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        let mut clean_config = self.clone();
        if clean_config.last_user.as_ref().map(|u| u.trim().is_empty()).unwrap_or(false) {
            clean_config.last_user = None;
        }

        let content = toml::to_string_pretty(&clean_config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Where user preferences live
    pub fn preferences_path(&self) -> Result<PathBuf> {
        match &self.preferences_path {
            Some(path) => Ok(path.clone()),
            None => Ok(FilePreferenceStore::default_path()?),
        }
    }
}
