use crate::domain::{
    config::Settings,
    error::{SerialMonError, SerialMonResult},
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads and saves the settings record
pub struct ConfigManager {
    settings_path: PathBuf,
}

impl ConfigManager {
    /// Use the per-user settings file
    pub fn new() -> SerialMonResult<Self> {
        Ok(Self {
            settings_path: Self::default_settings_path()?,
        })
    }

    /// Use an explicit settings file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: path.into(),
        }
    }

    /// Load settings; a missing file yields the defaults
    pub fn load(&self) -> SerialMonResult<Settings> {
        if !self.settings_path.exists() {
            debug!("No settings file at {}, using defaults", self.settings_path.display());
            return Ok(Settings::default());
        }
        self.load_from_path(&self.settings_path)
    }

    /// Save settings, creating the parent directory if needed
    pub fn save(&self, settings: &Settings) -> SerialMonResult<()> {
        if let Some(parent) = self.settings_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SerialMonError::Config {
                    message: format!("Failed to create config directory: {}", e),
                })?;
            }
        }
        self.save_to_path(&self.settings_path, settings)
    }

    /// Write a default settings file; refuses to overwrite an existing one
    pub fn init(&self) -> SerialMonResult<()> {
        if self.settings_path.exists() {
            return Err(SerialMonError::Config {
                message: format!(
                    "Settings file already exists: {}",
                    self.settings_path.display()
                ),
            });
        }
        self.save(&Settings::default())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    fn default_settings_path() -> SerialMonResult<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| SerialMonError::Config {
            message: "Could not determine configuration directory".to_string(),
        })?;

        Ok(base.join("serialmon").join("settings.toml"))
    }

    /// Load settings from specific path
    pub fn load_from_path(&self, path: &Path) -> SerialMonResult<Settings> {
        let content = fs::read_to_string(path).map_err(|e| SerialMonError::Config {
            message: format!("Failed to read settings file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| SerialMonError::Config {
            message: format!("Failed to parse settings file {}: {}", path.display(), e),
        })
    }

    /// Save settings to specific path
    pub fn save_to_path(&self, path: &Path, settings: &Settings) -> SerialMonResult<()> {
        let content = toml::to_string_pretty(settings).map_err(|e| SerialMonError::Config {
            message: format!("Failed to serialize settings: {}", e),
        })?;

        fs::write(path, content).map_err(|e| SerialMonError::Config {
            message: format!("Failed to write settings file {}: {}", path.display(), e),
        })
    }
}
