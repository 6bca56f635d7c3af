// Settings Engine
// Loads, saves, updates and resets the extension settings.
// Settings are stored as a JSON file at the platform-specific config path.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::ExtensionSettings;

/// Environment variable overriding the settings file location.
pub const CONFIG_PATH_ENV: &str = "OBS_BOOKMARKS_CONFIG";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<ExtensionSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &ExtensionSettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine implementation that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: ExtensionSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// `path_override` wins over `$OBS_BOOKMARKS_CONFIG`, which wins over
    /// `settings.json` in the platform config directory.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().filter(|p| !p.is_empty()))
            .unwrap_or_else(|| {
                platform::get_config_dir()
                    .join("settings.json")
                    .to_string_lossy()
                    .to_string()
            });

        Self {
            config_path,
            settings: ExtensionSettings::default(),
        }
    }

    /// Root directory for the state database and the project cache.
    pub fn global_storage_dir(&self) -> PathBuf {
        self.settings
            .storage
            .global_storage_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(platform::get_data_dir)
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from the JSON config file.
    ///
    /// If the file does not exist, returns default settings.
    /// If the file exists but is malformed, returns a serialization error.
    fn load(&mut self) -> Result<ExtensionSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            debug!("no settings at {}, using defaults", self.config_path);
            self.settings = ExtensionSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let settings: ExtensionSettings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;

        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Saves the current settings, creating parent directories as needed.
    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_settings(&self) -> &ExtensionSettings {
        &self.settings
    }

    /// Updates an individual setting by dot-notation key path, e.g.
    /// `"cache.default_refresh"` or `"logging.filter"`.
    ///
    /// The new value is validated by deserializing the whole settings tree
    /// again. Saves to disk after a successful update.
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }

        let parts: Vec<&str> = key.split('.').collect();
        let Some((last, parents)) = parts.split_last() else {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        };

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        let mut current = &mut json_value;
        for part in parents {
            current = current.get_mut(*part).ok_or_else(|| {
                SettingsError::InvalidKey(format!("Key '{}' not found in settings", key))
            })?;
        }
        match current {
            serde_json::Value::Object(map) if map.contains_key(*last) => {
                map.insert(last.to_string(), value);
            }
            serde_json::Value::Object(_) => {
                return Err(SettingsError::InvalidKey(format!(
                    "Key '{}' not found in settings",
                    key
                )));
            }
            _ => {
                return Err(SettingsError::InvalidKey(format!(
                    "Cannot navigate to key '{}': intermediate value is not an object",
                    key
                )));
            }
        }

        let new_settings: ExtensionSettings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;

        self.settings = new_settings;
        self.save()?;

        Ok(())
    }

    /// Resets all settings to defaults and saves to disk.
    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = ExtensionSettings::default();
        self.save()?;
        Ok(())
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
