use serde::{Deserialize, Serialize};

use super::bookmark::RefreshBehavior;

/// Top-level settings container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtensionSettings {
    pub storage: StorageSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
    pub accounts: Vec<AccountSettings>,
}

impl ExtensionSettings {
    /// Finds the account configured for the given API URL.
    pub fn account(&self, api_url: &str) -> Option<&AccountSettings> {
        self.accounts.iter().find(|a| a.api_url == api_url)
    }
}

/// Where persistent data lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// Overrides the platform data directory as the global storage root.
    pub global_storage_dir: Option<String>,
}

/// Metadata cache behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    /// Refresh behaviour used when a command does not name one.
    pub default_refresh: RefreshBehavior,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// An OBS account. Only its identity is stored, never a password.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountSettings {
    pub api_url: String,
    pub alias: String,
    pub username: String,
}
