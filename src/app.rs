//! App Core.
//!
//! Wires settings, the global state database, the metadata cache and the
//! bookmark manager together.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use crate::database::connection::Database;
use crate::managers::project_bookmarks::{ProjectBookmarkManager, ProjectBookmarkManagerTrait};
use crate::services::memento::{Memento, SqliteMemento};
use crate::services::metadata_cache::MetadataCache;
use crate::services::obs_client::{ObsFetcher, StaticAccounts};
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::bookmark::RefreshBehavior;

/// File name of the global state database inside the global storage root.
pub const STATE_DB_FILE: &str = "state.db";

/// Central application struct holding the cache, the bookmark manager and
/// the settings they were built from.
///
/// Accounts and the storage location are read once at construction; changing
/// them through the settings engine takes effect on the next start.
pub struct App {
    pub settings_engine: Mutex<SettingsEngine>,
    pub accounts: Arc<StaticAccounts>,
    pub cache: Arc<MetadataCache>,
    pub bookmarks: Arc<ProjectBookmarkManager>,
}

impl App {
    /// Creates the app from already loaded settings, persisting bookmarks in
    /// `state.db` below the global storage directory.
    pub fn new(
        settings_engine: SettingsEngine,
        fetcher: Arc<dyn ObsFetcher>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = settings_engine.global_storage_dir();
        std::fs::create_dir_all(&storage)
            .map_err(|e| format!("cannot create {}: {}", storage.display(), e))?;
        let db = Database::open(storage.join(STATE_DB_FILE))?;
        Ok(Self::with_memento(
            settings_engine,
            fetcher,
            Arc::new(SqliteMemento::new(db)),
            &storage,
        ))
    }

    /// Creates the app around an arbitrary memento.
    pub fn with_memento(
        settings_engine: SettingsEngine,
        fetcher: Arc<dyn ObsFetcher>,
        memento: Arc<dyn Memento>,
        storage: &Path,
    ) -> Self {
        let accounts = Arc::new(StaticAccounts::from_settings(
            &settings_engine.get_settings().accounts,
        ));
        let cache = Arc::new(MetadataCache::new(storage, fetcher, accounts.clone()));
        let bookmarks = Arc::new(ProjectBookmarkManager::new(memento, cache.clone()));

        info!(
            "global storage at {}, {} account(s) configured",
            storage.display(),
            accounts.api_urls().len()
        );

        Self {
            settings_engine: Mutex::new(settings_engine),
            accounts,
            cache,
            bookmarks,
        }
    }

    pub fn settings(&self) -> MutexGuard<'_, SettingsEngine> {
        self.settings_engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Refresh behaviour used when a caller does not specify one.
    pub fn default_refresh(&self) -> RefreshBehavior {
        self.settings().get_settings().cache.default_refresh
    }

    /// Flushes the bookmark list.
    pub async fn shutdown(&self) {
        if let Err(e) = self.bookmarks.dispose().await {
            tracing::error!("failed to persist bookmarks on shutdown: {}", e);
        }
    }
}
