//! Collaborator contracts towards an OBS instance.
//!
//! The cache never speaks the OBS protocol itself: it asks an
//! [`AccountRegistry`] for the [`Connection`] of an API URL and hands that to
//! an [`ObsFetcher`].

use std::collections::HashMap;

use async_trait::async_trait;

use crate::types::errors::{CacheError, FetchError};
use crate::types::obs::{Connection, Package, PackageFile, Project};
use crate::types::settings::AccountSettings;

/// Network transport used by the metadata cache.
#[async_trait]
pub trait ObsFetcher: Send + Sync {
    /// Fetches a project's metadata without its package list.
    async fn fetch_project(&self, conn: &Connection, name: &str) -> Result<Project, FetchError>;

    /// Fetches a package with its (link-expanded) file list but no file contents.
    async fn fetch_package(
        &self,
        conn: &Connection,
        project_name: &str,
        package_name: &str,
    ) -> Result<Package, FetchError>;

    /// Fetches the raw bytes of a single file.
    async fn fetch_file_contents(
        &self,
        conn: &Connection,
        file: &PackageFile,
    ) -> Result<Vec<u8>, FetchError>;
}

/// Resolves the connection to use for an API URL.
pub trait AccountRegistry: Send + Sync {
    /// Fails with `CacheError::NoAccount` when no account exists for `api_url`.
    fn connection_for(&self, api_url: &str) -> Result<Connection, CacheError>;
}

/// Account registry populated once from the settings file.
#[derive(Debug, Default, Clone)]
pub struct StaticAccounts {
    accounts: HashMap<String, Connection>,
}

impl StaticAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(accounts: &[AccountSettings]) -> Self {
        let mut registry = Self::new();
        for account in accounts {
            registry.insert(&account.api_url, &account.username);
        }
        registry
    }

    pub fn insert(&mut self, api_url: &str, username: &str) {
        self.accounts.insert(
            api_url.to_string(),
            Connection {
                api_url: api_url.to_string(),
                username: username.to_string(),
            },
        );
    }

    pub fn api_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.accounts.keys().cloned().collect();
        urls.sort();
        urls
    }
}

impl AccountRegistry for StaticAccounts {
    fn connection_for(&self, api_url: &str) -> Result<Connection, CacheError> {
        self.accounts
            .get(api_url)
            .cloned()
            .ok_or_else(|| CacheError::NoAccount(api_url.to_string()))
    }
}

/// Fetcher for running without network access: every request fails with a
/// transport error, so callers are served from the cache in degraded state.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineFetcher;

#[async_trait]
impl ObsFetcher for OfflineFetcher {
    async fn fetch_project(&self, conn: &Connection, name: &str) -> Result<Project, FetchError> {
        Err(FetchError::Transport(format!(
            "offline: cannot fetch project {} from {}",
            name, conn.api_url
        )))
    }

    async fn fetch_package(
        &self,
        conn: &Connection,
        project_name: &str,
        package_name: &str,
    ) -> Result<Package, FetchError> {
        Err(FetchError::Transport(format!(
            "offline: cannot fetch package {}/{} from {}",
            project_name, package_name, conn.api_url
        )))
    }

    async fn fetch_file_contents(
        &self,
        conn: &Connection,
        file: &PackageFile,
    ) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Transport(format!(
            "offline: cannot fetch {}/{}/{} from {}",
            file.project_name, file.package_name, file.name, conn.api_url
        )))
    }
}
