//! Shared fixtures for the integration tests: a scripted OBS fetcher and
//! helpers to build a cache or a full bookmark manager on a temp directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use obs_bookmarks::managers::project_bookmarks::ProjectBookmarkManager;
use obs_bookmarks::services::memento::{InMemoryMemento, Memento};
use obs_bookmarks::services::metadata_cache::MetadataCache;
use obs_bookmarks::services::obs_client::{ObsFetcher, StaticAccounts};
use obs_bookmarks::types::errors::FetchError;
use obs_bookmarks::types::obs::{Connection, Package, PackageFile, Project, ProjectMeta};

pub const API: &str = "https://api.opensuse.org";

/// Fetcher answering from in-memory tables and counting every call.
#[derive(Default)]
pub struct ScriptedFetcher {
    projects: Mutex<HashMap<String, ProjectMeta>>,
    packages: Mutex<HashMap<(String, String), Package>>,
    contents: Mutex<HashMap<(String, String, String), Vec<u8>>>,
    broken: Mutex<Vec<String>>,
    metaless: Mutex<Vec<String>>,
    offline: AtomicBool,
    pub project_calls: AtomicUsize,
    pub package_calls: AtomicUsize,
    pub file_calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_project(&self, name: &str, title: &str) {
        let meta = ProjectMeta {
            name: name.to_string(),
            title: title.to_string(),
            ..Default::default()
        };
        self.projects.lock().unwrap().insert(name.to_string(), meta);
    }

    /// Registers a package whose files carry the given contents.
    pub fn add_package(&self, project: &str, name: &str, files: &[(&str, &[u8])]) {
        let mut pkg_files = Vec::new();
        for (file, data) in files {
            let mut pf = PackageFile::new(project, name, file);
            pf.md5_hash = Some(format!("{}-{}", file, data.len()));
            pf.size = Some(data.len() as u64);
            pkg_files.push(pf);
            self.contents.lock().unwrap().insert(
                (project.to_string(), name.to_string(), file.to_string()),
                data.to_vec(),
            );
        }
        self.packages.lock().unwrap().insert(
            (project.to_string(), name.to_string()),
            Package {
                api_url: API.to_string(),
                project_name: project.to_string(),
                name: name.to_string(),
                title: Some(format!("{} title", name)),
                description: None,
                files: pkg_files,
            },
        );
    }

    pub fn remove_project(&self, name: &str) {
        self.projects.lock().unwrap().remove(name);
    }

    pub fn mark_broken(&self, name: &str) {
        self.broken.lock().unwrap().push(name.to_string());
    }

    /// Makes the project answer without any `_meta`.
    pub fn strip_meta(&self, name: &str) {
        self.metaless.lock().unwrap().push(name.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.project_calls.load(Ordering::SeqCst)
            + self.package_calls.load(Ordering::SeqCst)
            + self.file_calls.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), FetchError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObsFetcher for ScriptedFetcher {
    async fn fetch_project(&self, conn: &Connection, name: &str) -> Result<Project, FetchError> {
        self.project_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if self.broken.lock().unwrap().iter().any(|b| b == name) {
            return Err(FetchError::MalformedMetadata(format!("{}/_meta", name)));
        }
        let meta = self
            .projects
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(name.to_string()))?;
        let metaless = self.metaless.lock().unwrap().iter().any(|m| m == name);
        Ok(Project {
            api_url: conn.api_url.clone(),
            name: name.to_string(),
            meta: if metaless { None } else { Some(meta) },
        })
    }

    async fn fetch_package(
        &self,
        _conn: &Connection,
        project: &str,
        package: &str,
    ) -> Result<Package, FetchError> {
        self.package_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.packages
            .lock()
            .unwrap()
            .get(&(project.to_string(), package.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("{}/{}", project, package)))
    }

    async fn fetch_file_contents(
        &self,
        _conn: &Connection,
        file: &PackageFile,
    ) -> Result<Vec<u8>, FetchError> {
        self.file_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.contents
            .lock()
            .unwrap()
            .get(&(
                file.project_name.clone(),
                file.package_name.clone(),
                file.name.clone(),
            ))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(file.name.clone()))
    }
}

pub fn accounts() -> Arc<StaticAccounts> {
    let mut accounts = StaticAccounts::new();
    accounts.insert(API, "tester");
    Arc::new(accounts)
}

pub fn cache(root: &Path, fetcher: Arc<ScriptedFetcher>) -> Arc<MetadataCache> {
    Arc::new(MetadataCache::new(root, fetcher, accounts()))
}

pub fn manager(
    root: &Path,
    fetcher: Arc<ScriptedFetcher>,
    memento: Arc<dyn Memento>,
) -> ProjectBookmarkManager {
    ProjectBookmarkManager::new(memento, cache(root, fetcher))
}

pub fn memory_memento() -> Arc<dyn Memento> {
    Arc::new(InMemoryMemento::new())
}
