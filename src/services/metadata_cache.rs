//! Metadata cache for OBS projects, packages and file contents.
//!
//! Each project is stored as one `project.json` (packages embedded, file
//! contents stripped) below
//! `<global storage>/projectCache/<hex(api url)>/<hex(project)>/`, file blobs
//! live next to it under `<package>/<file>`. The network is only contacted as
//! far as the requested [`RefreshBehavior`] allows.
//!
//! Fetch failures never escape: they come back as bookmarks whose `state`
//! records what went wrong. Unreadable cache files are deleted and treated as
//! a miss. Only a missing account, an invalid name or a broken bookmark
//! invariant is reported as an error.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::fs;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::services::obs_client::{AccountRegistry, ObsFetcher};
use crate::types::bookmark::{BookmarkState, PackageBookmark, ProjectBookmark, RefreshBehavior};
use crate::types::errors::{CacheError, FetchError};
use crate::types::obs::{Connection, PackageFile};

/// Directory below the global storage root that holds all cached projects.
pub const PROJECT_CACHE_DIR: &str = "projectCache";
/// Name of the per-project metadata record.
pub const PROJECT_FILE: &str = "project.json";

/// Two-level cache of project/package metadata and file contents.
pub struct MetadataCache {
    root: PathBuf,
    fetcher: Arc<dyn ObsFetcher>,
    accounts: Arc<dyn AccountRegistry>,
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl MetadataCache {
    /// Creates a cache rooted at `<global_storage>/projectCache`.
    pub fn new(
        global_storage: &Path,
        fetcher: Arc<dyn ObsFetcher>,
        accounts: Arc<dyn AccountRegistry>,
    ) -> Self {
        Self {
            root: global_storage.join(PROJECT_CACHE_DIR),
            fetcher,
            accounts,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Directory holding the cached record and file blobs of one project.
    pub fn project_cache_dir(&self, api_url: &str, project_name: &str) -> PathBuf {
        self.root
            .join(hex::encode(api_url.as_bytes()))
            .join(hex::encode(project_name.as_bytes()))
    }

    /// Path of a cached file blob.
    pub fn file_path(&self, api_url: &str, file: &PackageFile) -> PathBuf {
        self.project_cache_dir(api_url, &file.project_name)
            .join(&file.package_name)
            .join(&file.name)
    }

    /// Returns the project, refreshing it and its packages as `refresh` allows.
    ///
    /// Packages are resolved from the request's package list, or from the
    /// cached list when the request carries none.
    pub async fn get_project(
        &self,
        proj: &ProjectBookmark,
        refresh: RefreshBehavior,
    ) -> Result<ProjectBookmark, CacheError> {
        for pkg in proj.packages.iter().flatten() {
            validate_component(&pkg.name)?;
        }

        let dir = self.project_cache_dir(&proj.api_url, &proj.name);
        let lock = self.lock_for(&dir);
        let _guard = lock.lock().await;

        let cached = self.read_cached_project(&dir, proj).await;

        if refresh == RefreshBehavior::Never {
            return Ok(cached.unwrap_or_else(|| project_stub(proj)));
        }

        let cached = match cached {
            Some(cached) if refresh == RefreshBehavior::FetchWhenMissing && !project_needs_fetch(proj, &cached) => cached,
            cached => return self.fetch_project(&dir, proj, cached, refresh).await,
        };

        // Metadata is complete; only packages without a file list need work.
        let incomplete: Vec<PackageBookmark> = proj
            .packages
            .iter()
            .flatten()
            .filter(|p| cached.find_package(&p.name).map_or(true, |c| c.files.is_none()))
            .cloned()
            .collect();
        if incomplete.is_empty() {
            debug!("project {} served from cache", proj.name);
            return Ok(cached);
        }

        let conn = self.accounts.connection_for(&proj.api_url)?;
        let mut record = cached.clone();
        let resolved = self
            .refresh_packages(&conn, &dir, &incomplete, &mut record, refresh)
            .await?;
        if record != cached {
            self.persist_logged(&dir, &record).await;
        }
        overlay_packages(record, resolved)
    }

    /// Returns a single package, refreshing it as `refresh` allows.
    ///
    /// With `save_in_project` a successfully fetched package is written into
    /// its project's cached record.
    pub async fn get_package(
        &self,
        pkg: &PackageBookmark,
        refresh: RefreshBehavior,
        save_in_project: bool,
    ) -> Result<PackageBookmark, CacheError> {
        validate_component(&pkg.name)?;

        let dir = self.project_cache_dir(&pkg.api_url, &pkg.project_name);
        let lock = self.lock_for(&dir);
        let _guard = lock.lock().await;

        let probe = ProjectBookmark::new(&pkg.api_url, &pkg.project_name);
        let cached_project = self.read_cached_project(&dir, &probe).await;
        let cached_pkg = cached_project
            .as_ref()
            .and_then(|p| p.find_package(&pkg.name))
            .cloned();

        if !package_needs_fetch(pkg, cached_pkg.as_ref(), refresh) {
            return Ok(cached_pkg.unwrap_or_else(|| package_stub(pkg)));
        }

        let conn = self.accounts.connection_for(&pkg.api_url)?;
        let resolved = self
            .resolve_package(&conn, pkg, cached_pkg.as_ref(), refresh)
            .await;

        if resolved.state.is_ok() {
            if let Some(old) = &cached_pkg {
                self.invalidate_stale_blobs(&dir, old, &resolved).await;
            }
            if save_in_project {
                let mut record = cached_project.unwrap_or_else(|| ProjectBookmark {
                    state: BookmarkState::UNKNOWN,
                    ..probe
                });
                record.upsert_package(resolved.clone())?;
                self.persist_logged(&dir, &record).await;
            }
        }

        Ok(resolved)
    }

    /// Returns the descriptor of a file together with its contents.
    ///
    /// The owning package is resolved first. Contents come from the blob on
    /// disk unless `refresh` demands (or a miss requires) a fetch.
    pub async fn get_package_file(
        &self,
        api_url: &str,
        file: &PackageFile,
        refresh: RefreshBehavior,
    ) -> Result<PackageFile, CacheError> {
        validate_component(&file.package_name)?;
        validate_component(&file.name)?;

        let mut request = PackageBookmark::new(api_url, &file.project_name, &file.package_name);
        request.files = Some(vec![file.without_contents()]);
        let pkg = self.get_package(&request, refresh, true).await?;

        let mut descriptor = pkg
            .find_file(&file.name)
            .cloned()
            .unwrap_or_else(|| file.without_contents());

        let dir = self.project_cache_dir(api_url, &file.project_name);
        let lock = self.lock_for(&dir);
        let _guard = lock.lock().await;

        let blob = self.file_path(api_url, file);
        if refresh != RefreshBehavior::Always {
            let cached = read_blob(&blob).await;
            if cached.is_some() || refresh == RefreshBehavior::Never {
                descriptor.contents = cached;
                return Ok(descriptor);
            }
        }

        let conn = self.accounts.connection_for(api_url)?;
        match self.fetcher.fetch_file_contents(&conn, &descriptor).await {
            Ok(bytes) => {
                if let Err(e) = write_atomic(&blob, &bytes).await {
                    warn!("could not cache contents of {}: {}", blob.display(), e);
                }
                descriptor.contents = Some(bytes);
            }
            Err(e) => {
                warn!(
                    "failed to fetch {}/{}/{}: {}",
                    file.project_name, file.package_name, file.name, e
                );
                descriptor.contents = read_blob(&blob).await;
            }
        }
        Ok(descriptor)
    }

    /// Merges a partial project into the cached record without contacting the
    /// server.
    pub async fn add_project(&self, proj: &ProjectBookmark) -> Result<ProjectBookmark, CacheError> {
        for pkg in proj.packages.iter().flatten() {
            validate_component(&pkg.name)?;
        }

        let dir = self.project_cache_dir(&proj.api_url, &proj.name);
        let lock = self.lock_for(&dir);
        let _guard = lock.lock().await;

        let mut record = match self.read_cached_project(&dir, proj).await {
            Some(cached) => cached,
            None => ProjectBookmark {
                packages: None,
                ..proj.without_contents()
            },
        };

        if proj.meta.is_some() {
            record.meta = proj.meta.clone();
        }
        if proj.checkout_path.is_some() {
            record.checkout_path = proj.checkout_path.clone();
        }
        if let Some(packages) = &proj.packages {
            record.packages.get_or_insert_with(Vec::new);
            for pkg in packages {
                let mut pkg = pkg.without_contents();
                if pkg.files.is_none() {
                    pkg.files = record.find_package(&pkg.name).and_then(|c| c.files.clone());
                }
                record.upsert_package(pkg)?;
            }
        }

        write_project(&dir, &record).await?;
        Ok(record)
    }

    /// Deletes everything cached for a project.
    pub async fn remove_project(&self, api_url: &str, project_name: &str) -> Result<(), CacheError> {
        let dir = self.project_cache_dir(api_url, project_name);
        let lock = self.lock_for(&dir);
        let _guard = lock.lock().await;

        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("purged cache of project {}", project_name);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(format!(
                "failed to remove {}: {}",
                dir.display(),
                e
            ))),
        }
    }

    /// Returns the lock of a project directory. Locks nobody holds or waits
    /// for are dropped on the way.
    fn lock_for(&self, dir: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(dir.to_path_buf()).or_default().clone()
    }

    async fn fetch_project(
        &self,
        dir: &Path,
        proj: &ProjectBookmark,
        cached: Option<ProjectBookmark>,
        refresh: RefreshBehavior,
    ) -> Result<ProjectBookmark, CacheError> {
        let conn = self.accounts.connection_for(&proj.api_url)?;

        let project = match self.fetcher.fetch_project(&conn, &proj.name).await {
            Ok(project) => project,
            Err(e) => {
                warn!("failed to fetch project {} from {}: {}", proj.name, proj.api_url, e);
                let mut degraded = cached.unwrap_or_else(|| ProjectBookmark {
                    packages: None,
                    ..proj.without_contents()
                });
                degraded.packages.get_or_insert_with(Vec::new);
                degraded.state = state_for(&e);
                return Ok(degraded);
            }
        };

        let to_resolve = proj
            .packages
            .clone()
            .or_else(|| cached.as_ref().and_then(|c| c.packages.clone()))
            .unwrap_or_default();

        let mut record = cached.unwrap_or_else(|| ProjectBookmark::new(&proj.api_url, &proj.name));
        if project.meta.is_some() {
            record.meta = project.meta;
        }
        record.state = BookmarkState::OK;
        if proj.checkout_path.is_some() {
            record.checkout_path = proj.checkout_path.clone();
        }
        if proj.packages.is_some() {
            record.packages.get_or_insert_with(Vec::new);
        }

        let resolved = self
            .refresh_packages(&conn, dir, &to_resolve, &mut record, refresh)
            .await?;
        self.persist_logged(dir, &record).await;
        overlay_packages(record, resolved)
    }

    /// Resolves every package in `requested`, storing the successful ones in
    /// `record`. Returns all resolutions, failed ones included.
    async fn refresh_packages(
        &self,
        conn: &Connection,
        dir: &Path,
        requested: &[PackageBookmark],
        record: &mut ProjectBookmark,
        refresh: RefreshBehavior,
    ) -> Result<Vec<PackageBookmark>, CacheError> {
        let mut resolved = Vec::with_capacity(requested.len());
        for pkg in requested {
            let cached_pkg = record.find_package(&pkg.name).cloned();
            let fresh = self
                .resolve_package(conn, pkg, cached_pkg.as_ref(), refresh)
                .await;
            if fresh.state.is_ok() {
                if let Some(old) = &cached_pkg {
                    self.invalidate_stale_blobs(dir, old, &fresh).await;
                }
                record.upsert_package(fresh.clone())?;
            }
            resolved.push(fresh);
        }
        Ok(resolved)
    }

    /// Package-level refresh without any locking or persistence.
    async fn resolve_package(
        &self,
        conn: &Connection,
        requested: &PackageBookmark,
        cached: Option<&PackageBookmark>,
        refresh: RefreshBehavior,
    ) -> PackageBookmark {
        if !package_needs_fetch(requested, cached, refresh) {
            return cached.cloned().unwrap_or_else(|| package_stub(requested));
        }

        match self
            .fetcher
            .fetch_package(conn, &requested.project_name, &requested.name)
            .await
        {
            Ok(pkg) => {
                let mut fresh = PackageBookmark::from_package(pkg);
                fresh.api_url = requested.api_url.clone();
                fresh.project_name = requested.project_name.clone();
                fresh
            }
            Err(e) => {
                warn!(
                    "failed to fetch package {}/{} from {}: {}",
                    requested.project_name, requested.name, requested.api_url, e
                );
                let mut degraded = cached
                    .cloned()
                    .unwrap_or_else(|| requested.without_contents());
                degraded.state = state_for(&e);
                degraded
            }
        }
    }

    /// Drops blobs of files that vanished or whose checksum changed.
    async fn invalidate_stale_blobs(&self, dir: &Path, old: &PackageBookmark, new: &PackageBookmark) {
        for file in old.files.iter().flatten() {
            let stale = match new.find_file(&file.name) {
                None => true,
                Some(current) => match (&file.md5_hash, &current.md5_hash) {
                    (Some(before), Some(after)) => before != after,
                    _ => false,
                },
            };
            if stale {
                remove_logged(&dir.join(&old.name).join(&file.name)).await;
            }
        }
    }

    /// Reads `project.json`, deleting it when it cannot be used.
    async fn read_cached_project(&self, dir: &Path, expected: &ProjectBookmark) -> Option<ProjectBookmark> {
        let path = dir.join(PROJECT_FILE);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("cannot read {}, discarding it: {}", path.display(), e);
                remove_logged(&path).await;
                return None;
            }
        };

        match serde_json::from_slice::<ProjectBookmark>(&bytes) {
            Ok(proj) if proj.api_url == expected.api_url && proj.name == expected.name => Some(proj),
            Ok(proj) => {
                warn!(
                    "{} holds project {} of {}, discarding it",
                    path.display(),
                    proj.name,
                    proj.api_url
                );
                remove_logged(&path).await;
                None
            }
            Err(e) => {
                warn!("corrupt cache file {}, discarding it: {}", path.display(), e);
                remove_logged(&path).await;
                None
            }
        }
    }

    async fn persist_logged(&self, dir: &Path, record: &ProjectBookmark) {
        if let Err(e) = write_project(dir, record).await {
            warn!("could not update cache of project {}: {}", record.name, e);
        }
    }
}

/// True when the cached record lacks something the request asks for.
fn project_needs_fetch(requested: &ProjectBookmark, cached: &ProjectBookmark) -> bool {
    if cached.meta.is_none() {
        return true;
    }
    match (&requested.packages, &cached.packages) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(wanted), Some(_)) => wanted.iter().any(|p| cached.find_package(&p.name).is_none()),
    }
}

fn package_needs_fetch(
    requested: &PackageBookmark,
    cached: Option<&PackageBookmark>,
    refresh: RefreshBehavior,
) -> bool {
    match refresh {
        RefreshBehavior::Never => false,
        RefreshBehavior::Always => true,
        RefreshBehavior::FetchWhenMissing => {
            let Some(cached) = cached else {
                return true;
            };
            if cached.files.is_none() {
                return true;
            }
            requested
                .files
                .iter()
                .flatten()
                .any(|f| cached.find_file(&f.name).is_none())
        }
    }
}

/// Every failed fetch marks the element remote-gone; malformed metadata is
/// recorded on top of that.
fn state_for(err: &FetchError) -> BookmarkState {
    match err {
        FetchError::MalformedMetadata(_) => {
            BookmarkState::REMOTE_GONE.union(BookmarkState::METADATA_BROKEN)
        }
        FetchError::Transport(_) | FetchError::NotFound(_) => BookmarkState::REMOTE_GONE,
    }
}

fn project_stub(proj: &ProjectBookmark) -> ProjectBookmark {
    ProjectBookmark {
        state: BookmarkState::UNKNOWN,
        ..proj.without_contents()
    }
}

fn package_stub(pkg: &PackageBookmark) -> PackageBookmark {
    PackageBookmark {
        state: BookmarkState::UNKNOWN,
        ..pkg.without_contents()
    }
}

/// Replaces (or appends) every resolved package in the record's list.
fn overlay_packages(
    mut record: ProjectBookmark,
    resolved: Vec<PackageBookmark>,
) -> Result<ProjectBookmark, CacheError> {
    for pkg in resolved {
        record.upsert_package(pkg)?;
    }
    Ok(record)
}

/// Package and file names become path components and must stay inside the
/// project directory.
fn validate_component(name: &str) -> Result<(), CacheError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(CacheError::InvalidName(name.to_string()));
    }
    Ok(())
}

async fn write_project(dir: &Path, record: &ProjectBookmark) -> Result<(), CacheError> {
    let json = serde_json::to_vec_pretty(record)
        .map_err(|e| CacheError::Serialization(e.to_string()))?;
    write_atomic(&dir.join(PROJECT_FILE), &json).await
}

/// Writes to a sibling temporary file and renames it over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let parent = path
        .parent()
        .ok_or_else(|| CacheError::Io(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(parent)
        .await
        .map_err(|e| CacheError::Io(format!("failed to create {}: {}", parent.display(), e)))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));
    fs::write(&tmp, bytes)
        .await
        .map_err(|e| CacheError::Io(format!("failed to write {}: {}", tmp.display(), e)))?;
    if let Err(e) = fs::rename(&tmp, path).await {
        remove_logged(&tmp).await;
        return Err(CacheError::Io(format!(
            "failed to move {} into place: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

async fn read_blob(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            warn!("cannot read cached file {}, discarding it: {}", path.display(), e);
            remove_logged(path).await;
            None
        }
    }
}

async fn remove_logged(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("failed to remove {}: {}", path.display(), e),
    }
}
