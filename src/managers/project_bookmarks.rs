//! Project Bookmark Manager.
//!
//! Owns the user-curated list of bookmarked OBS projects and packages per API
//! URL, persists it through a [`Memento`] and narrows everything the
//! [`MetadataCache`] returns down to what the user actually bookmarked.
//! Every mutation is announced on a broadcast channel.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::services::memento::Memento;
use crate::services::metadata_cache::MetadataCache;
use crate::types::bookmark::{
    BookmarkElement, BookmarkUpdate, ChangeType, PackageBookmark, ProjectBookmark,
    RefreshBehavior,
};
use crate::types::errors::BookmarkError;

/// Memento key holding the bookmark list as `[apiUrl, ProjectBookmark[]][]`.
pub const BOOKMARK_STORAGE_KEY: &str = "vscodeObs.ProjectTree.Projects";

const UPDATE_CHANNEL_CAPACITY: usize = 64;

type BookmarkMap = BTreeMap<String, Vec<ProjectBookmark>>;

/// Trait defining bookmark management operations.
#[async_trait]
pub trait ProjectBookmarkManagerTrait: Send + Sync {
    async fn get_all_bookmarked_projects(&self, api_url: &str) -> Result<Vec<ProjectBookmark>, BookmarkError>;
    async fn get_bookmarked_project(
        &self,
        api_url: &str,
        name: &str,
        refresh: RefreshBehavior,
    ) -> Result<Option<ProjectBookmark>, BookmarkError>;
    async fn get_bookmarked_package(
        &self,
        api_url: &str,
        project_name: &str,
        package_name: &str,
        refresh: RefreshBehavior,
    ) -> Result<Option<PackageBookmark>, BookmarkError>;
    async fn add_project_to_bookmarks(&self, proj: &ProjectBookmark) -> Result<(), BookmarkError>;
    async fn remove_project_from_bookmarks(&self, api_url: &str, name: &str) -> Result<(), BookmarkError>;
    async fn add_package_to_bookmarks(&self, pkg: &PackageBookmark) -> Result<(), BookmarkError>;
    async fn remove_package_from_bookmarks(
        &self,
        api_url: &str,
        project_name: &str,
        name: &str,
    ) -> Result<(), BookmarkError>;
    async fn set_checkout_path(
        &self,
        api_url: &str,
        name: &str,
        path: Option<PathBuf>,
    ) -> Result<bool, BookmarkError>;
    fn bookmarked_api_urls(&self) -> Vec<String>;
    fn subscribe(&self) -> broadcast::Receiver<BookmarkUpdate>;
    async fn dispose(&self) -> Result<(), BookmarkError>;
}

/// Bookmark manager backed by a memento and the metadata cache.
pub struct ProjectBookmarkManager {
    bookmarks: RwLock<BookmarkMap>,
    memento: Arc<dyn Memento>,
    cache: Arc<MetadataCache>,
    updates: broadcast::Sender<BookmarkUpdate>,
}

impl ProjectBookmarkManager {
    /// Creates the manager, restoring the bookmark list from `memento`.
    ///
    /// A list that cannot be decoded is logged and replaced by an empty one.
    pub fn new(memento: Arc<dyn Memento>, cache: Arc<MetadataCache>) -> Self {
        let bookmarks = load_bookmarks(memento.as_ref());
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            bookmarks: RwLock::new(bookmarks),
            memento,
            cache,
            updates,
        }
    }

    /// Returns the metadata cache this manager reads through.
    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    fn read_map(&self) -> RwLockReadGuard<'_, BookmarkMap> {
        self.bookmarks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, BookmarkMap> {
        self.bookmarks.write().unwrap_or_else(|e| e.into_inner())
    }

    fn entry(&self, api_url: &str, name: &str) -> Option<ProjectBookmark> {
        self.read_map()
            .get(api_url)?
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    /// Writes the whole bookmark list to the memento.
    async fn persist(&self) -> Result<(), BookmarkError> {
        let snapshot: Vec<(String, Vec<ProjectBookmark>)> = self
            .read_map()
            .iter()
            .map(|(url, projects)| {
                (
                    url.clone(),
                    projects.iter().map(ProjectBookmark::without_contents).collect(),
                )
            })
            .collect();
        let value = serde_json::to_value(snapshot)
            .map_err(|e| BookmarkError::Serialization(e.to_string()))?;
        self.memento.update(BOOKMARK_STORAGE_KEY, value).await?;
        Ok(())
    }

    fn notify(&self, change_type: ChangeType, element: BookmarkElement) {
        // Sending only fails when nobody is subscribed.
        let _ = self.updates.send(BookmarkUpdate {
            change_type,
            element,
        });
    }

    /// Applies `f` to a bookmarked project and persists when it reports a change.
    async fn update_entry<F>(&self, api_url: &str, name: &str, f: F) -> Result<bool, BookmarkError>
    where
        F: FnOnce(&mut ProjectBookmark) -> bool + Send,
    {
        let changed = {
            let mut map = self.write_map();
            match map
                .get_mut(api_url)
                .and_then(|list| list.iter_mut().find(|p| p.name == name))
            {
                Some(entry) => f(entry),
                None => false,
            }
        };
        if changed {
            self.persist().await?;
        }
        Ok(changed)
    }

    async fn seed_cache(&self, proj: &ProjectBookmark) {
        if let Err(e) = self.cache.add_project(proj).await {
            warn!("could not seed the cache with project {}: {}", proj.name, e);
        }
    }
}

#[async_trait]
impl ProjectBookmarkManagerTrait for ProjectBookmarkManager {
    /// Returns every bookmarked project of `api_url`, each re-resolved
    /// through the cache.
    async fn get_all_bookmarked_projects(&self, api_url: &str) -> Result<Vec<ProjectBookmark>, BookmarkError> {
        let names: Vec<String> = self
            .read_map()
            .get(api_url)
            .map(|list| list.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default();

        let mut projects = Vec::with_capacity(names.len());
        for name in names {
            if let Some(proj) = self
                .get_bookmarked_project(api_url, &name, RefreshBehavior::default())
                .await?
            {
                projects.push(proj);
            }
        }
        Ok(projects)
    }

    /// Returns the project if it is bookmarked, with its packages narrowed to
    /// the bookmarked ones.
    async fn get_bookmarked_project(
        &self,
        api_url: &str,
        name: &str,
        refresh: RefreshBehavior,
    ) -> Result<Option<ProjectBookmark>, BookmarkError> {
        let Some(entry) = self.entry(api_url, name) else {
            return Ok(None);
        };

        let cached = self.cache.get_project(&entry, refresh).await?;
        let mut proj = restrict_to_bookmarked(cached, &entry);
        if proj.checkout_path.is_none() {
            proj.checkout_path = entry.checkout_path.clone();
        }

        if proj.state.unknown && !entry.state.unknown {
            proj.state = entry.state;
        } else if proj.state != entry.state {
            let state = proj.state;
            self.update_entry(api_url, name, move |e| {
                e.state = state;
                true
            })
            .await?;
        }

        Ok(Some(proj))
    }

    /// Returns the package if both it and its project are bookmarked.
    ///
    /// The owning project is resolved first, so its metadata and state are
    /// refreshed as well. The package is then looked up among the project's
    /// bookmarked packages and resolved on its own.
    async fn get_bookmarked_package(
        &self,
        api_url: &str,
        project_name: &str,
        package_name: &str,
        refresh: RefreshBehavior,
    ) -> Result<Option<PackageBookmark>, BookmarkError> {
        let Some(bookmark) = self
            .entry(api_url, project_name)
            .and_then(|p| p.find_package(package_name).cloned())
        else {
            return Ok(None);
        };

        let Some(found) = self
            .get_bookmarked_project(api_url, project_name, refresh)
            .await?
            .and_then(|p| p.find_package(package_name).cloned())
        else {
            debug!(
                "package {}/{} is not part of the resolved project",
                project_name, package_name
            );
            return Ok(None);
        };

        let mut pkg = self.cache.get_package(&found, refresh, true).await?;

        if pkg.state.unknown && !bookmark.state.unknown {
            pkg.state = bookmark.state;
        } else if pkg.state != bookmark.state {
            let state = pkg.state;
            let package_name = package_name.to_string();
            self.update_entry(api_url, project_name, move |e| {
                e.packages
                    .iter_mut()
                    .flatten()
                    .find(|p| p.name == package_name)
                    .map(|p| p.state = state)
                    .is_some()
            })
            .await?;
        }

        Ok(Some(pkg))
    }

    /// Adds the project or replaces the existing bookmark of the same name.
    async fn add_project_to_bookmarks(&self, proj: &ProjectBookmark) -> Result<(), BookmarkError> {
        let mut stripped = ProjectBookmark {
            packages: None,
            ..proj.without_contents()
        };
        if let Some(packages) = &proj.packages {
            stripped.packages = Some(Vec::with_capacity(packages.len()));
            for pkg in packages {
                stripped.upsert_package(pkg.without_contents())?;
            }
        }

        let change = {
            let mut map = self.write_map();
            let list = map.entry(stripped.api_url.clone()).or_default();
            match list.iter_mut().find(|p| p.name == stripped.name) {
                Some(existing) => {
                    *existing = stripped.clone();
                    ChangeType::Modify
                }
                None => {
                    list.push(stripped.clone());
                    ChangeType::Add
                }
            }
        };

        self.persist().await?;
        info!("bookmarked project {} of {} ({:?})", stripped.name, stripped.api_url, change);
        self.notify(change, BookmarkElement::Project(stripped.clone()));
        self.seed_cache(&stripped).await;
        Ok(())
    }

    /// Removes a project with all its packages and purges its cache entry.
    async fn remove_project_from_bookmarks(&self, api_url: &str, name: &str) -> Result<(), BookmarkError> {
        let removed = {
            let mut map = self.write_map();
            let removed = map.get_mut(api_url).and_then(|list| {
                let idx = list.iter().position(|p| p.name == name)?;
                Some(list.remove(idx))
            });
            if map.get(api_url).is_some_and(|list| list.is_empty()) {
                map.remove(api_url);
            }
            removed
        };

        let Some(removed) = removed else {
            debug!("project {} of {} is not bookmarked, nothing to remove", name, api_url);
            return Ok(());
        };

        self.persist().await?;
        info!("removed project {} of {} from bookmarks", name, api_url);
        self.notify(ChangeType::Remove, BookmarkElement::Project(removed));

        if let Err(e) = self.cache.remove_project(api_url, name).await {
            warn!("could not purge the cache of project {}: {}", name, e);
        }
        Ok(())
    }

    /// Adds a package, bookmarking its project first when necessary.
    async fn add_package_to_bookmarks(&self, pkg: &PackageBookmark) -> Result<(), BookmarkError> {
        let pkg = pkg.without_contents();

        let (change, element, seed) = {
            let mut map = self.write_map();
            let list = map.entry(pkg.api_url.clone()).or_default();
            match list.iter_mut().find(|p| p.name == pkg.project_name) {
                Some(project) => {
                    let change = project.upsert_package(pkg.clone())?;
                    let mut seed = ProjectBookmark {
                        packages: None,
                        ..project.clone()
                    };
                    seed.upsert_package(pkg.clone())?;
                    (change, BookmarkElement::Package(pkg.clone()), seed)
                }
                None => {
                    let mut project = ProjectBookmark::new(&pkg.api_url, &pkg.project_name);
                    project.upsert_package(pkg.clone())?;
                    list.push(project.clone());
                    (ChangeType::Add, BookmarkElement::Project(project.clone()), project)
                }
            }
        };

        self.persist().await?;
        info!(
            "bookmarked package {}/{} of {} ({:?})",
            pkg.project_name, pkg.name, pkg.api_url, change
        );
        self.notify(change, element);
        self.seed_cache(&seed).await;
        Ok(())
    }

    /// Removes a single package from its project's bookmark.
    async fn remove_package_from_bookmarks(
        &self,
        api_url: &str,
        project_name: &str,
        name: &str,
    ) -> Result<(), BookmarkError> {
        let removed = {
            let mut map = self.write_map();
            map.get_mut(api_url)
                .and_then(|list| list.iter_mut().find(|p| p.name == project_name))
                .and_then(|project| project.remove_package(name))
        };

        let Some(removed) = removed else {
            debug!(
                "package {}/{} of {} is not bookmarked, nothing to remove",
                project_name, name, api_url
            );
            return Ok(());
        };

        self.persist().await?;
        info!("removed package {}/{} of {} from bookmarks", project_name, name, api_url);
        self.notify(ChangeType::Remove, BookmarkElement::Package(removed));
        Ok(())
    }

    /// Records where a bookmarked project has been checked out.
    ///
    /// Returns `false` when the project is not bookmarked.
    async fn set_checkout_path(
        &self,
        api_url: &str,
        name: &str,
        path: Option<PathBuf>,
    ) -> Result<bool, BookmarkError> {
        let mut updated = None;
        let changed = self
            .update_entry(api_url, name, |entry| {
                if entry.checkout_path == path {
                    return false;
                }
                entry.checkout_path = path;
                updated = Some(entry.clone());
                true
            })
            .await?;

        if let Some(entry) = updated {
            self.notify(ChangeType::Modify, BookmarkElement::Project(entry.clone()));
            self.seed_cache(&ProjectBookmark {
                packages: None,
                ..entry
            })
            .await;
        }
        Ok(changed || self.entry(api_url, name).is_some())
    }

    /// API URLs that have at least one bookmarked project.
    fn bookmarked_api_urls(&self) -> Vec<String> {
        self.read_map()
            .iter()
            .filter(|(_, projects)| !projects.is_empty())
            .map(|(url, _)| url.clone())
            .collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<BookmarkUpdate> {
        self.updates.subscribe()
    }

    /// Flushes the bookmark list one last time.
    async fn dispose(&self) -> Result<(), BookmarkError> {
        self.persist().await
    }
}

/// Keeps only the packages that are bookmarked in `entry`, in bookmark order.
fn restrict_to_bookmarked(mut proj: ProjectBookmark, entry: &ProjectBookmark) -> ProjectBookmark {
    proj.packages = match &entry.packages {
        Some(bookmarked) => Some(
            bookmarked
                .iter()
                .filter_map(|b| proj.find_package(&b.name).cloned())
                .collect(),
        ),
        None => proj.packages.as_ref().map(|_| Vec::new()),
    };
    proj
}

fn load_bookmarks(memento: &dyn Memento) -> BookmarkMap {
    let mut map = BookmarkMap::new();
    let Some(value) = memento.get(BOOKMARK_STORAGE_KEY) else {
        return map;
    };

    let entries: Vec<(String, Vec<ProjectBookmark>)> = match serde_json::from_value(value) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("discarding unreadable bookmark list: {}", e);
            return map;
        }
    };

    for (api_url, projects) in entries {
        let list = map.entry(api_url).or_default();
        for proj in projects {
            if list.iter().any(|p| p.name == proj.name) {
                warn!("ignoring duplicate bookmark of project {}", proj.name);
                continue;
            }
            list.push(proj);
        }
    }
    map
}
