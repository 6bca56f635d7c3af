use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::BookmarkError;
use super::obs::{Package, PackageFile, ProjectMeta};

/// Health of a bookmarked project or package.
///
/// Each fact is independent and any combination may hold at once. The empty
/// set means the last refresh succeeded. On disk and in the bookmark store
/// the state is the legacy bitmask (`LocalGone = 0x1`, `RemoteGone = 0x2`,
/// `MetadataBroken = 0x4`, `Unknown = 0x8`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct BookmarkState {
    pub local_gone: bool,
    pub remote_gone: bool,
    pub metadata_broken: bool,
    pub unknown: bool,
}

impl BookmarkState {
    pub const LOCAL_GONE_BIT: u8 = 0x1;
    pub const REMOTE_GONE_BIT: u8 = 0x2;
    pub const METADATA_BROKEN_BIT: u8 = 0x4;
    pub const UNKNOWN_BIT: u8 = 0x8;
    const ALL_BITS: u8 = 0xF;

    pub const OK: Self = Self {
        local_gone: false,
        remote_gone: false,
        metadata_broken: false,
        unknown: false,
    };

    pub const UNKNOWN: Self = Self {
        unknown: true,
        ..Self::OK
    };

    pub const REMOTE_GONE: Self = Self {
        remote_gone: true,
        ..Self::OK
    };

    pub const METADATA_BROKEN: Self = Self {
        metadata_broken: true,
        ..Self::OK
    };

    pub const LOCAL_GONE: Self = Self {
        local_gone: true,
        ..Self::OK
    };

    /// True when no failure or uncertainty is recorded.
    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }

    /// Returns the set of facts that hold in either state.
    pub fn union(self, other: Self) -> Self {
        Self {
            local_gone: self.local_gone || other.local_gone,
            remote_gone: self.remote_gone || other.remote_gone,
            metadata_broken: self.metadata_broken || other.metadata_broken,
            unknown: self.unknown || other.unknown,
        }
    }

    /// Encodes the state as the legacy bitmask.
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.local_gone {
            bits |= Self::LOCAL_GONE_BIT;
        }
        if self.remote_gone {
            bits |= Self::REMOTE_GONE_BIT;
        }
        if self.metadata_broken {
            bits |= Self::METADATA_BROKEN_BIT;
        }
        if self.unknown {
            bits |= Self::UNKNOWN_BIT;
        }
        bits
    }

    /// Decodes a legacy bitmask, rejecting bits that carry no meaning.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL_BITS != 0 {
            return None;
        }
        Some(Self {
            local_gone: bits & Self::LOCAL_GONE_BIT != 0,
            remote_gone: bits & Self::REMOTE_GONE_BIT != 0,
            metadata_broken: bits & Self::METADATA_BROKEN_BIT != 0,
            unknown: bits & Self::UNKNOWN_BIT != 0,
        })
    }
}

impl From<BookmarkState> for u8 {
    fn from(state: BookmarkState) -> Self {
        state.bits()
    }
}

impl TryFrom<u8> for BookmarkState {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        BookmarkState::from_bits(bits)
            .ok_or_else(|| format!("invalid bookmark state bitmask: {:#x}", bits))
    }
}

/// How eagerly the metadata cache may contact the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshBehavior {
    /// Only ever answer from the cache.
    Never,
    /// Contact the server when the cache lacks something the caller asked for.
    #[default]
    FetchWhenMissing,
    /// Always contact the server.
    Always,
}

/// A package inside a bookmarked project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageBookmark {
    pub api_url: String,
    pub project_name: String,
    pub name: String,
    #[serde(default)]
    pub state: BookmarkState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<PackageFile>>,
}

impl PackageBookmark {
    pub fn new(api_url: &str, project_name: &str, name: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            project_name: project_name.to_string(),
            name: name.to_string(),
            state: BookmarkState::OK,
            title: None,
            description: None,
            files: None,
        }
    }

    /// Converts a freshly fetched package into a healthy bookmark.
    pub fn from_package(pkg: Package) -> Self {
        Self {
            api_url: pkg.api_url,
            project_name: pkg.project_name,
            name: pkg.name,
            state: BookmarkState::OK,
            title: pkg.title,
            description: pkg.description,
            files: Some(pkg.files.iter().map(PackageFile::without_contents).collect()),
        }
    }

    /// Returns a copy with every file's contents dropped.
    pub fn without_contents(&self) -> Self {
        Self {
            files: self
                .files
                .as_ref()
                .map(|files| files.iter().map(PackageFile::without_contents).collect()),
            ..self.clone()
        }
    }

    pub fn find_file(&self, name: &str) -> Option<&PackageFile> {
        self.files.as_ref()?.iter().find(|f| f.name == name)
    }
}

/// A project the user has chosen to track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBookmark {
    pub api_url: String,
    pub name: String,
    #[serde(default)]
    pub state: BookmarkState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<PackageBookmark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ProjectMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_path: Option<PathBuf>,
}

impl ProjectBookmark {
    pub fn new(api_url: &str, name: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            name: name.to_string(),
            state: BookmarkState::OK,
            packages: None,
            meta: None,
            checkout_path: None,
        }
    }

    /// Returns a copy with the contents of every package's files dropped.
    pub fn without_contents(&self) -> Self {
        Self {
            packages: self
                .packages
                .as_ref()
                .map(|pkgs| pkgs.iter().map(PackageBookmark::without_contents).collect()),
            ..self.clone()
        }
    }

    pub fn find_package(&self, name: &str) -> Option<&PackageBookmark> {
        self.packages.as_ref()?.iter().find(|p| p.name == name)
    }

    pub fn package_names(&self) -> Vec<String> {
        self.packages
            .as_ref()
            .map(|pkgs| pkgs.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Inserts the package or replaces the one with the same name.
    ///
    /// Fails with `BookmarkError::Mismatch` when the package belongs to a
    /// different project.
    pub fn upsert_package(&mut self, pkg: PackageBookmark) -> Result<ChangeType, BookmarkError> {
        if pkg.api_url != self.api_url || pkg.project_name != self.name {
            return Err(BookmarkError::Mismatch(format!(
                "package {}/{} (at {}) cannot be stored in project {} (at {})",
                pkg.project_name, pkg.name, pkg.api_url, self.name, self.api_url
            )));
        }

        let packages = self.packages.get_or_insert_with(Vec::new);
        match packages.iter_mut().find(|p| p.name == pkg.name) {
            Some(existing) => {
                *existing = pkg;
                Ok(ChangeType::Modify)
            }
            None => {
                packages.push(pkg);
                Ok(ChangeType::Add)
            }
        }
    }

    /// Removes the package with the given name, returning it if it was present.
    pub fn remove_package(&mut self, name: &str) -> Option<PackageBookmark> {
        let packages = self.packages.as_mut()?;
        let idx = packages.iter().position(|p| p.name == name)?;
        Some(packages.remove(idx))
    }
}

/// What kind of change a `BookmarkUpdate` describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Add,
    Remove,
    Modify,
}

/// Whether a `BookmarkUpdate` concerns a project or a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangedObject {
    Project,
    Package,
}

/// The bookmark an update refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "bookmark")]
pub enum BookmarkElement {
    Project(ProjectBookmark),
    Package(PackageBookmark),
}

/// Notification fired after every mutation of the bookmark list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkUpdate {
    pub change_type: ChangeType,
    pub element: BookmarkElement,
}

impl BookmarkUpdate {
    pub fn changed_object(&self) -> ChangedObject {
        match self.element {
            BookmarkElement::Project(_) => ChangedObject::Project,
            BookmarkElement::Package(_) => ChangedObject::Package,
        }
    }
}
