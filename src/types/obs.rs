use serde::{Deserialize, Serialize};

/// Identity of an authenticated OBS endpoint as handed to an `ObsFetcher`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub api_url: String,
    pub username: String,
}

/// A build repository configured in a project's `_meta`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub arch: Vec<String>,
    #[serde(default)]
    pub paths: Vec<RepositoryPath>,
}

/// A repository another repository builds against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryPath {
    pub project: String,
    pub repository: String,
}

/// Server-side project configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

/// A file inside an OBS package.
///
/// `contents` is only ever held in memory. It is skipped by serde, so neither
/// `project.json` nor the bookmark store ever carry file bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFile {
    pub project_name: String,
    pub package_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<i64>,
    #[serde(skip)]
    pub contents: Option<Vec<u8>>,
}

impl PackageFile {
    /// Creates a bare file descriptor without any metadata.
    pub fn new(project_name: &str, package_name: &str, name: &str) -> Self {
        Self {
            project_name: project_name.to_string(),
            package_name: package_name.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Returns a copy of this descriptor without its contents.
    pub fn without_contents(&self) -> Self {
        Self {
            contents: None,
            ..self.clone()
        }
    }
}

/// A project as returned by the OBS API, fetched without its package list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub api_url: String,
    pub name: String,
    pub meta: Option<ProjectMeta>,
}

/// A package as returned by the OBS API. `files` is always present on a
/// successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub api_url: String,
    pub project_name: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub files: Vec<PackageFile>,
}
