use std::fmt;

// === FetchError ===

/// Errors reported by an `ObsFetcher` while talking to an OBS instance.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Network unreachable, HTTP failure, authentication rejected.
    Transport(String),
    /// The server answered but the project, package or file does not exist.
    NotFound(String),
    /// The server answered with metadata that could not be understood.
    MalformedMetadata(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "Transport error: {}", msg),
            FetchError::NotFound(what) => write!(f, "Not found on server: {}", what),
            FetchError::MalformedMetadata(msg) => write!(f, "Malformed metadata: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

// === BookmarkError ===

/// Errors related to bookmark management operations.
#[derive(Debug, Clone, PartialEq)]
pub enum BookmarkError {
    /// A package was inserted into a project it does not belong to.
    Mismatch(String),
    /// The metadata cache failed in a way that has no degraded result.
    Cache(String),
    /// The persisted settings store could not be written.
    Storage(String),
    /// The bookmark list could not be serialized.
    Serialization(String),
}

impl fmt::Display for BookmarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookmarkError::Mismatch(msg) => write!(f, "Bookmark mismatch: {}", msg),
            BookmarkError::Cache(msg) => write!(f, "Bookmark cache error: {}", msg),
            BookmarkError::Storage(msg) => write!(f, "Bookmark storage error: {}", msg),
            BookmarkError::Serialization(msg) => {
                write!(f, "Bookmark serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for BookmarkError {}

impl From<CacheError> for BookmarkError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Bookmark(inner) => inner,
            other => BookmarkError::Cache(other.to_string()),
        }
    }
}

impl From<MementoError> for BookmarkError {
    fn from(err: MementoError) -> Self {
        BookmarkError::Storage(err.to_string())
    }
}

// === CacheError ===

/// Errors raised by the metadata cache that cannot be turned into a degraded result.
#[derive(Debug)]
pub enum CacheError {
    /// No account is configured for the given API URL.
    NoAccount(String),
    /// A project, package or file name cannot be mapped onto a cache path.
    InvalidName(String),
    /// Writing the on-disk cache failed.
    Io(String),
    /// A cache record could not be serialized.
    Serialization(String),
    /// A bookmark invariant was violated while merging records.
    Bookmark(BookmarkError),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::NoAccount(url) => {
                write!(f, "No account is configured for the API URL {}", url)
            }
            CacheError::InvalidName(name) => write!(f, "Invalid cache name: {}", name),
            CacheError::Io(msg) => write!(f, "Cache I/O error: {}", msg),
            CacheError::Serialization(msg) => write!(f, "Cache serialization error: {}", msg),
            CacheError::Bookmark(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Bookmark(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BookmarkError> for CacheError {
    fn from(err: BookmarkError) -> Self {
        CacheError::Bookmark(err)
    }
}

// === MementoError ===

/// Errors related to the persisted key-value settings store.
#[derive(Debug)]
pub enum MementoError {
    /// The backing database rejected the operation.
    Database(String),
    /// The value could not be encoded.
    Serialization(String),
    /// The store's lock was poisoned by a panicking writer.
    Lock(String),
}

impl fmt::Display for MementoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MementoError::Database(msg) => write!(f, "Global state database error: {}", msg),
            MementoError::Serialization(msg) => {
                write!(f, "Global state serialization error: {}", msg)
            }
            MementoError::Lock(msg) => write!(f, "Global state lock poisoned: {}", msg),
        }
    }
}

impl std::error::Error for MementoError {}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    IoError(String),
    /// Failed to serialize or deserialize settings.
    SerializationError(String),
    /// The provided settings key is invalid.
    InvalidKey(String),
    /// The provided settings value is invalid.
    InvalidValue(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "Settings I/O error: {}", msg),
            SettingsError::SerializationError(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
            SettingsError::InvalidKey(key) => write!(f, "Invalid settings key: {}", key),
            SettingsError::InvalidValue(msg) => {
                write!(f, "Invalid settings value: {}", msg)
            }
        }
    }
}

impl std::error::Error for SettingsError {}
