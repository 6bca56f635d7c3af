// Platform-specific locations for the settings file and the global storage.
//
// Uses `cfg(target_os)` to pick the conventional directories of each OS.

use std::env;
use std::path::PathBuf;

const APP_DIR_NAME: &str = "obs-bookmarks";

fn home_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    PathBuf::from(env::var(var).unwrap_or_else(|_| env::temp_dir().to_string_lossy().into_owned()))
}

/// Directory holding `settings.json`.
///
/// - **Linux**: `$XDG_CONFIG_HOME/obs-bookmarks` or `~/.config/obs-bookmarks`
/// - **macOS**: `~/Library/Application Support/obs-bookmarks`
/// - **Windows**: `%APPDATA%/obs-bookmarks`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        home_dir()
            .join("Library")
            .join("Application Support")
            .join(APP_DIR_NAME)
    }
    #[cfg(target_os = "windows")]
    {
        env::var("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join("AppData").join("Roaming"))
            .join(APP_DIR_NAME)
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        xdg_dir("XDG_CONFIG_HOME", &[".config"])
    }
}

/// Global storage root: the state database and the project cache live here.
///
/// - **Linux**: `$XDG_DATA_HOME/obs-bookmarks` or `~/.local/share/obs-bookmarks`
/// - **macOS**: `~/Library/Application Support/obs-bookmarks/globalStorage`
/// - **Windows**: `%LOCALAPPDATA%/obs-bookmarks`
pub fn get_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        get_config_dir().join("globalStorage")
    }
    #[cfg(target_os = "windows")]
    {
        env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join("AppData").join("Local"))
            .join(APP_DIR_NAME)
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        xdg_dir("XDG_DATA_HOME", &[".local", "share"])
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn xdg_dir(var: &str, fallback: &[&str]) -> PathBuf {
    match env::var(var) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir).join(APP_DIR_NAME),
        _ => fallback
            .iter()
            .fold(home_dir(), |path, part| path.join(part))
            .join(APP_DIR_NAME),
    }
}
