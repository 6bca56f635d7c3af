//! RPC method handler for the bookmark service's JSON-lines protocol.
//!
//! Kept apart from the binary so it can be tested against an `App` built on
//! a temporary directory. `handle_method` dispatches a method name and its
//! parameters to the bookmark manager, the metadata cache or the settings
//! engine.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::app::App;
use crate::managers::project_bookmarks::ProjectBookmarkManagerTrait;
use crate::services::settings_engine::SettingsEngineTrait;
use crate::types::bookmark::{PackageBookmark, ProjectBookmark, RefreshBehavior};
use crate::types::obs::PackageFile;

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", key))
}

fn parse_param<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, String> {
    let raw = params.get(key).ok_or_else(|| format!("missing {}", key))?;
    serde_json::from_value(raw.clone()).map_err(|e| format!("invalid {}: {}", key, e))
}

/// Reads the optional `refresh` parameter, falling back to the configured
/// default.
fn refresh_param(app: &App, params: &Value) -> Result<RefreshBehavior, String> {
    match params.get("refresh") {
        None | Some(Value::Null) => Ok(app.default_refresh()),
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|_| format!("invalid refresh: {}", raw)),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// Dispatch a method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &App, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),

        // ─── Bookmarks ───
        "obs.bookmarks.listProjects" => {
            let api_url = str_param(params, "apiUrl")?;
            let projects = app
                .bookmarks
                .get_all_bookmarked_projects(api_url)
                .await
                .map_err(|e| e.to_string())?;
            to_json(&projects)
        }
        "obs.bookmarks.apiUrls" => Ok(json!(app.bookmarks.bookmarked_api_urls())),
        "obs.bookmarks.getProject" => {
            let api_url = str_param(params, "apiUrl")?;
            let name = str_param(params, "name")?;
            let refresh = refresh_param(app, params)?;
            let project = app
                .bookmarks
                .get_bookmarked_project(api_url, name, refresh)
                .await
                .map_err(|e| e.to_string())?;
            to_json(&project)
        }
        "obs.bookmarks.getPackage" => {
            let api_url = str_param(params, "apiUrl")?;
            let project_name = str_param(params, "projectName")?;
            let name = str_param(params, "name")?;
            let refresh = refresh_param(app, params)?;
            let package = app
                .bookmarks
                .get_bookmarked_package(api_url, project_name, name, refresh)
                .await
                .map_err(|e| e.to_string())?;
            to_json(&package)
        }
        "obs.bookmarks.addProject" => {
            let project: ProjectBookmark = parse_param(params, "project")?;
            app.bookmarks
                .add_project_to_bookmarks(&project)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "obs.bookmarks.removeProject" => {
            let api_url = str_param(params, "apiUrl")?;
            let name = str_param(params, "name")?;
            app.bookmarks
                .remove_project_from_bookmarks(api_url, name)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "obs.bookmarks.addPackage" => {
            let package: PackageBookmark = parse_param(params, "package")?;
            app.bookmarks
                .add_package_to_bookmarks(&package)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "obs.bookmarks.removePackage" => {
            let api_url = str_param(params, "apiUrl")?;
            let project_name = str_param(params, "projectName")?;
            let name = str_param(params, "name")?;
            app.bookmarks
                .remove_package_from_bookmarks(api_url, project_name, name)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "obs.bookmarks.setCheckoutPath" => {
            let api_url = str_param(params, "apiUrl")?;
            let name = str_param(params, "name")?;
            let path = params
                .get("path")
                .and_then(|v| v.as_str())
                .filter(|p| !p.is_empty())
                .map(PathBuf::from);
            let found = app
                .bookmarks
                .set_checkout_path(api_url, name, path)
                .await
                .map_err(|e| e.to_string())?;
            if !found {
                return Err(format!("project not bookmarked: {}", name));
            }
            Ok(json!({"ok": true}))
        }

        // ─── Cache ───
        "obs.cache.getPackageFile" => {
            let api_url = str_param(params, "apiUrl")?;
            let file: PackageFile = parse_param(params, "file")?;
            let refresh = refresh_param(app, params)?;
            let resolved = app
                .cache
                .get_package_file(api_url, &file, refresh)
                .await
                .map_err(|e| e.to_string())?;
            let mut out = to_json(&resolved)?;
            if let Value::Object(map) = &mut out {
                map.insert(
                    "contents".to_string(),
                    match &resolved.contents {
                        Some(bytes) => Value::String(hex::encode(bytes)),
                        None => Value::Null,
                    },
                );
            }
            Ok(out)
        }

        // ─── Settings ───
        "settings.get" => {
            let engine = app.settings();
            to_json(engine.get_settings())
        }
        "settings.set" => {
            let key = str_param(params, "key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            let mut engine = app.settings();
            engine.set_value(key, value).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
