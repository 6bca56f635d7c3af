//! Tests for the JSON-lines method dispatcher, run against an `App` rooted in
//! a temporary directory.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{ScriptedFetcher, API};
use obs_bookmarks::app::{App, STATE_DB_FILE};
use obs_bookmarks::rpc_handler::handle_method;
use obs_bookmarks::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use serde_json::{json, Value};
use tempfile::TempDir;

const PROJECT: &str = "devel:tools";

fn app_in(dir: &TempDir) -> (App, Arc<ScriptedFetcher>) {
    let fetcher = ScriptedFetcher::new();
    fetcher.add_project(PROJECT, "Development tools");
    fetcher.add_package(PROJECT, "gcc", &[("gcc.spec", b"Name: gcc")]);

    let path = dir.path().join("settings.json").to_string_lossy().to_string();
    let mut engine = SettingsEngine::new(Some(path));
    engine.load().unwrap();
    engine
        .set_value(
            "storage.global_storage_dir",
            json!(dir.path().join("storage").to_string_lossy()),
        )
        .unwrap();
    engine
        .set_value(
            "accounts",
            json!([{"api_url": API, "alias": "obs", "username": "geeko"}]),
        )
        .unwrap();

    let app = App::new(engine, fetcher.clone()).unwrap();
    (app, fetcher)
}

async fn call(app: &App, method: &str, params: Value) -> Result<Value, String> {
    handle_method(app, method, &params).await
}

#[tokio::test]
async fn ping_reports_version() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app_in(&dir);
    let res = call(&app, "ping", json!({})).await.unwrap();
    assert_eq!(res["pong"], json!(true));
    assert!(dir.path().join("storage").join(STATE_DB_FILE).exists());
}

#[tokio::test]
async fn unknown_method_is_an_error() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app_in(&dir);
    let err = call(&app, "bookmark.add", json!({})).await.unwrap_err();
    assert!(err.contains("unknown method"));
}

#[tokio::test]
async fn missing_params_are_reported() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app_in(&dir);

    let err = call(&app, "obs.bookmarks.getProject", json!({"name": PROJECT}))
        .await
        .unwrap_err();
    assert_eq!(err, "missing apiUrl");

    let err = call(&app, "obs.bookmarks.addProject", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err, "missing project");

    let err = call(
        &app,
        "obs.bookmarks.addProject",
        json!({"project": {"name": PROJECT}}),
    )
    .await
    .unwrap_err();
    assert!(err.starts_with("invalid project"));
}

#[tokio::test]
async fn project_lifecycle() {
    let dir = TempDir::new().unwrap();
    let (app, fetcher) = app_in(&dir);

    call(
        &app,
        "obs.bookmarks.addProject",
        json!({"project": {"apiUrl": API, "name": PROJECT}}),
    )
    .await
    .unwrap();

    let offline = call(
        &app,
        "obs.bookmarks.getProject",
        json!({"apiUrl": API, "name": PROJECT, "refresh": "Never"}),
    )
    .await
    .unwrap();
    assert_eq!(offline["name"], json!(PROJECT));
    assert_eq!(fetcher.calls(), 0);

    let fetched = call(
        &app,
        "obs.bookmarks.getProject",
        json!({"apiUrl": API, "name": PROJECT}),
    )
    .await
    .unwrap();
    assert_eq!(fetched["meta"]["title"], json!("Development tools"));
    assert_eq!(fetched["state"], json!(0));

    let listed = call(&app, "obs.bookmarks.listProjects", json!({"apiUrl": API}))
        .await
        .unwrap();
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(
        call(&app, "obs.bookmarks.apiUrls", json!({})).await.unwrap(),
        json!([API])
    );

    call(
        &app,
        "obs.bookmarks.removeProject",
        json!({"apiUrl": API, "name": PROJECT}),
    )
    .await
    .unwrap();
    let gone = call(
        &app,
        "obs.bookmarks.getProject",
        json!({"apiUrl": API, "name": PROJECT, "refresh": "Never"}),
    )
    .await
    .unwrap();
    assert_eq!(gone, Value::Null);
}

#[tokio::test]
async fn invalid_refresh_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app_in(&dir);
    let err = call(
        &app,
        "obs.bookmarks.getProject",
        json!({"apiUrl": API, "name": PROJECT, "refresh": "Sometimes"}),
    )
    .await
    .unwrap_err();
    assert!(err.starts_with("invalid refresh"));
}

#[tokio::test]
async fn package_and_file_contents() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app_in(&dir);

    call(
        &app,
        "obs.bookmarks.addPackage",
        json!({"package": {"apiUrl": API, "projectName": PROJECT, "name": "gcc"}}),
    )
    .await
    .unwrap();

    let pkg = call(
        &app,
        "obs.bookmarks.getPackage",
        json!({"apiUrl": API, "projectName": PROJECT, "name": "gcc"}),
    )
    .await
    .unwrap();
    assert_eq!(pkg["files"][0]["name"], json!("gcc.spec"));

    let file = call(
        &app,
        "obs.cache.getPackageFile",
        json!({
            "apiUrl": API,
            "file": {"projectName": PROJECT, "packageName": "gcc", "name": "gcc.spec"}
        }),
    )
    .await
    .unwrap();
    assert_eq!(file["contents"], json!(hex::encode(b"Name: gcc")));
    assert_eq!(file["md5Hash"], json!("gcc.spec-9"));

    call(
        &app,
        "obs.bookmarks.removePackage",
        json!({"apiUrl": API, "projectName": PROJECT, "name": "gcc"}),
    )
    .await
    .unwrap();
    let gone = call(
        &app,
        "obs.bookmarks.getPackage",
        json!({"apiUrl": API, "projectName": PROJECT, "name": "gcc", "refresh": "Never"}),
    )
    .await
    .unwrap();
    assert_eq!(gone, Value::Null);
}

#[tokio::test]
async fn checkout_path_requires_a_bookmark() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app_in(&dir);

    let err = call(
        &app,
        "obs.bookmarks.setCheckoutPath",
        json!({"apiUrl": API, "name": PROJECT, "path": "/tmp/co"}),
    )
    .await
    .unwrap_err();
    assert!(err.contains("not bookmarked"));

    call(
        &app,
        "obs.bookmarks.addProject",
        json!({"project": {"apiUrl": API, "name": PROJECT}}),
    )
    .await
    .unwrap();
    call(
        &app,
        "obs.bookmarks.setCheckoutPath",
        json!({"apiUrl": API, "name": PROJECT, "path": "/tmp/co"}),
    )
    .await
    .unwrap();
    let proj = call(
        &app,
        "obs.bookmarks.getProject",
        json!({"apiUrl": API, "name": PROJECT, "refresh": "Never"}),
    )
    .await
    .unwrap();
    assert_eq!(proj["checkoutPath"], json!("/tmp/co"));
}

#[tokio::test]
async fn settings_roundtrip_through_methods() {
    let dir = TempDir::new().unwrap();
    let (app, fetcher) = app_in(&dir);

    let settings = call(&app, "settings.get", json!({})).await.unwrap();
    assert_eq!(settings["cache"]["default_refresh"], json!("FetchWhenMissing"));

    call(
        &app,
        "settings.set",
        json!({"key": "cache.default_refresh", "value": "Never"}),
    )
    .await
    .unwrap();
    let err = call(&app, "settings.set", json!({"key": "cache.nope", "value": 1}))
        .await
        .unwrap_err();
    assert!(err.contains("Invalid settings key"));

    // The new default applies to calls without an explicit refresh.
    call(
        &app,
        "obs.bookmarks.addProject",
        json!({"project": {"apiUrl": API, "name": PROJECT}}),
    )
    .await
    .unwrap();
    call(
        &app,
        "obs.bookmarks.getProject",
        json!({"apiUrl": API, "name": PROJECT}),
    )
    .await
    .unwrap();
    assert_eq!(fetcher.calls(), 0);
}
