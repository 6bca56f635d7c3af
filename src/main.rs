//! obs-bookmarks: the OBS project bookmark service.
//!
//! Protocol: one JSON object per line (newline-delimited JSON) on stdin/stdout.
//! Request:  {"id":1, "method":"obs.bookmarks.getProject", "params":{...}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Events:   {"event":"ready",...} once at startup, then
//!           {"event":"bookmarkUpdate","update":{...}} after every change.
//!
//! Logs go to stderr so they never interleave with protocol output.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use obs_bookmarks::app::App;
use obs_bookmarks::managers::project_bookmarks::ProjectBookmarkManagerTrait;
use obs_bookmarks::rpc_handler::handle_method;
use obs_bookmarks::services::obs_client::OfflineFetcher;
use obs_bookmarks::services::settings_engine::{SettingsEngine, SettingsEngineTrait};

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = SettingsEngine::new(None);
    let load_result = settings.load();
    init_tracing(&settings.get_settings().logging.filter);
    if let Err(e) = load_result {
        warn!("falling back to default settings: {}", e);
    }
    info!("settings from {}", settings.get_config_path());

    let app = Arc::new(App::new(settings, Arc::new(OfflineFetcher))?);

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(msg) = out_rx.recv().await {
            let line = format!("{}\n", msg);
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let mut updates = app.bookmarks.subscribe();
    let event_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    let _ = event_tx.send(json!({"event": "bookmarkUpdate", "update": update}));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("dropped {} bookmark update(s)", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let _ = out_tx.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                error!("failed to read request: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let _ = out_tx.send(json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);
        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or(json!({}));

        let response = match handle_method(&app, method, &params).await {
            Ok(val) => json!({"id": id, "result": val}),
            Err(err) => json!({"id": id, "error": err}),
        };
        let _ = out_tx.send(response);
    }

    app.shutdown().await;
    forwarder.abort();
    drop(out_tx);
    let _ = writer.await;
    info!("stdin closed, exiting");
    Ok(())
}
