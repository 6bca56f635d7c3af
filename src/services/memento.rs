//! Persisted key-value settings store.
//!
//! `Memento` is the get/update contract the bookmark manager persists its
//! bookmark list through. `SqliteMemento` keeps one JSON document per key in
//! the global state database; `InMemoryMemento` is a volatile stand-in.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::params;
use serde_json::Value;
use tracing::warn;

use crate::database::connection::Database;
use crate::types::errors::MementoError;

/// Key-value store that survives restarts.
#[async_trait]
pub trait Memento: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;
    /// Replaces the value stored under `key`.
    async fn update(&self, key: &str, value: Value) -> Result<(), MementoError>;
}

/// Memento backed by the `global_state` table.
pub struct SqliteMemento {
    db: Mutex<Database>,
}

impl SqliteMemento {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }
}

#[async_trait]
impl Memento for SqliteMemento {
    fn get(&self, key: &str) -> Option<Value> {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(e) => {
                warn!("global state lock poisoned while reading {}: {}", key, e);
                return None;
            }
        };
        let raw: String = db
            .connection()
            .query_row(
                "SELECT value FROM global_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("discarding unparsable global state under {}: {}", key, e);
                None
            }
        }
    }

    async fn update(&self, key: &str, value: Value) -> Result<(), MementoError> {
        let raw = serde_json::to_string(&value)
            .map_err(|e| MementoError::Serialization(e.to_string()))?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        let db = self
            .db
            .lock()
            .map_err(|e| MementoError::Lock(e.to_string()))?;
        db.connection()
            .execute(
                "INSERT OR REPLACE INTO global_state (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, raw, now],
            )
            .map_err(|e| MementoError::Database(e.to_string()))?;
        Ok(())
    }
}

/// Memento that lives only as long as the process.
#[derive(Default)]
pub struct InMemoryMemento {
    values: RwLock<HashMap<String, Value>>,
}

impl InMemoryMemento {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Memento for InMemoryMemento {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().ok()?.get(key).cloned()
    }

    async fn update(&self, key: &str, value: Value) -> Result<(), MementoError> {
        self.values
            .write()
            .map_err(|e| MementoError::Lock(e.to_string()))?
            .insert(key.to_string(), value);
        Ok(())
    }
}
