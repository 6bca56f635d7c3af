//! Unit tests for the global state database layer (connection + migrations).

use obs_bookmarks::database::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use obs_bookmarks::database::Database;

#[test]
fn test_open_in_memory_succeeds() {
    let db = Database::open_in_memory();
    assert!(db.is_ok(), "open_in_memory should succeed");
}

#[test]
fn test_migrations_create_global_state_table() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    for table in ["schema_version", "global_state"] {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .unwrap_or(false);
        assert!(exists, "Table '{}' should exist after migrations", table);
    }
}

#[test]
fn test_schema_version_is_current() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_reopening_file_database_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let db = Database::open(&path).unwrap();
        db.connection()
            .execute(
                "INSERT INTO global_state (key, value, updated_at) VALUES ('k', '[1,2]', 0)",
                [],
            )
            .unwrap();
    }

    let db = Database::open(&path).unwrap();
    let value: String = db
        .connection()
        .query_row("SELECT value FROM global_state WHERE key = 'k'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(value, "[1,2]");
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_global_state_key_is_unique() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.connection();
    conn.execute(
        "INSERT INTO global_state (key, value, updated_at) VALUES ('k', '1', 0)",
        [],
    )
    .unwrap();
    let dup = conn.execute(
        "INSERT INTO global_state (key, value, updated_at) VALUES ('k', '2', 0)",
        [],
    );
    assert!(dup.is_err(), "duplicate keys must be rejected");
}
