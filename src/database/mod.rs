//! Global state database layer.
//!
//! Provides SQLite connection management and schema migrations. The
//! database backs [`crate::services::memento::SqliteMemento`].
//!
//! # Usage
//!
//! ```no_run
//! use obs_bookmarks::database::Database;
//!
//! let db = Database::open("state.db").expect("failed to open database");
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//! let conn = db.connection();
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
