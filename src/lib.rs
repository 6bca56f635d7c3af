//! obs-bookmarks: bookmarks for Open Build Service projects and packages,
//! backed by an on-disk metadata cache.
//!
//! This library crate exposes all modules for use by the binary and integration tests.

pub mod app;
pub mod database;
pub mod managers;
pub mod platform;
pub mod services;
pub mod rpc_handler;
pub mod types;
