// obs-bookmarks state managers
// Managers own stateful bookmark operations on top of the services.

pub mod project_bookmarks;
