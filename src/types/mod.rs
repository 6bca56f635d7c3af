// Shared type definitions
// Each submodule defines types used across the cache, the bookmark manager and the command layer.

pub mod bookmark;
pub mod errors;
pub mod obs;
pub mod settings;
