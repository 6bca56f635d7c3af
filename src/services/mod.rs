// obs-bookmarks services
// Services provide the metadata cache, the OBS fetch seam, global state storage and settings.

pub mod memento;
pub mod metadata_cache;
pub mod obs_client;
pub mod settings_engine;
