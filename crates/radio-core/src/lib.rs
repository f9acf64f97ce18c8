pub mod api;
pub mod config;
pub mod favorites;
pub mod notify;
pub mod platform;
pub mod playback;
pub mod prefs;
pub mod session;
pub mod stats;
pub mod store;
pub mod track;
