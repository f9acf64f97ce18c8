use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub favorites: FavoritesConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// The station whose API is polled and whose stream is played.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Station slug used in API paths (`/station/<name>/...`).
    #[serde(default = "default_station_name")]
    pub name: String,
    /// Human-readable title, used in the header and share text.
    #[serde(default = "default_station_title")]
    pub title: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    /// Public page linked from shared messages.
    #[serde(default = "default_share_url")]
    pub share_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Current song + history cycle.
    #[serde(default = "default_song_interval_ms")]
    pub song_interval_ms: u64,
    /// Listener count cycle.
    #[serde(default = "default_listener_interval_ms")]
    pub listener_interval_ms: u64,
    /// Per-request bound after which the request is abandoned.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoritesConfig {
    #[serde(default = "default_max_favorites")]
    pub max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// When false the desktop permission is treated as denied.
    #[serde(default = "default_notifications_allowed")]
    pub allowed: bool,
}

/// User-configurable paths for persisted data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Flat key-value file holding preferences, favorites and stats.
    /// Defaults to `~/.local/share/radio-widget/storage.json`.
    #[serde(default = "default_store_file")]
    pub store_file: PathBuf,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            name: default_station_name(),
            title: default_station_title(),
            api_base: default_api_base(),
            stream_url: default_stream_url(),
            share_url: default_share_url(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            song_interval_ms: default_song_interval_ms(),
            listener_interval_ms: default_listener_interval_ms(),
            timeout_ms: default_timeout_ms(),
            max_history: default_max_history(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_stats_interval_secs(),
        }
    }
}

impl Default for FavoritesConfig {
    fn default() -> Self {
        Self {
            max: default_max_favorites(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            allowed: default_notifications_allowed(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            store_file: default_store_file(),
        }
    }
}

fn default_station_name() -> String {
    "madgamesfm".to_string()
}

fn default_station_title() -> String {
    "MadGames FM".to_string()
}

fn default_api_base() -> String {
    "https://api.laut.fm".to_string()
}

fn default_stream_url() -> String {
    "https://stream.laut.fm/madgamesfm".to_string()
}

fn default_share_url() -> String {
    "https://laut.fm/madgamesfm".to_string()
}

fn default_song_interval_ms() -> u64 {
    5000
}

fn default_listener_interval_ms() -> u64 {
    3000
}

fn default_timeout_ms() -> u64 {
    8000
}

fn default_max_history() -> usize {
    10
}

fn default_volume() -> f32 {
    0.7
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_stats_interval_secs() -> u64 {
    60
}

fn default_max_favorites() -> usize {
    50
}

fn default_notifications_allowed() -> bool {
    true
}

fn default_store_file() -> PathBuf {
    platform::data_dir().join("storage.json")
}

impl PollingConfig {
    pub fn song_interval(&self) -> Duration {
        Duration::from_millis(self.song_interval_ms.max(1))
    }

    pub fn listener_interval(&self) -> Duration {
        Duration::from_millis(self.listener_interval_ms.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl StatsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            station: StationConfig::default(),
            polling: PollingConfig::default(),
            playback: PlaybackConfig::default(),
            stats: StatsConfig::default(),
            favorites: FavoritesConfig::default(),
            notifications: NotificationsConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.station.api_base, "https://api.laut.fm");
        assert!(config.station.stream_url.starts_with("https://"));
        assert_eq!(config.polling.song_interval_ms, 5000);
        assert_eq!(config.polling.listener_interval_ms, 3000);
        assert_eq!(config.polling.timeout_ms, 8000);
        assert_eq!(config.playback.max_retries, 3);
        assert_eq!(config.stats.interval_secs, 60);
        assert_eq!(config.favorites.max, 50);
        assert!(config
            .paths
            .store_file
            .ends_with("radio-widget/storage.json"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
            [station]
            name = "jazz"
            stream_url = "https://stream.example/jazz"

            [favorites]
            max = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.station.name, "jazz");
        assert_eq!(config.station.api_base, "https://api.laut.fm");
        assert_eq!(config.favorites.max, 5);
        assert_eq!(config.polling.max_history, 10);
    }
}
