//! Station API client.
//!
//! Every fetch is a soft operation: a timeout, transport error, non-2xx
//! status or undecodable body is logged and reported as `None`.  Callers show
//! a placeholder and wait for the next scheduled poll.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::{PollingConfig, StationConfig};
use crate::track::{parse_history, HistoryEntry, ListenerCount, Track};

pub const CURRENT_SONG_PATH: &str = "/current_song";
pub const LISTENERS_PATH: &str = "/listeners";
pub const LAST_SONGS_PATH: &str = "/last_songs";

/// Larger artwork is not cached.
pub const MAX_COVER_BYTES: usize = 2 * 1024 * 1024;
/// Covers kept in the cache dir; the oldest are removed past this.
pub const MAX_CACHED_COVERS: usize = 32;

const COVER_PREFIX: &str = "cover-";
const COVER_NAME_MAX: usize = 120;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {path} timed out after {timeout:?}")]
    Timeout { path: String, timeout: Duration },
    #[error("{path} returned status {status}")]
    Status {
        path: String,
        status: reqwest::StatusCode,
    },
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Clone)]
pub struct StationApi {
    client: reqwest::Client,
    station_base: String,
    timeout: Duration,
    max_history: usize,
}

impl StationApi {
    pub fn new(station: &StationConfig, polling: &PollingConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("radio-widget/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            station_base: format!(
                "{}/station/{}",
                station.api_base.trim_end_matches('/'),
                station.name
            ),
            timeout: polling.timeout(),
            max_history: polling.max_history,
        })
    }

    pub fn station_base(&self) -> &str {
        &self.station_base
    }

    /// GET `<base>/station/<name><path>` as JSON.
    pub async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.station_base, path);
        debug!("api: GET {}", url);

        let request = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .send();

        let transport = |source: reqwest::Error| ApiError::Transport {
            path: path.to_string(),
            source,
        };

        // The deadline covers headers and body alike
        let fetch = async {
            let response = request.await.map_err(transport)?;
            let status = response.status();
            if !status.is_success() {
                return Err(ApiError::Status {
                    path: path.to_string(),
                    status,
                });
            }
            response.json::<Value>().await.map_err(transport)
        };

        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout {
                path: path.to_string(),
                timeout: self.timeout,
            }),
        }
    }

    async fn get_soft(&self, path: &str) -> Option<Value> {
        match self.get_json(path).await {
            Ok(v) => Some(v),
            Err(e @ ApiError::Transport { .. }) => {
                error!("api: {}", e);
                None
            }
            Err(e) => {
                warn!("api: {}", e);
                None
            }
        }
    }

    /// `None` when no data could be fetched.
    pub async fn fetch_current_track(&self) -> Option<Track> {
        let value = self.get_soft(CURRENT_SONG_PATH).await?;
        if !value.is_object() {
            warn!("api: unexpected current_song payload: {}", value);
            return None;
        }
        Some(Track::from_json(&value))
    }

    /// `None` when no data could be fetched; `Some(Unknown)` for an
    /// unrecognised response shape.
    pub async fn fetch_listener_count(&self) -> Option<ListenerCount> {
        let value = self.get_soft(LISTENERS_PATH).await?;
        let count = ListenerCount::from_json(&value);
        if count == ListenerCount::Unknown {
            warn!("api: unexpected listeners payload: {}", value);
        }
        Some(count)
    }

    /// Empty when nothing could be fetched or the station sent no rows.
    pub async fn fetch_history(&self) -> Vec<HistoryEntry> {
        match self.get_soft(LAST_SONGS_PATH).await {
            Some(value) => parse_history(&value, self.max_history),
            None => Vec::new(),
        }
    }

    /// Download artwork into `cache_dir` once, returning the local path.
    /// Used for notification icons; any failure yields `None`.
    pub async fn fetch_cover(&self, url: &str, cache_dir: PathBuf) -> Option<PathBuf> {
        let path = cache_dir.join(cover_file_name(url));
        if tokio::fs::metadata(&path).await.is_ok() {
            return Some(path);
        }

        let fetch = async {
            let mut response = self.client.get(url).send().await.ok()?;
            if !response.status().is_success() {
                return None;
            }
            if response
                .content_length()
                .is_some_and(|len| len > MAX_COVER_BYTES as u64)
            {
                debug!("api: cover {} too large", url);
                return None;
            }
            let mut bytes = Vec::new();
            while let Some(chunk) = response.chunk().await.ok()? {
                if bytes.len() + chunk.len() > MAX_COVER_BYTES {
                    debug!("api: cover {} exceeds {} bytes", url, MAX_COVER_BYTES);
                    return None;
                }
                bytes.extend_from_slice(&chunk);
            }
            Some(bytes)
        };
        let bytes = tokio::time::timeout(self.timeout, fetch).await.ok()??;

        if let Err(e) = tokio::fs::create_dir_all(&cache_dir).await {
            debug!("api: cover cache dir {:?}: {}", cache_dir, e);
            return None;
        }
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            debug!("api: cover write {:?}: {}", path, e);
            return None;
        }
        prune_covers(&cache_dir, MAX_CACHED_COVERS, &path).await;
        Some(path)
    }
}

/// Cache file name derived from the URL text alone, so it stays the same
/// across runs and builds.  Long URLs keep their tail.
pub fn cover_file_name(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let sanitized: String = rest
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    // ASCII only, so any byte offset is a char boundary
    let tail = &sanitized[sanitized.len().saturating_sub(COVER_NAME_MAX)..];
    format!("{}{}", COVER_PREFIX, tail)
}

/// Remove the oldest cached covers beyond `keep`, never touching `current`.
async fn prune_covers(cache_dir: &Path, keep: usize, current: &Path) {
    let Ok(mut dir) = tokio::fs::read_dir(cache_dir).await else {
        return;
    };
    let mut covers = Vec::new();
    while let Ok(Some(entry)) = dir.next_entry().await {
        let path = entry.path();
        if path == current || !entry.file_name().to_string_lossy().starts_with(COVER_PREFIX) {
            continue;
        }
        if let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) {
            covers.push((modified, path));
        }
    }
    // `current` takes one of the slots
    let keep = keep.saturating_sub(1);
    if covers.len() <= keep {
        return;
    }
    covers.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, path) in covers.into_iter().skip(keep) {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("api: pruned cover {:?}", path),
            Err(e) => debug!("api: prune {:?}: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_file_name_is_stable_and_safe() {
        let name = cover_file_name("https://img.test/artists/band.jpg?size=300");
        assert_eq!(name, "cover-img.test_artists_band.jpg_size_300");
        assert_ne!(name, cover_file_name("https://img.test/artists/band.jpg?size=600"));

        let long = format!("https://img.test/{}/x.png", "a".repeat(500));
        let name = cover_file_name(&long);
        assert_eq!(name.len(), COVER_PREFIX.len() + COVER_NAME_MAX);
        assert!(name.ends_with("_x.png"));
        assert!(!name.contains('/'));
    }
}
