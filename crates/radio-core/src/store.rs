//! Flat key-value persistence for preferences, favorites and stats.
//!
//! Values are stored as text, the same way they are written by every
//! consumer (`"0.7"`, `"true"`, a JSON array...).  Consumers own parsing and
//! fall back to their defaults when a value is missing or malformed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Storage keys.
pub mod keys {
    pub const VOLUME: &str = "volume";
    pub const MUTED: &str = "muted";
    pub const THEME: &str = "theme";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const NOTIFICATION_PERMISSION: &str = "notification_permission";
    pub const FAVORITES: &str = "favorites";
    pub const STATS: &str = "stats";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage quota exceeded ({needed} of {quota} bytes)")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("storage device full: {0}")]
    StorageFull(#[source] std::io::Error),
    #[error("storage write failed: {0}")]
    Io(#[source] std::io::Error),
    #[error("storage encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            StoreError::QuotaExceeded { .. } | StoreError::StorageFull(_)
        )
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::StorageFull => StoreError::StorageFull(e),
            _ => StoreError::Io(e),
        }
    }
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

// ── File-backed store ─────────────────────────────────────────────────────────

/// JSON object on disk, rewritten on every `set`.
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`.  A missing, unreadable or malformed file
    /// starts empty; it is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load_entries(&path);
        debug!("store: opened {:?} ({} keys)", path, entries.len());
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_entries(path: &Path) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&content) {
            // Non-string values are kept as their JSON text
            Ok(raw) => raw
                .into_iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => (k, s),
                    other => (k, other.to_string()),
                })
                .collect(),
            Err(e) => {
                warn!("store: discarding malformed {:?}: {}", path, e);
                BTreeMap::new()
            }
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let previous = self.entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush() {
            // Keep memory and disk in agreement
            match previous {
                Some(v) => self.entries.insert(key.to_string(), v),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

// ── In-memory store ───────────────────────────────────────────────────────────

/// Process-local store with an optional byte quota over all keys and values.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(quota),
        }
    }

    fn size_with(&self, key: &str, value: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>()
            + key.len()
            + value.len()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(quota) = self.quota {
            let needed = self.size_with(key, value);
            if needed > quota {
                return Err(StoreError::QuotaExceeded { needed, quota });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
