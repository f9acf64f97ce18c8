//! Track, history and listener models, parsed leniently from station API JSON.
//!
//! The API shapes are an external contract; missing or mistyped fields never
//! fail a parse, they surface as placeholders in the display helpers.

use chrono::{DateTime, FixedOffset, Local};
use serde_json::Value;

/// Shown when a field is missing from an otherwise valid response.
pub const UNKNOWN: &str = "Unknown";
/// Title shown when the current song could not be fetched.
pub const NO_DATA: &str = "No data";
/// Artist line shown alongside [`NO_DATA`].
pub const STREAM_RUNNING: &str = "Stream running";
/// Title shown before the first poll completes.
pub const READY: &str = "Ready...";
/// Time shown for history rows whose timestamp does not parse.
pub const NO_TIME: &str = "--:--";

/// Opaque track identifier.  The API may send a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Falsy ids (`0`, `""`, `false`, `null`) don't identify a track.
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(Self(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub id: Option<TrackId>,
    pub title: Option<String>,
    pub artist_name: Option<String>,
    pub artist_image_url: Option<String>,
    pub started_at: Option<DateTime<FixedOffset>>,
}

impl Track {
    /// Build a track from one song object (`current_song` or a `last_songs` row).
    pub fn from_json(value: &Value) -> Self {
        let artist = value.get("artist");
        Self {
            id: value.get("id").and_then(TrackId::from_json),
            title: non_empty_str(value.get("title")),
            artist_name: artist.and_then(|a| non_empty_str(a.get("name"))),
            artist_image_url: artist.and_then(|a| non_empty_str(a.get("image"))),
            started_at: value
                .get("started_at")
                .and_then(Value::as_str)
                .and_then(parse_timestamp),
        }
    }

    pub fn title_or_unknown(&self) -> &str {
        self.title.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn artist_or_unknown(&self) -> &str {
        self.artist_name.as_deref().unwrap_or(UNKNOWN)
    }

    /// `"<artist> - <title>"`, the favorites key and the history label.
    pub fn display_key(&self) -> String {
        format!("{} - {}", self.artist_or_unknown(), self.title_or_unknown())
    }

    /// Local `HH:MM` of `started_at`.
    pub fn start_time_label(&self) -> Option<String> {
        self.started_at
            .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// RFC 3339 or the laut.fm form `2024-03-01 18:04:11 +0100`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z"))
        .ok()
}

// ── History ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// `HH:MM` or [`NO_TIME`].
    pub time: String,
    /// `"<artist> - <title>"`.
    pub label: String,
}

impl HistoryEntry {
    pub fn from_track(track: &Track) -> Self {
        Self {
            time: track
                .start_time_label()
                .unwrap_or_else(|| NO_TIME.to_string()),
            label: track.display_key(),
        }
    }
}

/// Parse a `last_songs` response into at most `max` rows, newest first as sent.
/// Non-arrays yield no rows.
pub fn parse_history(value: &Value, max: usize) -> Vec<HistoryEntry> {
    value
        .as_array()
        .map(|songs| {
            songs
                .iter()
                .filter(|s| s.is_object())
                .take(max)
                .map(|s| HistoryEntry::from_track(&Track::from_json(s)))
                .collect()
        })
        .unwrap_or_default()
}

// ── Listeners ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerCount {
    Known(u64),
    /// A response arrived but carried no usable count.
    Unknown,
}

impl ListenerCount {
    /// Both `{"listeners": n}` and `{"current": n}` are in use.
    pub fn from_json(value: &Value) -> Self {
        value
            .get("listeners")
            .and_then(as_count)
            .or_else(|| value.get("current").and_then(as_count))
            .map(ListenerCount::Known)
            .unwrap_or(ListenerCount::Unknown)
    }

    pub fn label(&self) -> String {
        match self {
            ListenerCount::Known(n) => format!("{} Live", n),
            ListenerCount::Unknown => "? Live".to_string(),
        }
    }
}

fn as_count(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

/// Listening time as shown in the stats row: `"2h 5m"` or `"42min"`.
pub fn format_listen_time(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    if h > 0 {
        format!("{}h {}m", h, m)
    } else {
        format!("{}min", m)
    }
}
