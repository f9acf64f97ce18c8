//! Listening stats: distinct songs seen and cumulative listening time.
//!
//! Time is accumulated coarsely: a periodic tick while playing adds a fixed
//! increment and rebases the session start, and stopping folds whatever has
//! elapsed since the last rebase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::store::{keys, KeyValueStore, StoreError};
use crate::track::TrackId;

/// Persisted shape; field names match the stored JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub songs: u64,
    /// Cumulative listening seconds.
    pub time: u64,
    /// Unix millis of the active session start.
    #[serde(rename = "sessionStart")]
    pub session_start: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct StatsTracker {
    stats: Stats,
    last_song_id: Option<TrackId>,
    tick_increment_secs: u64,
}

impl StatsTracker {
    pub fn new(tick_increment_secs: u64) -> Self {
        Self {
            stats: Stats::default(),
            last_song_id: None,
            tick_increment_secs,
        }
    }

    /// Load persisted stats.  Unparsable counters fall back to zero and a
    /// malformed value is discarded entirely.  A session start left behind by
    /// an unclean exit is dropped rather than counted.
    pub fn load(store: &impl KeyValueStore, tick_increment_secs: u64) -> Self {
        let mut tracker = Self::new(tick_increment_secs);
        let Some(raw) = store.get(keys::STATS) else {
            return tracker;
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) if value.is_object() => {
                tracker.stats.songs = lenient_u64(value.get("songs"));
                tracker.stats.time = lenient_u64(value.get("time"));
                if value.get("sessionStart").is_some_and(|v| !v.is_null()) {
                    warn!("stats: dropping stale session start");
                }
            }
            Ok(_) => warn!("stats: stored value is not an object, discarding"),
            Err(e) => warn!("stats: discarding malformed stored value: {}", e),
        }
        tracker
    }

    pub fn save(&self, store: &mut impl KeyValueStore) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.stats)?;
        store.set(keys::STATS, &json)
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn is_recording(&self) -> bool {
        self.stats.session_start.is_some()
    }

    /// Count a song the first time its id is seen.  Returns true when counted.
    pub fn on_track_changed(&mut self, id: &TrackId) -> bool {
        if self.last_song_id.as_ref() == Some(id) {
            return false;
        }
        self.last_song_id = Some(id.clone());
        self.stats.songs += 1;
        true
    }

    /// Returns true when a new session was started.
    pub fn on_playback_start(&mut self, now: DateTime<Utc>) -> bool {
        if self.stats.session_start.is_some() {
            return false;
        }
        self.stats.session_start = Some(now.timestamp_millis());
        true
    }

    /// Fold the elapsed session into `time`.  Returns true when a session was open.
    pub fn on_playback_stop(&mut self, now: DateTime<Utc>) -> bool {
        let Some(start) = self.stats.session_start.take() else {
            return false;
        };
        let elapsed_ms = (now.timestamp_millis() - start).max(0);
        self.stats.time += (elapsed_ms / 1000) as u64;
        true
    }

    /// Periodic tick while playing.  Returns true when time was added.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if self.stats.session_start.is_none() {
            return false;
        }
        self.stats.time += self.tick_increment_secs;
        self.stats.session_start = Some(now.timestamp_millis());
        true
    }
}

fn lenient_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_song_counted_once_per_id() {
        let mut tracker = StatsTracker::new(60);
        let five = TrackId::new("5");
        assert!(tracker.on_track_changed(&five));
        assert!(!tracker.on_track_changed(&five));
        assert!(!tracker.on_track_changed(&five));
        assert_eq!(tracker.stats().songs, 1);

        assert!(tracker.on_track_changed(&TrackId::new("6")));
        assert_eq!(tracker.stats().songs, 2);
    }

    #[test]
    fn test_stop_folds_elapsed_time() {
        let mut tracker = StatsTracker::new(60);
        tracker.stats.time = 100;
        assert!(tracker.on_playback_start(t0()));
        // second start keeps the original session start
        assert!(!tracker.on_playback_start(t0() + Duration::seconds(30)));

        assert!(tracker.on_playback_stop(t0() + Duration::milliseconds(95_900)));
        assert_eq!(tracker.stats().time, 195);
        assert_eq!(tracker.stats().session_start, None);
        assert!(!tracker.on_playback_stop(t0() + Duration::seconds(200)));
        assert_eq!(tracker.stats().time, 195);
    }

    #[test]
    fn test_tick_adds_increment_and_rebases() {
        let mut tracker = StatsTracker::new(60);
        assert!(!tracker.tick(t0()));

        tracker.on_playback_start(t0());
        let tick_at = t0() + Duration::seconds(61);
        assert!(tracker.tick(tick_at));
        assert_eq!(tracker.stats().time, 60);
        assert_eq!(
            tracker.stats().session_start,
            Some(tick_at.timestamp_millis())
        );

        tracker.on_playback_stop(tick_at + Duration::seconds(10));
        assert_eq!(tracker.stats().time, 70);
    }

    #[test]
    fn test_load_lenient_and_malformed() {
        let mut store = MemoryStore::new();
        store
            .set(keys::STATS, r#"{"songs": "12", "time": 3600.7, "sessionStart": 1700000000000}"#)
            .unwrap();
        let tracker = StatsTracker::load(&store, 60);
        assert_eq!(tracker.stats().songs, 12);
        assert_eq!(tracker.stats().time, 3600);
        assert_eq!(tracker.stats().session_start, None);

        store.set(keys::STATS, "{{nope").unwrap();
        assert_eq!(StatsTracker::load(&store, 60).stats(), &Stats::default());

        store.set(keys::STATS, "[1,2]").unwrap();
        assert_eq!(StatsTracker::load(&store, 60).stats(), &Stats::default());
    }

    #[test]
    fn test_save_uses_stored_field_names() {
        let mut store = MemoryStore::new();
        let mut tracker = StatsTracker::new(60);
        tracker.on_track_changed(&TrackId::new("1"));
        tracker.on_playback_start(t0());
        tracker.save(&mut store).unwrap();

        let raw: Value = serde_json::from_str(&store.get(keys::STATS).unwrap()).unwrap();
        assert_eq!(raw["songs"], 1);
        assert_eq!(raw["time"], 0);
        assert_eq!(raw["sessionStart"], t0().timestamp_millis());
    }
}
