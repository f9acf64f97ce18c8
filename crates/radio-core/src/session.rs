//! The widget's whole state, owned by the event loop.
//!
//! `Session` ties the poll results, the playback controller and the persisted
//! stores together.  It never performs IO other than writing to its store:
//! the caller fetches, plays and notifies, then feeds results in and shows
//! the returned `Notice`s.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::favorites::{Favorites, ToggleOutcome};
use crate::notify::{NotificationGate, Permission, ToggleStep, TrackNotification};
use crate::playback::{MediaEvent, PlaybackController, PlaybackSignal, PlaybackState, RetryPolicy};
use crate::prefs::{Preferences, Theme, Volume};
use crate::stats::{Stats, StatsTracker};
use crate::store::{KeyValueStore, StoreError};
use crate::track::{
    format_listen_time, HistoryEntry, ListenerCount, Track, NO_DATA, READY, STREAM_RUNNING,
    UNKNOWN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A short message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: NoticeKind::Success,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: NoticeKind::Error,
        }
    }
}

/// What the now-playing panel shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NowPlaying {
    /// No poll has completed yet.
    #[default]
    Pending,
    /// The last poll returned nothing usable.
    Unavailable,
    Track(Track),
}

impl NowPlaying {
    pub fn title(&self) -> &str {
        match self {
            NowPlaying::Pending => READY,
            NowPlaying::Unavailable => NO_DATA,
            NowPlaying::Track(t) => t.title_or_unknown(),
        }
    }

    pub fn artist(&self) -> &str {
        match self {
            NowPlaying::Pending => "",
            NowPlaying::Unavailable => STREAM_RUNNING,
            NowPlaying::Track(t) => t.artist_or_unknown(),
        }
    }

    pub fn track(&self) -> Option<&Track> {
        match self {
            NowPlaying::Track(t) => Some(t),
            _ => None,
        }
    }

    /// The favorites key, when the panel shows a real song.
    fn song_key(&self) -> Option<String> {
        let track = self.track()?;
        let title = track.title.as_deref()?;
        if title == UNKNOWN {
            return None;
        }
        Some(format!("{} - {}", track.artist_or_unknown(), title))
    }
}

/// Settings the session needs from `Config`.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub station_title: String,
    pub share_url: String,
    pub default_volume: f32,
    pub max_favorites: usize,
    pub stats_increment_secs: u64,
    pub retry: RetryPolicy,
    pub notifications_allowed: bool,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            station_title: config.station.title.clone(),
            share_url: config.station.share_url.clone(),
            default_volume: config.playback.default_volume,
            max_favorites: config.favorites.max,
            stats_increment_secs: config.stats.interval_secs,
            retry: RetryPolicy {
                max_attempts: config.playback.max_retries,
                delay: std::time::Duration::from_millis(config.playback.retry_delay_ms),
            },
            notifications_allowed: config.notifications.allowed,
        }
    }
}

/// Returned from `on_media_event` so the caller can drive timers.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaOutcome {
    pub signal: Option<PlaybackSignal>,
    pub notice: Option<Notice>,
}

pub struct Session<S: KeyValueStore> {
    store: S,
    settings: SessionSettings,
    prefs: Preferences,
    favorites: Favorites,
    stats: StatsTracker,
    notifications: NotificationGate,
    playback: PlaybackController,
    /// Idle after an explicit stop shows "Stopped" instead of "Ready".
    stopped: bool,
    buffering: bool,
    now_playing: NowPlaying,
    listeners: Option<ListenerCount>,
    history: Vec<HistoryEntry>,
}

impl<S: KeyValueStore> Session<S> {
    /// Restore everything persisted in `store`.
    pub fn load(store: S, settings: SessionSettings, notifier_supported: bool) -> Self {
        let prefs = Preferences::load(&store, settings.default_volume);
        let favorites = Favorites::load(&store, settings.max_favorites);
        let stats = StatsTracker::load(&store, settings.stats_increment_secs);
        let notifications = NotificationGate::load(
            &store,
            prefs.notifications,
            notifier_supported,
            settings.notifications_allowed,
        );
        info!(
            "session: {} favorites, {} songs, {}s listened, notifications {:?}",
            favorites.len(),
            stats.stats().songs,
            stats.stats().time,
            notifications.permission()
        );
        Self {
            playback: PlaybackController::new(settings.retry),
            store,
            settings,
            prefs,
            favorites,
            stats,
            notifications,
            stopped: false,
            buffering: false,
            now_playing: NowPlaying::Pending,
            listeners: None,
            history: Vec::new(),
        }
    }

    // ── Read access for rendering ─────────────────────────────────────────

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now_playing(&self) -> &NowPlaying {
        &self.now_playing
    }

    pub fn listeners(&self) -> Option<ListenerCount> {
        self.listeners
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn favorites(&self) -> &[String] {
        self.favorites.items()
    }

    pub fn is_favorited(&self) -> bool {
        self.now_playing
            .song_key()
            .is_some_and(|key| self.favorites.contains(&key))
    }

    pub fn stats(&self) -> &Stats {
        self.stats.stats()
    }

    pub fn listen_time_label(&self) -> String {
        format_listen_time(self.stats.stats().time)
    }

    pub fn volume(&self) -> Volume {
        self.prefs.volume
    }

    pub fn theme(&self) -> Theme {
        self.prefs.theme
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications.is_enabled()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn status_text(&self) -> &'static str {
        match self.playback.state() {
            PlaybackState::Loading => "Loading...",
            PlaybackState::Playing if self.buffering => "Loading...",
            PlaybackState::Playing => "Live",
            PlaybackState::Paused => "Paused",
            PlaybackState::Idle if self.stopped => "Stopped",
            PlaybackState::Idle | PlaybackState::Error => "Ready",
        }
    }

    // ── Poll results ──────────────────────────────────────────────────────

    /// Apply a `current_song` poll.  Returns the notification to raise when a
    /// new track was detected and notifications are on.
    pub fn apply_current_song(&mut self, fetched: Option<Track>) -> Option<TrackNotification> {
        let Some(track) = fetched else {
            self.now_playing = NowPlaying::Unavailable;
            return None;
        };

        let mut notification = None;
        if let Some(id) = &track.id {
            if self.stats.on_track_changed(id) {
                debug!("session: new track {} ({})", track.display_key(), id.as_str());
                self.persist_stats();
                if self.notifications.should_notify() {
                    notification = Some(TrackNotification::for_track(&track));
                }
            }
        }
        self.now_playing = NowPlaying::Track(track);
        notification
    }

    /// A failed listener poll keeps the previous count.
    pub fn apply_listeners(&mut self, fetched: Option<ListenerCount>) {
        if let Some(count) = fetched {
            self.listeners = Some(count);
        }
    }

    pub fn apply_history(&mut self, rows: Vec<HistoryEntry>) {
        self.history = rows;
    }

    // ── Playback ──────────────────────────────────────────────────────────

    /// Play/pause button.  `Some(generation)` means: tear down the player and
    /// load the stream under that generation.  `None` means playback was
    /// stopped and the player should be torn down.  A stream that is still
    /// loading or waiting on a retry is stopped too.
    pub fn toggle_play(&mut self, now: DateTime<Utc>) -> Option<u64> {
        if self.playback.is_active() {
            self.stop(now);
            None
        } else {
            Some(self.start(true))
        }
    }

    pub fn start(&mut self, user_initiated: bool) -> u64 {
        self.stopped = false;
        self.buffering = false;
        self.playback.begin_start(user_initiated)
    }

    /// Stop playback and close the listening session.  Also cancels a
    /// pending retry.
    pub fn stop(&mut self, now: DateTime<Utc>) {
        self.playback.stop();
        self.stopped = true;
        self.buffering = false;
        if self.stats.on_playback_stop(now) {
            self.persist_stats();
        }
    }

    /// True when a scheduled retry should actually restart the stream.
    pub fn retry_due(&self, generation: u64) -> bool {
        self.playback.retry_due(generation)
    }

    pub fn on_media_event(
        &mut self,
        generation: u64,
        event: MediaEvent,
        now: DateTime<Utc>,
    ) -> MediaOutcome {
        let signal = self.playback.on_media_event(generation, event);
        let notice = match &signal {
            Some(PlaybackSignal::Started) => {
                self.buffering = false;
                if self.stats.on_playback_start(now) {
                    self.persist_stats();
                }
                None
            }
            Some(PlaybackSignal::Halted) => {
                self.buffering = false;
                if self.stats.on_playback_stop(now) {
                    self.persist_stats();
                }
                None
            }
            Some(PlaybackSignal::Buffering) => {
                self.buffering = true;
                None
            }
            Some(PlaybackSignal::RetryScheduled {
                attempt,
                max_attempts,
                ..
            }) => {
                self.close_session_after_error(now);
                Some(Notice::error(format!(
                    "Connection error. Attempt {}/{}...",
                    attempt, max_attempts
                )))
            }
            Some(PlaybackSignal::GaveUp) => {
                self.close_session_after_error(now);
                Some(Notice::error("Press play again"))
            }
            None => None,
        };
        MediaOutcome { signal, notice }
    }

    fn close_session_after_error(&mut self, now: DateTime<Utc>) {
        self.buffering = false;
        if self.stats.on_playback_stop(now) {
            self.persist_stats();
        }
    }

    /// Periodic stats tick; only counts while audio is flowing.
    pub fn stats_tick(&mut self, now: DateTime<Utc>) {
        if self.playback.is_playing() && self.stats.tick(now) {
            self.persist_stats();
        }
    }

    // ── Volume ────────────────────────────────────────────────────────────

    pub fn set_volume_percent(&mut self, percent: i32) -> Volume {
        self.prefs.volume.set_percent(percent);
        if let Err(e) = self.prefs.save_volume(&mut self.store) {
            warn!("session: saving volume: {}", e);
        }
        self.prefs.volume
    }

    pub fn step_volume(&mut self, delta: i32) -> Volume {
        let target = self.prefs.volume.percent() as i32 + delta;
        self.set_volume_percent(target)
    }

    pub fn toggle_mute(&mut self) -> Volume {
        self.prefs.volume.toggle_mute();
        if let Err(e) = self.prefs.save_muted(&mut self.store) {
            warn!("session: saving mute: {}", e);
        }
        self.prefs.volume
    }

    // ── Theme ─────────────────────────────────────────────────────────────

    pub fn toggle_theme(&mut self) -> Theme {
        self.prefs.theme = self.prefs.theme.toggled();
        if let Err(e) = self.prefs.save_theme(&mut self.store) {
            warn!("session: saving theme: {}", e);
        }
        self.prefs.theme
    }

    // ── Notifications ─────────────────────────────────────────────────────

    /// Notification button.  On `NeedsPermission` the caller runs the
    /// interactive request and reports back via `finish_notification_request`.
    pub fn toggle_notifications(&mut self) -> (ToggleStep, Option<Notice>) {
        let step = self.notifications.toggle();
        let notice = self.notification_notice(step);
        if matches!(step, ToggleStep::Enabled | ToggleStep::Disabled) {
            self.persist_notifications_flag();
        }
        (step, notice)
    }

    pub fn finish_notification_request(&mut self, granted: bool) -> Option<Notice> {
        let step = match self.notifications.finish_request(granted, &mut self.store) {
            Ok(step) => step,
            Err(e) => {
                warn!("session: remembering notification permission: {}", e);
                if granted {
                    ToggleStep::Enabled
                } else {
                    ToggleStep::Declined
                }
            }
        };
        if step == ToggleStep::Enabled {
            self.persist_notifications_flag();
        }
        self.notification_notice(step)
    }

    pub fn notification_permission(&self) -> Permission {
        self.notifications.permission()
    }

    fn persist_notifications_flag(&mut self) {
        self.prefs.notifications = self.notifications.is_enabled();
        if let Err(e) = self.prefs.save_notifications(&mut self.store) {
            warn!("session: saving notifications flag: {}", e);
        }
    }

    fn notification_notice(&self, step: ToggleStep) -> Option<Notice> {
        match step {
            ToggleStep::Enabled => Some(Notice::success("Notifications on")),
            ToggleStep::Disabled => Some(Notice::success("Notifications off")),
            ToggleStep::Blocked => Some(Notice::error("Notifications blocked")),
            ToggleStep::Unsupported => Some(Notice::error("Notifications not supported")),
            ToggleStep::Declined => Some(Notice::error("Notifications declined")),
            ToggleStep::NeedsPermission => None,
        }
    }

    // ── Favorites ─────────────────────────────────────────────────────────

    pub fn toggle_favorite(&mut self) -> Notice {
        let Some(key) = self.now_playing.song_key() else {
            return Notice::error("No song available");
        };
        let notice = match self.favorites.toggle(&key) {
            ToggleOutcome::Added => Notice::success("Favorite saved ❤"),
            ToggleOutcome::Removed => Notice::success("Favorite removed"),
            ToggleOutcome::Full => {
                return Notice::error(format!("Max. {} favorites", self.favorites.max()))
            }
        };
        self.persist_favorites().unwrap_or(notice)
    }

    /// Remove by list position; out-of-range indexes are ignored.
    pub fn remove_favorite(&mut self, index: usize) -> Option<Notice> {
        let removed = self.favorites.remove(index)?;
        debug!("session: removed favorite {:?}", removed);
        Some(
            self.persist_favorites()
                .unwrap_or_else(|| Notice::success("Favorite removed")),
        )
    }

    /// `Some(notice)` when the write failed.
    fn persist_favorites(&mut self) -> Option<Notice> {
        match self.favorites.save(&mut self.store) {
            Ok(()) => None,
            Err(e) => {
                warn!("session: saving favorites: {}", e);
                Some(favorites_write_notice(&e))
            }
        }
    }

    // ── Share ─────────────────────────────────────────────────────────────

    /// Clipboard text for the current song.
    pub fn share_text(&self) -> Result<String, Notice> {
        let track = self
            .now_playing
            .track()
            .filter(|_| self.now_playing.song_key().is_some())
            .ok_or_else(|| Notice::error("No song available"))?;
        Ok(format!(
            "🎵 {} - {}\n\n🎧 {}: {}",
            track.artist_or_unknown(),
            track.title_or_unknown(),
            self.settings.station_title,
            self.settings.share_url
        ))
    }

    fn persist_stats(&mut self) {
        if let Err(e) = self.stats.save(&mut self.store) {
            warn!("session: saving stats: {}", e);
        }
    }
}

fn favorites_write_notice(e: &StoreError) -> Notice {
    if e.is_quota() {
        Notice::error("Storage full - favorites could not be saved")
    } else {
        Notice::error("Favorites could not be saved")
    }
}
