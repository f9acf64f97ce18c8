use std::io;
use std::time::Duration;

use chrono::Utc;
use ratatui::{
    backend::CrosstermBackend,
    crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    },
    layout::{Constraint, Direction, Layout},
    widgets::Block,
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use radio_core::api::StationApi;
use radio_core::config::Config;
use radio_core::notify::{DesktopNotifier, ToggleStep, TrackNotification};
use radio_core::playback::{MediaEvent, PlaybackSignal};
use radio_core::platform;
use radio_core::session::{Session, SessionSettings};
use radio_core::store::FileStore;
use radio_core::track::{HistoryEntry, ListenerCount, Track};

use crate::action::{action_for_key, Action};
use crate::components::favorites::FavoritesPanel;
use crate::components::{header, help_overlay, history, now_playing};
use crate::player::PlayerHandle;
use crate::theme;
use crate::widgets::status_bar;
use crate::widgets::toast::ToastManager;

/// Messages posted into the main loop by background tasks.
#[derive(Debug)]
enum AppMessage {
    Event(Event),
    CurrentSong(Option<Track>),
    Listeners(Option<ListenerCount>),
    History(Vec<HistoryEntry>),
    /// A scheduled reconnect for the given generation is due.
    RetryDue(u64),
    /// Answer to the notification permission probe.
    PermissionAnswer(bool),
}

pub struct App {
    config: Config,
    session: Session<FileStore>,
    api: StationApi,
    notifier: DesktopNotifier,
    player: PlayerHandle,
    /// Media events from the player task, tagged with their generation.
    media_rx: mpsc::Receiver<(u64, MediaEvent)>,
    toast: ToastManager,
    favorites_panel: FavoritesPanel,
    show_help: bool,
    should_quit: bool,
    /// Listen-time ticker; only armed while audio is flowing.
    stats_timer: Option<Interval>,
    retry_task: Option<AbortHandle>,
    tx: Option<mpsc::Sender<AppMessage>>,
}

impl App {
    pub fn new(config: Config, store: FileStore) -> anyhow::Result<Self> {
        let api = StationApi::new(&config.station, &config.polling)?;
        let notifier = DesktopNotifier::new(config.station.title.clone());
        let session = Session::load(
            store,
            SessionSettings::from_config(&config),
            notifier.is_supported(),
        );
        let (media_tx, media_rx) = mpsc::channel::<(u64, MediaEvent)>(64);
        let mut favorites_panel = FavoritesPanel::new();
        favorites_panel.sync(session.favorites().len());

        Ok(Self {
            config,
            session,
            api,
            notifier,
            player: PlayerHandle::spawn(media_tx),
            media_rx,
            toast: ToastManager::new(),
            favorites_panel,
            show_help: false,
            should_quit: false,
            stats_timer: None,
            retry_task: None,
            tx: None,
        })
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(256);
        self.tx = Some(tx.clone());

        if platform::find_mpv_binary().is_none() {
            self.toast.error("mpv not found - playback unavailable");
        }

        // ── Background task: keyboard events ──────────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Periodic timers ───────────────────────────────────────────────────
        let mut song_poll = tokio::time::interval(self.config.polling.song_interval());
        song_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut listener_poll = tokio::time::interval(self.config.polling.listener_interval());
        listener_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    needs_redraw = self.handle_message(msg);
                }

                Some((generation, media)) = self.media_rx.recv() => {
                    self.apply_media_event(generation, media);
                    needs_redraw = true;
                }

                _ = song_poll.tick() => {
                    self.spawn_song_poll();
                }

                _ = listener_poll.tick() => {
                    self.spawn_listener_poll();
                }

                _ = tick_armed(&mut self.stats_timer) => {
                    self.session.stats_tick(Utc::now());
                    needs_redraw = true;
                }

                _ = toast_tick.tick() => {
                    needs_redraw = self.toast.tick();
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        self.cancel_retry();
        self.session.stop(Utc::now());
        self.player.shutdown().await;
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        info!("nowplaying exiting");

        Ok(())
    }

    /// Returns whether the screen needs a redraw.
    fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    return false;
                }
                let Some(action) = action_for_key(key) else {
                    return false;
                };
                if self.show_help && (action != Action::Quit || key.code == KeyCode::Esc) {
                    self.show_help = false;
                    return true;
                }
                self.apply_action(action);
                true
            }
            AppMessage::Event(Event::Resize(..)) => true,
            AppMessage::Event(_) => false,
            AppMessage::CurrentSong(track) => {
                if let Some(notification) = self.session.apply_current_song(track) {
                    self.spawn_notification(notification);
                }
                true
            }
            AppMessage::Listeners(count) => {
                self.session.apply_listeners(count);
                true
            }
            AppMessage::History(rows) => {
                self.session.apply_history(rows);
                true
            }
            AppMessage::RetryDue(generation) => {
                self.retry_task = None;
                if !self.session.retry_due(generation) {
                    debug!("retry for generation {} is stale", generation);
                    return false;
                }
                let generation = self.session.start(false);
                self.load_stream(generation);
                true
            }
            AppMessage::PermissionAnswer(granted) => {
                if let Some(notice) = self.session.finish_notification_request(granted) {
                    self.toast.notice(notice);
                }
                true
            }
        }
    }

    fn apply_action(&mut self, action: Action) {
        debug!("apply_action: {:?}", action);
        match action {
            // ── Playback ──────────────────────────────────────────────────────
            Action::TogglePlay => {
                self.cancel_retry();
                match self.session.toggle_play(Utc::now()) {
                    Some(generation) => self.load_stream(generation),
                    None => {
                        self.stats_timer = None;
                        self.player.stop();
                    }
                }
            }
            Action::Volume(delta) => {
                let volume = self.session.step_volume(delta);
                self.player.set_volume(volume.output());
            }
            Action::Mute => {
                let volume = self.session.toggle_mute();
                self.player.set_volume(volume.output());
            }

            // ── Preferences ───────────────────────────────────────────────────
            Action::ToggleTheme => {
                self.session.toggle_theme();
            }
            Action::ToggleNotifications => {
                let (step, notice) = self.session.toggle_notifications();
                if let Some(notice) = notice {
                    self.toast.notice(notice);
                }
                if step == ToggleStep::NeedsPermission {
                    self.request_notification_permission();
                }
            }

            // ── Song ──────────────────────────────────────────────────────────
            Action::ToggleFavorite => {
                let notice = self.session.toggle_favorite();
                self.toast.notice(notice);
                self.favorites_panel.sync(self.session.favorites().len());
            }
            Action::Share => match self.session.share_text() {
                Ok(text) => self.copy_to_clipboard(text),
                Err(notice) => self.toast.notice(notice),
            },

            // ── Favorites list ────────────────────────────────────────────────
            Action::SelectUp => {
                self.favorites_panel.select_prev(self.session.favorites().len());
            }
            Action::SelectDown => {
                self.favorites_panel.select_next(self.session.favorites().len());
            }
            Action::RemoveSelected => {
                if let Some(index) = self.favorites_panel.selected() {
                    if let Some(notice) = self.session.remove_favorite(index) {
                        self.toast.notice(notice);
                    }
                    self.favorites_panel.sync(self.session.favorites().len());
                }
            }

            // ── App ───────────────────────────────────────────────────────────
            Action::ToggleHelp => self.show_help = !self.show_help,
            Action::Quit => self.should_quit = true,
        }
    }

    // ── Playback plumbing ─────────────────────────────────────────────────────

    /// Queue a load; failures come back as media errors for `generation`.
    fn load_stream(&mut self, generation: u64) {
        let volume = self.session.volume().output();
        self.player
            .play(&self.config.station.stream_url, volume, generation);
    }

    fn apply_media_event(&mut self, generation: u64, media: MediaEvent) {
        let outcome = self.session.on_media_event(generation, media, Utc::now());
        if let Some(notice) = outcome.notice {
            self.toast.notice(notice);
        }
        match outcome.signal {
            Some(PlaybackSignal::Started) => self.arm_stats_timer(),
            Some(PlaybackSignal::Halted) => self.stats_timer = None,
            Some(PlaybackSignal::Buffering) | None => {}
            Some(PlaybackSignal::RetryScheduled {
                delay, generation, ..
            }) => {
                self.stats_timer = None;
                self.player.stop();
                self.schedule_retry(delay, generation);
            }
            Some(PlaybackSignal::GaveUp) => {
                self.stats_timer = None;
                self.player.stop();
            }
        }
    }

    fn arm_stats_timer(&mut self) {
        let period = self.config.stats.interval();
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.stats_timer = Some(timer);
    }

    fn schedule_retry(&mut self, delay: Duration, generation: u64) {
        self.cancel_retry();
        let Some(tx) = self.tx.clone() else {
            return;
        };
        info!("retrying generation {} in {:?}", generation, delay);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(AppMessage::RetryDue(generation)).await;
        });
        self.retry_task = Some(task.abort_handle());
    }

    fn cancel_retry(&mut self) {
        if let Some(task) = self.retry_task.take() {
            task.abort();
        }
    }

    // ── Background tasks ──────────────────────────────────────────────────────

    fn spawn_song_poll(&self) {
        let Some(tx) = self.tx.clone() else {
            return;
        };
        let api = self.api.clone();
        tokio::spawn(async move {
            let (track, history) = tokio::join!(api.fetch_current_track(), api.fetch_history());
            let _ = tx.send(AppMessage::CurrentSong(track)).await;
            let _ = tx.send(AppMessage::History(history)).await;
        });
    }

    fn spawn_listener_poll(&self) {
        let Some(tx) = self.tx.clone() else {
            return;
        };
        let api = self.api.clone();
        tokio::spawn(async move {
            let count = api.fetch_listener_count().await;
            let _ = tx.send(AppMessage::Listeners(count)).await;
        });
    }

    fn spawn_notification(&self, notification: TrackNotification) {
        let api = self.api.clone();
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            let icon = match &notification.icon_url {
                Some(url) => api.fetch_cover(url, platform::cache_dir()).await,
                None => None,
            };
            if let Err(e) = notifier
                .show(&notification.summary, &notification.body, icon)
                .await
            {
                debug!("notify: {:#}", e);
            }
        });
    }

    /// The first notification doubles as the permission request: if it
    /// can be shown, notifications are allowed.
    fn request_notification_permission(&self) {
        let Some(tx) = self.tx.clone() else {
            return;
        };
        let notifier = self.notifier.clone();
        let summary = self.config.station.title.clone();
        tokio::spawn(async move {
            let granted = match notifier.show(&summary, "Notifications enabled", None).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("notify: permission probe failed: {:#}", e);
                    false
                }
            };
            let _ = tx.send(AppMessage::PermissionAnswer(granted)).await;
        });
    }

    fn copy_to_clipboard(&mut self, text: String) {
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text)) {
            Ok(()) => self.toast.success("Copied!"),
            Err(e) => {
                warn!("clipboard: {}", e);
                self.toast.error("Copy failed");
            }
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let palette = theme::palette(self.session.theme());
        let area = frame.area();
        frame.render_widget(Block::default().style(palette.base()), area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(now_playing::HEIGHT),
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(area);

        header::draw(frame, rows[0], &self.session, &self.config.station.title, palette);
        status_bar::draw_separator(frame, rows[1], palette);
        now_playing::draw(frame, rows[2], &self.session, palette);
        status_bar::draw_separator(frame, rows[3], palette);

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[4]);
        history::draw(frame, cols[0], self.session.history(), palette);
        self.favorites_panel
            .draw(frame, cols[1], self.session.favorites(), palette);

        status_bar::draw_keys_bar(
            frame,
            rows[5],
            palette,
            self.session.playback_state(),
            self.session.status_text(),
        );

        if self.show_help {
            help_overlay::draw(frame, area, palette);
        }
        self.toast.draw(frame, area, palette);
    }
}

/// Ticks an optional timer; never resolves while it is disarmed.
async fn tick_armed(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
