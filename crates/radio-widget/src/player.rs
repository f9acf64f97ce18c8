//! The stream player: one mpv process, one loaded source at a time.
//!
//! The player runs in its own task; the UI loop only queues `PlayerCommand`s
//! through a `PlayerHandle` and never waits on mpv.
//!
//! Each loaded source carries the playback generation it was started under.
//! Events are tagged with that generation before they reach the session, and
//! dropped entirely once the source is torn down.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use radio_core::playback::MediaEvent;

use crate::mpv::{self, MpvDriver, MpvEvent, MpvHandle};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub enum PlayerCommand {
    Play {
        url: String,
        volume: f32,
        generation: u64,
    },
    Stop,
    SetVolume(f32),
    Shutdown(oneshot::Sender<()>),
}

/// Queue side of the player task.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<PlayerCommand>,
}

impl PlayerHandle {
    /// Start the player task.  Media events, tagged with their generation,
    /// arrive on `media_tx`; so do load failures.
    pub fn spawn(media_tx: mpsc::Sender<(u64, MediaEvent)>) -> Self {
        let (event_tx, events) = mpsc::channel::<MpvEvent>(256);
        let (tx, commands) = mpsc::unbounded_channel();
        tokio::spawn(run(Player::new(event_tx), events, commands, media_tx));
        Self { tx }
    }

    pub fn play(&self, url: &str, volume: f32, generation: u64) {
        self.send(PlayerCommand::Play {
            url: url.to_string(),
            volume,
            generation,
        });
    }

    pub fn stop(&self) {
        self.send(PlayerCommand::Stop);
    }

    /// Apply the effective output level (0 when muted).
    pub fn set_volume(&self, output: f32) {
        self.send(PlayerCommand::SetVolume(output));
    }

    /// Stop playback and kill mpv, waiting a bounded time for the task.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(PlayerCommand::Shutdown(done_tx));
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, done_rx).await.is_err() {
            warn!("player: shutdown timed out");
        }
    }

    fn send(&self, cmd: PlayerCommand) {
        if self.tx.send(cmd).is_err() {
            warn!("player: task is gone");
        }
    }
}

async fn run(
    mut player: Player,
    mut events: mpsc::Receiver<MpvEvent>,
    mut commands: mpsc::UnboundedReceiver<PlayerCommand>,
    media_tx: mpsc::Sender<(u64, MediaEvent)>,
) {
    let mut done = None;
    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(PlayerCommand::Play { url, volume, generation }) => {
                    if let Err(e) = player.play(&url, volume, generation).await {
                        warn!("player: load failed: {:#}", e);
                        // a player that cannot load counts as a failed stream
                        let failure = MediaEvent::Error(e.to_string());
                        if media_tx.send((generation, failure)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(PlayerCommand::Stop) => player.stop().await,
                Some(PlayerCommand::SetVolume(output)) => player.set_volume(output).await,
                Some(PlayerCommand::Shutdown(tx)) => {
                    done = Some(tx);
                    break;
                }
                None => break,
            },

            Some(evt) = events.recv() => {
                let tagged = player.tag(&evt);
                if let Some(connection) = evt.closed_connection() {
                    player.connection_closed(connection);
                }
                if let Some(tagged) = tagged {
                    if media_tx.send(tagged).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    player.shutdown().await;
    if let Some(tx) = done {
        let _ = tx.send(());
    }
    debug!("player: task exiting");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Source {
    generation: u64,
    /// mpv playlist entry, when the loadfile reply carried one.
    entry_id: Option<u64>,
}

struct Player {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    event_tx: mpsc::Sender<MpvEvent>,
    source: Option<Source>,
}

impl Player {
    fn new(event_tx: mpsc::Sender<MpvEvent>) -> Self {
        Self {
            driver: MpvDriver::new(),
            handle: None,
            event_tx,
            source: None,
        }
    }

    async fn ensure_handle(&mut self, volume: f32) -> anyhow::Result<MpvHandle> {
        if self.handle.is_some() && !self.driver.process_alive() {
            warn!("player: mpv process died, dropping handle");
            self.handle = None;
        }
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }
        let handle = self
            .driver
            .spawn_and_connect(volume, self.event_tx.clone())
            .await?;
        handle.observe_properties().await;
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Tear down the current source and load `url` under `generation`.
    async fn play(&mut self, url: &str, volume: f32, generation: u64) -> anyhow::Result<()> {
        self.source = None;
        let handle = self.ensure_handle(volume).await?;
        let entry_id = handle.load_stream(url, volume).await?;
        info!("player: loading {} (generation {}, entry {:?})", url, generation, entry_id);
        self.source = Some(Source {
            generation,
            entry_id,
        });
        Ok(())
    }

    async fn stop(&mut self) {
        self.source = None;
        if let Some(handle) = &self.handle {
            if let Err(e) = handle.stop().await {
                debug!("player: stop: {}", e);
            }
        }
    }

    async fn set_volume(&self, output: f32) {
        if let Some(handle) = &self.handle {
            if let Err(e) = handle.set_volume(output).await {
                warn!("player: set volume: {}", e);
            }
        }
    }

    /// Attribute an mpv event to the current source.
    fn tag(&self, evt: &MpvEvent) -> Option<(u64, MediaEvent)> {
        let connection = self.handle.as_ref().map(MpvHandle::connection);
        tag_event(self.source, connection, evt)
    }

    /// The IPC connection went away; the next `play` respawns mpv.
    fn connection_closed(&mut self, connection: u64) {
        if self.handle.as_ref().map(MpvHandle::connection) != Some(connection) {
            return;
        }
        warn!("player: lost mpv connection {}", connection);
        self.handle = None;
        self.source = None;
    }

    async fn shutdown(&mut self) {
        self.stop().await;
        self.handle = None;
        self.driver.kill().await;
    }
}

fn tag_event(
    source: Option<Source>,
    connection: Option<u64>,
    evt: &MpvEvent,
) -> Option<(u64, MediaEvent)> {
    let source = source?;
    // a connection replaced by a respawn closing late
    if let Some(closed) = evt.closed_connection() {
        if Some(closed) != connection {
            debug!("player: ignoring close of old connection {}", closed);
            return None;
        }
    }
    // end-file from an entry replaced by a newer load
    if let (Some(ours), Some(theirs)) = (source.entry_id, evt.playlist_entry_id()) {
        if ours != theirs {
            debug!("player: ignoring event for stale entry {}", theirs);
            return None;
        }
    }
    mpv::media_event(evt).map(|e| (source.generation, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn end_file(entry: u64) -> MpvEvent {
        MpvEvent {
            raw: json!({"event": "end-file", "reason": "error", "playlist_entry_id": entry}),
        }
    }

    fn closed(connection: u64) -> MpvEvent {
        MpvEvent {
            raw: json!({"event": mpv::IPC_CLOSED_EVENT, "connection": connection}),
        }
    }

    #[test]
    fn test_no_source_drops_events() {
        assert_eq!(tag_event(None, Some(1), &end_file(1)), None);
        assert_eq!(tag_event(None, Some(1), &closed(1)), None);
    }

    #[test]
    fn test_stale_entry_is_dropped() {
        let source = Some(Source {
            generation: 4,
            entry_id: Some(2),
        });
        assert_eq!(tag_event(source, Some(1), &end_file(1)), None);
        assert!(matches!(
            tag_event(source, Some(1), &end_file(2)),
            Some((4, MediaEvent::Error(_)))
        ));
    }

    #[test]
    fn test_property_changes_take_current_generation() {
        let source = Some(Source {
            generation: 7,
            entry_id: None,
        });
        let evt = MpvEvent {
            raw: json!({"event": "property-change", "id": 1, "data": false}),
        };
        assert_eq!(tag_event(source, Some(1), &evt), Some((7, MediaEvent::Playing)));
    }

    #[test]
    fn test_only_current_connection_loss_counts() {
        let source = Some(Source {
            generation: 2,
            entry_id: Some(5),
        });
        assert_eq!(tag_event(source, Some(8), &closed(7)), None);
        assert!(matches!(
            tag_event(source, Some(8), &closed(8)),
            Some((2, MediaEvent::Error(_)))
        ));
    }

    #[tokio::test]
    async fn test_mpv_crash_reaches_session_as_error() {
        let (event_tx, events) = mpsc::channel(16);
        let (ours, mpv_side) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(ours);
        let handle = mpv::start_io_tasks(read_half, write_half, event_tx.clone());

        let mut player = Player::new(event_tx);
        player.handle = Some(handle);
        player.source = Some(Source {
            generation: 3,
            entry_id: Some(1),
        });

        let (media_tx, mut media_rx) = mpsc::channel(16);
        let (_cmd_tx, commands) = mpsc::unbounded_channel();
        tokio::spawn(run(player, events, commands, media_tx));

        drop(mpv_side);

        let (generation, event) = tokio::time::timeout(Duration::from_secs(2), media_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(generation, 3);
        assert!(matches!(event, MediaEvent::Error(_)));
    }

    #[tokio::test]
    async fn test_stop_silences_the_old_source() {
        let (event_tx, events) = mpsc::channel(16);
        let mut player = Player::new(event_tx.clone());
        player.source = Some(Source {
            generation: 1,
            entry_id: None,
        });

        let (media_tx, mut media_rx) = mpsc::channel(16);
        let (cmd_tx, commands) = mpsc::unbounded_channel();
        tokio::spawn(run(player, events, commands, media_tx));
        let handle = PlayerHandle { tx: cmd_tx };

        handle.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        event_tx
            .send(MpvEvent {
                raw: json!({"event": "property-change", "id": 1, "data": false}),
            })
            .await
            .unwrap();
        let late = tokio::time::timeout(Duration::from_millis(200), media_rx.recv()).await;
        assert!(late.is_err(), "event after stop was forwarded: {:?}", late);

        handle.shutdown().await;
        assert!(media_rx.recv().await.is_none());
    }
}
