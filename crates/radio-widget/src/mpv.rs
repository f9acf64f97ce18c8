/// mpv IPC driver: the widget's media element.
///
/// ```text
///   MpvDriver::spawn_and_connect()
///         │
///         ├── writer_task   ← receives MpvRequest via mpsc, serialises → socket
///         └── reader_task   ← reads JSON lines from socket
///                                ├── response (has request_id) → matched oneshot::Sender
///                                └── event / property-change   → event_tx channel
/// ```
///
/// `media_event` translates the unsolicited events into the playback
/// controller's `MediaEvent`s.  When the IPC connection drops (mpv crashed
/// or was killed) the reader posts a synthetic `ipc-closed` event carrying
/// the connection id, so a lost media element surfaces as a stream error.
///
/// Platform notes:
/// - Unix:   Unix domain sockets
/// - Windows: Named pipes  \\.\pipe\<name>
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use radio_core::playback::MediaEvent;

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Synthetic event posted by the reader when the socket closes.
pub const IPC_CLOSED_EVENT: &str = "ipc-closed";

/// observe_property IDs, matched in property-change events.
pub const OBS_CORE_IDLE: u64 = 1;
pub const OBS_PAUSE: u64 = 2;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    fn ipc_closed(connection: u64) -> Self {
        Self {
            raw: json!({ "event": IPC_CLOSED_EVENT, "connection": connection }),
        }
    }

    /// Connection id of an `ipc-closed` event.
    pub fn closed_connection(&self) -> Option<u64> {
        if self.event_name()? != IPC_CLOSED_EVENT {
            return None;
        }
        self.raw.get("connection")?.as_u64()
    }

    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.event_name()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// Playlist entry an `end-file` / `start-file` event refers to.
    pub fn playlist_entry_id(&self) -> Option<u64> {
        self.raw.get("playlist_entry_id")?.as_u64()
    }
}

/// Translate an mpv event into a media event.
///
/// - `core-idle` false: audio is flowing; true: buffering.
/// - `pause` true: paused.
/// - `end-file` with reason `error` or `eof`: the stream failed or dropped
///   (a live stream has no natural end).
/// - `ipc-closed`: mpv itself went away.
pub fn media_event(evt: &MpvEvent) -> Option<MediaEvent> {
    if let Some((obs_id, data)) = evt.as_property_change() {
        return match (obs_id, data.as_bool()) {
            (OBS_CORE_IDLE, Some(false)) => Some(MediaEvent::Playing),
            (OBS_CORE_IDLE, Some(true)) => Some(MediaEvent::Waiting),
            (OBS_PAUSE, Some(true)) => Some(MediaEvent::Paused),
            _ => None,
        };
    }
    match evt.event_name() {
        Some("end-file") => {
            let reason = evt
                .raw
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            match reason {
                "error" => {
                    let detail = evt
                        .raw
                        .get("file_error")
                        .and_then(Value::as_str)
                        .unwrap_or("playback error");
                    Some(MediaEvent::Error(detail.to_string()))
                }
                "eof" => Some(MediaEvent::Error("stream ended".to_string())),
                _ => None,
            }
        }
        Some(IPC_CLOSED_EVENT) => Some(MediaEvent::Error("mpv connection lost".to_string())),
        _ => None,
    }
}

// ── public handle ─────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
    connection: u64,
}

impl MpvHandle {
    /// Id carried by this connection's `ipc-closed` event.
    pub fn connection(&self) -> u64 {
        self.connection
    }

    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Load `url`, replacing whatever was playing.  Returns the playlist entry
    /// id when mpv reports one.
    pub async fn load_stream(&self, url: &str, volume: f32) -> anyhow::Result<Option<u64>> {
        self.set_volume(volume).await?;
        let resp = self.send(json!(["loadfile", url, "replace"])).await?;
        debug!("mpv: loadfile response: {:?}", resp);
        Ok(resp["data"]["playlist_entry_id"].as_u64())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_volume(&self, vol: f32) -> anyhow::Result<()> {
        let vol_pct = (vol * 100.0).clamp(0.0, 100.0);
        self.send(json!(["set_property", "volume", vol_pct])).await?;
        Ok(())
    }

    /// Register the property observations `media_event` understands.
    /// Must be called after every fresh connection.
    pub async fn observe_properties(&self) {
        for (id, name) in [(OBS_CORE_IDLE, "core-idle"), (OBS_PAUSE, "pause")] {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process.
pub struct MpvDriver {
    socket_name: String,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new() -> Self {
        Self {
            socket_name: radio_core::platform::mpv_socket_name(),
            process: None,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("mpv process exited: {}", status);
                false
            }
            Err(e) => {
                warn!("mpv process_alive check failed: {}", e);
                false
            }
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn spawn_process(&mut self, volume: f32) -> anyhow::Result<()> {
        let mpv_binary = radio_core::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let stderr_path = radio_core::platform::data_dir().join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;

        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(radio_core::platform::mpv_socket_arg())
            .arg("--quiet")
            .arg(format!(
                "--volume={}",
                (volume * 100.0).clamp(0.0, 100.0).round() as i64
            ))
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true)
            .spawn()?;
        info!("mpv: spawned {:?} pid {:?}", mpv_binary, child.id());
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        volume: f32,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        self.spawn_process(volume)?;

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        volume: f32,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        self.spawn_process(volume)?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

pub(crate) fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // req_id → reply channel; the writer inserts, the reader resolves
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
    let connection = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(
        BufReader::new(read_half),
        pending,
        event_tx,
        connection,
    ));

    MpvHandle {
        tx: cmd_tx,
        connection,
    }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    event_tx: mpsc::Sender<MpvEvent>,
    connection: u64,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("mpv reader: connection {} closed", connection);
                fail_pending(&pending, "mpv IPC connection closed").await;
                let _ = event_tx.send(MpvEvent::ipc_closed(connection)).await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(Value::as_u64) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    }
                } else {
                    debug!("mpv reader: event {}", trimmed);
                    if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                        break;
                    }
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, "mpv IPC read error").await;
                let _ = event_tx.send(MpvEvent::ipc_closed(connection)).await;
                break;
            }
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can match the reply
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evt(raw: Value) -> MpvEvent {
        MpvEvent { raw }
    }

    #[test]
    fn test_core_idle_maps_to_playing_and_waiting() {
        let playing = evt(json!({"event": "property-change", "id": 1, "name": "core-idle", "data": false}));
        assert_eq!(media_event(&playing), Some(MediaEvent::Playing));

        let idle = evt(json!({"event": "property-change", "id": 1, "name": "core-idle", "data": true}));
        assert_eq!(media_event(&idle), Some(MediaEvent::Waiting));
    }

    #[test]
    fn test_pause_maps_only_when_set() {
        let paused = evt(json!({"event": "property-change", "id": 2, "name": "pause", "data": true}));
        assert_eq!(media_event(&paused), Some(MediaEvent::Paused));

        let resumed = evt(json!({"event": "property-change", "id": 2, "name": "pause", "data": false}));
        assert_eq!(media_event(&resumed), None);
    }

    #[test]
    fn test_end_file_reasons() {
        let err = evt(json!({
            "event": "end-file", "reason": "error",
            "playlist_entry_id": 3, "file_error": "loading failed"
        }));
        assert_eq!(
            media_event(&err),
            Some(MediaEvent::Error("loading failed".into()))
        );
        assert_eq!(err.playlist_entry_id(), Some(3));

        let eof = evt(json!({"event": "end-file", "reason": "eof"}));
        assert!(matches!(media_event(&eof), Some(MediaEvent::Error(_))));

        let stopped = evt(json!({"event": "end-file", "reason": "stop"}));
        assert_eq!(media_event(&stopped), None);
    }

    #[test]
    fn test_unrelated_events_ignored() {
        assert_eq!(media_event(&evt(json!({"event": "file-loaded"}))), None);
        assert_eq!(
            media_event(&evt(json!({"event": "property-change", "id": 9, "data": false}))),
            None
        );
    }

    #[tokio::test]
    async fn test_lost_connection_becomes_stream_error() {
        let (ours, mpv_side) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(ours);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(read_half, write_half, event_tx);

        // mpv crashes
        drop(mpv_side);

        let evt = tokio::time::timeout(std::time::Duration::from_secs(2), event_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(evt.closed_connection(), Some(handle.connection()));
        assert_eq!(
            media_event(&evt),
            Some(MediaEvent::Error("mpv connection lost".into()))
        );
        // requests no longer hang on a dead connection
        assert!(handle.send(json!(["get_property", "pause"])).await.is_err());
    }

    #[tokio::test]
    async fn test_replies_and_events_are_split() {
        let (ours, mpv_side) = tokio::io::duplex(4096);
        let (read_half, write_half) = tokio::io::split(ours);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(read_half, write_half, event_tx);

        let (mpv_read, mut mpv_write) = tokio::io::split(mpv_side);
        tokio::spawn(async move {
            let mut lines = BufReader::new(mpv_read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let req: Value = serde_json::from_str(&line).unwrap();
                let reply = json!({
                    "request_id": req["request_id"],
                    "error": "success",
                    "data": { "playlist_entry_id": 4 }
                });
                let event = json!({"event": "property-change", "id": 1, "data": false});
                let out = format!("{}\n{}\n", event, reply);
                mpv_write.write_all(out.as_bytes()).await.unwrap();
            }
        });

        let entry = handle.load_stream("http://stream.test/live", 0.5).await.unwrap();
        assert_eq!(entry, Some(4));
        let evt = event_rx.recv().await.unwrap();
        assert_eq!(media_event(&evt), Some(MediaEvent::Playing));
    }
}
