/// mpv playback engine over the JSON IPC socket.
///
/// ```text
///   MpvEngine (PlayerEngine)
///         │  lazily spawns on first play
///         ▼
///   MpvDriver::spawn_and_connect()
///         │
///         ├── writer_task   ← receives PendingRequest via mpsc, writes → socket
///         └── reader_task   ← reads JSON lines from socket
///                                ├── response (has request_id) → matched oneshot::Sender
///                                └── event                     → event channel
/// ```
///
/// The child is started with `kill_on_drop`, so dropping the engine on quit
/// takes mpv down with it.
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kink_core::error::PlayerError;
use kink_core::platform;
use kink_core::player::PlayerEngine;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

const IPC_TIMEOUT: Duration = Duration::from_secs(5);

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line, already has '\n'
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An unsolicited mpv message (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// `reason` of an end-file event ("eof", "stop", "error", ...).
    pub fn end_reason(&self) -> Option<&str> {
        self.raw.get("reason")?.as_str()
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
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

        tokio::time::timeout(IPC_TIMEOUT, reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    pub async fn load_stream(&self, url: &str) -> anyhow::Result<()> {
        self.send(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn get_pause(&self) -> anyhow::Result<bool> {
        let resp = self.send(json!(["get_property", "pause"])).await?;
        Ok(resp["data"].as_bool().unwrap_or(false))
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process.
pub struct MpvDriver {
    socket_path: PathBuf,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new() -> Self {
        Self {
            socket_path: PathBuf::from(platform::mpv_socket_name()),
            process: None,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        if let Some(ref mut child) = self.process {
            child.try_wait().ok().flatten().is_none()
        } else {
            false
        }
    }

    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
        let _ = tokio::fs::remove_file(&self.socket_path).await;

        let mpv_binary =
            platform::find_mpv_binary().ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        info!("mpv: spawning {:?}", mpv_binary);

        let child = tokio::process::Command::new(mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--no-terminal")
            .arg(platform::mpv_socket_arg())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        self.process = Some(child);

        for _ in 0..50 {
            if self.socket_path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        if !self.socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }

        let stream = UnixStream::connect(&self.socket_path).await?;
        info!("mpv: connected to IPC socket");
        Ok(Self::start_io_tasks(stream, event_tx))
    }

    fn start_io_tasks(stream: UnixStream, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle {
        let (read_half, write_half) = stream.into_split();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

        tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
        tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

        MpvHandle { tx: cmd_tx }
    }
}

async fn fail_all(pending: &Pending, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("mpv IPC {}", reason)));
    }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: Pending, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending, "connection closed").await;
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

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let Some(tx) = pending.lock().await.remove(&req_id) else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                        continue;
                    };
                    let status = val["error"].as_str().unwrap_or("unknown error").to_string();
                    let result = if status == "success" {
                        Ok(val)
                    } else {
                        debug!("mpv reader: response req={} err={}", req_id, status);
                        Err(anyhow::anyhow!("mpv error: {}", status))
                    };
                    let _ = tx.send(result);
                } else {
                    debug!("mpv reader: event {}", trimmed);
                    // Events are advisory; drop them if nobody is draining.
                    let _ = event_tx.try_send(MpvEvent { raw: val });
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all(&pending, "read error").await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: Pending)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can match the reply.
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

// ── engine ────────────────────────────────────────────────────────────────────

/// [`PlayerEngine`] backed by a single mpv process.
pub struct MpvEngine {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    events_tx: mpsc::Sender<MpvEvent>,
    events_rx: mpsc::Receiver<MpvEvent>,
    /// Play-list entry set by the controller.
    source: Option<String>,
    /// What mpv actually has loaded; `None` once it goes idle.
    loaded: Option<String>,
}

impl MpvEngine {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            driver: MpvDriver::new(),
            handle: None,
            events_tx,
            events_rx,
            source: None,
            loaded: None,
        }
    }

    async fn connect(&mut self) -> Result<MpvHandle, PlayerError> {
        if let Some(h) = &self.handle {
            if self.driver.process_alive() {
                return Ok(h.clone());
            }
            warn!("mpv: process gone, respawning");
            self.loaded = None;
        }
        let handle = self
            .driver
            .spawn_and_connect(self.events_tx.clone())
            .await
            .map_err(|e| PlayerError::Unavailable(e.to_string()))?;
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Fold pending events into `loaded`.  Only an end-file that mpv reached
    /// on its own counts; "stop" is what our own loadfile/stop produce.
    fn drain_events(&mut self) {
        while let Ok(ev) = self.events_rx.try_recv() {
            if ev.event_name() != Some("end-file") {
                continue;
            }
            match ev.end_reason() {
                Some("error") => {
                    warn!("mpv: stream ended with error");
                    self.loaded = None;
                }
                Some("eof") => {
                    info!("mpv: stream ended");
                    self.loaded = None;
                }
                _ => {}
            }
        }
    }
}

fn command_error(command: &'static str) -> impl FnOnce(anyhow::Error) -> PlayerError {
    move |e| PlayerError::Command {
        command,
        reason: e.to_string(),
    }
}

impl PlayerEngine for MpvEngine {
    async fn set_source(&mut self, url: &str) -> Result<(), PlayerError> {
        self.source = Some(url.to_string());
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlayerError> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| PlayerError::Unavailable("no stream selected".into()))?;
        let handle = self.connect().await?;
        self.drain_events();

        if self.loaded.as_deref() != Some(source.as_str()) {
            handle
                .load_stream(&source)
                .await
                .map_err(command_error("loadfile"))?;
            self.loaded = Some(source);
        }
        handle.set_pause(false).await.map_err(command_error("pause"))
    }

    async fn pause(&mut self) -> Result<(), PlayerError> {
        match &self.handle {
            Some(h) => h.set_pause(true).await.map_err(command_error("pause")),
            None => Ok(()),
        }
    }

    async fn stop(&mut self) -> Result<(), PlayerError> {
        self.loaded = None;
        match &self.handle {
            Some(h) if self.driver.process_alive() => {
                h.stop().await.map_err(command_error("stop"))
            }
            _ => Ok(()),
        }
    }

    async fn is_playing(&mut self) -> bool {
        self.drain_events();
        if self.loaded.is_none() || !self.driver.process_alive() {
            return false;
        }
        match &self.handle {
            Some(h) => match h.get_pause().await {
                Ok(paused) => !paused,
                Err(e) => {
                    debug!("mpv: pause query failed: {}", e);
                    false
                }
            },
            None => false,
        }
    }
}
