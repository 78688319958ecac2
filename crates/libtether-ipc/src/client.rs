//! Control-channel client for talking to the supervisor
//!
//! One persistent duplex connection, newline-delimited JSON in both directions,
//! and at most one request in flight. A second request issued while one is
//! pending fails with [`IpcError::Busy`] and is never written.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use libtether_core::{TetherConfig, TetherError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::IpcError;
use crate::messages::{ControlRequest, ControlResponse};
use crate::target::{default_local_target, ConnectionTarget, TargetSet};
use crate::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type Completion = oneshot::Sender<Result<ControlResponse, IpcError>>;

/// Connection and timeout settings for a [`ControlClient`]
#[derive(Debug, Clone)]
pub struct ControlOptions {
    pub targets: TargetSet,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ControlOptions {
    pub fn from_config(config: &TetherConfig) -> Result<Self, TetherError> {
        Ok(Self {
            targets: TargetSet::from_config(config)?,
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
        })
    }

    /// Options that only ever try `target`
    pub fn pinned(target: ConnectionTarget) -> Self {
        let targets = match target {
            ConnectionTarget::Local(_) => TargetSet {
                mode: libtether_core::TransportMode::Local,
                local: target.clone(),
                tcp: ConnectionTarget::Tcp {
                    host: "127.0.0.1".to_string(),
                    port: crate::target::DEFAULT_CONTROL_PORT,
                },
            },
            ConnectionTarget::Tcp { .. } => TargetSet {
                mode: libtether_core::TransportMode::Remote,
                local: default_local_target(),
                tcp: target.clone(),
            },
        };
        Self {
            targets,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

struct Pending {
    generation: u64,
    tx: Completion,
}

/// State shared between the client handle and its reader task
struct Shared {
    pending: Mutex<Option<Pending>>,
    connected: AtomicBool,
    /// Bumped on every new connection so a stale reader cannot tear down its successor
    epoch: AtomicU64,
    generation: AtomicU64,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            connected: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            writer: tokio::sync::Mutex::new(None),
        }
    }

    fn pending_slot(&self) -> std::sync::MutexGuard<'_, Option<Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve the single pending slot, or fail with `Busy`
    fn reserve(&self) -> Result<(u64, oneshot::Receiver<Result<ControlResponse, IpcError>>), IpcError> {
        let mut slot = self.pending_slot();
        if slot.is_some() {
            return Err(IpcError::Busy);
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        *slot = Some(Pending { generation, tx });
        Ok((generation, rx))
    }

    /// Drop the pending slot if it still belongs to `generation`
    fn release(&self, generation: u64) {
        let mut slot = self.pending_slot();
        if slot.as_ref().map(|p| p.generation) == Some(generation) {
            *slot = None;
        }
    }

    fn reject_pending(&self, error: IpcError) {
        if let Some(pending) = self.pending_slot().take() {
            let _ = pending.tx.send(Err(error));
        }
    }

    fn dispatch(&self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let response: ControlResponse = match serde_json::from_str(text) {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "dropping malformed control line");
                return;
            }
        };

        match self.pending_slot().take() {
            Some(pending) => {
                let _ = pending.tx.send(Ok(response));
            }
            None => debug!(ok = response.ok, "ignoring unsolicited control response"),
        }
    }

    async fn connection_lost(&self, epoch: u64) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.writer.lock().await.take();
        self.reject_pending(IpcError::Disconnected);
    }
}

/// Releases a reserved pending slot when dropped
struct SlotGuard<'a> {
    shared: &'a Shared,
    generation: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.shared.release(self.generation);
    }
}

/// Client for the supervisor's control channel
pub struct ControlClient {
    options: ControlOptions,
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    target: Mutex<Option<ConnectionTarget>>,
}

impl ControlClient {
    pub fn new(options: ControlOptions) -> Self {
        Self {
            options,
            shared: Arc::new(Shared::new()),
            reader: Mutex::new(None),
            target: Mutex::new(None),
        }
    }

    pub fn from_config(config: &TetherConfig) -> Result<Self, TetherError> {
        Ok(Self::new(ControlOptions::from_config(config)?))
    }

    pub fn options(&self) -> &ControlOptions {
        &self.options
    }

    /// Connect to the first reachable target; `false` if none accepted
    pub async fn connect(&self) -> bool {
        match self.try_connect().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "control channel unavailable");
                false
            }
        }
    }

    /// Like [`connect`](Self::connect) but reports which target was chosen or why all failed
    pub async fn try_connect(&self) -> Result<ConnectionTarget, IpcError> {
        self.disconnect().await;

        let mut failures = Vec::new();
        for target in self.options.targets.candidates() {
            match time::timeout(self.options.connect_timeout, open(&target)).await {
                Ok(Ok((reader, writer))) => {
                    self.install(target.clone(), reader, writer).await;
                    info!(target = %target, "control channel connected");
                    return Ok(target);
                }
                Ok(Err(e)) => {
                    debug!(target = %target, error = %e, "control target refused");
                    failures.push(format!("{}: {}", target, e));
                }
                Err(_) => {
                    debug!(
                        target = %target,
                        timeout_ms = self.options.connect_timeout.as_millis() as u64,
                        "control target timed out"
                    );
                    failures.push(format!("{}: timed out", target));
                }
            }
        }

        Err(IpcError::ConnectionFailed(failures.join("; ")))
    }

    async fn install(&self, target: ConnectionTarget, reader: BoxedReader, writer: BoxedWriter) {
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.writer.lock().await = Some(writer);
        self.shared.connected.store(true, Ordering::SeqCst);
        *self.target.lock().unwrap_or_else(PoisonError::into_inner) = Some(target);

        let handle = tokio::spawn(read_loop(Arc::clone(&self.shared), reader, epoch));
        if let Some(old) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            old.abort();
        }
    }

    /// Send one request and wait for its response
    pub async fn send_request(&self, request: &ControlRequest) -> Result<ControlResponse, IpcError> {
        let value = serde_json::to_value(request)?;
        self.send_value(value).await
    }

    /// Send an arbitrary JSON request object
    pub async fn send_value(&self, request: serde_json::Value) -> Result<ControlResponse, IpcError> {
        if !self.shared.connected.load(Ordering::SeqCst) {
            return Err(IpcError::NotConnected);
        }
        if !request.get("type").map(|t| t.is_string()).unwrap_or(false) {
            return Err(IpcError::Serialization(
                "request must be an object with a string `type`".to_string(),
            ));
        }

        let (generation, rx) = self.shared.reserve()?;
        // Frees the slot on every exit, including when the caller drops this future
        let slot = SlotGuard {
            shared: &self.shared,
            generation,
        };

        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');

        let epoch = self.shared.epoch.load(Ordering::SeqCst);
        let write_result = {
            let mut guard = self.shared.writer.lock().await;
            match guard.as_mut() {
                Some(writer) => match writer.write_all(&line).await {
                    Ok(()) => writer.flush().await,
                    Err(e) => Err(e),
                },
                None => return Err(IpcError::NotConnected),
            }
        };
        if let Err(e) = write_result {
            warn!(error = %e, "control channel write failed");
            drop(slot);
            self.shared.connection_lost(epoch).await;
            return Err(IpcError::Disconnected);
        }

        debug!(request_type = request["type"].as_str().unwrap_or_default(), "control request sent");

        match time::timeout(self.options.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(IpcError::Disconnected),
            Err(_) => {
                let ms = self.options.request_timeout.as_millis() as u64;
                debug!(timeout_ms = ms, "control request timed out");
                Err(IpcError::Timeout(ms))
            }
        }
    }

    /// Drop the connection; any pending request fails with `Disconnected`
    pub async fn disconnect(&self) {
        if let Some(handle) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }

        let was_connected = self.shared.connected.swap(false, Ordering::SeqCst);
        // Invalidate any reader that might still observe EOF
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);

        if let Some(mut writer) = self.shared.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.shared.reject_pending(IpcError::Disconnected);
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if was_connected {
            info!("control channel disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn has_pending(&self) -> bool {
        self.shared.pending_slot().is_some()
    }

    /// Target of the live connection
    pub fn target(&self) -> Option<ConnectionTarget> {
        if !self.is_connected() {
            return None;
        }
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn attach_client(&self, client_id: &str, pid: u32) -> Result<serde_json::Value, IpcError> {
        self.send_request(&ControlRequest::AttachClient {
            client_id: client_id.to_string(),
            pid,
        })
        .await?
        .into_result()
    }

    pub async fn detach_client(&self, client_id: &str) -> Result<serde_json::Value, IpcError> {
        self.send_request(&ControlRequest::DetachClient {
            client_id: client_id.to_string(),
        })
        .await?
        .into_result()
    }

    pub async fn list_mcp_connections(&self) -> Result<serde_json::Value, IpcError> {
        self.send_request(&ControlRequest::ListMcpConnections)
            .await?
            .into_result()
    }

    pub async fn list_mcp_instances(&self) -> Result<serde_json::Value, IpcError> {
        self.send_request(&ControlRequest::ListMcpInstances)
            .await?
            .into_result()
    }

    pub async fn scale_up_mcp(&self, count: Option<u32>) -> Result<serde_json::Value, IpcError> {
        self.send_request(&ControlRequest::ScaleUpMcp { count })
            .await?
            .into_result()
    }
}

impl Drop for ControlClient {
    fn drop(&mut self) {
        if let Some(handle) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

async fn read_loop(shared: Arc<Shared>, reader: BoxedReader, epoch: u64) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                debug!("control channel closed by peer");
                break;
            }
            Ok(_) => shared.dispatch(&line),
            Err(e) => {
                warn!(error = %e, "control channel read failed");
                break;
            }
        }
    }
    shared.connection_lost(epoch).await;
}

async fn open(target: &ConnectionTarget) -> std::io::Result<(BoxedReader, BoxedWriter)> {
    match target {
        ConnectionTarget::Tcp { host, port } => {
            let stream = tokio::net::TcpStream::connect((host.as_str(), *port)).await?;
            stream.set_nodelay(true)?;
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
        ConnectionTarget::Local(path) => open_local(path).await,
    }
}

#[cfg(unix)]
async fn open_local(path: &std::path::Path) -> std::io::Result<(BoxedReader, BoxedWriter)> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    let (reader, writer) = stream.into_split();
    Ok((Box::new(reader), Box::new(writer)))
}

#[cfg(windows)]
async fn open_local(path: &std::path::Path) -> std::io::Result<(BoxedReader, BoxedWriter)> {
    let pipe = tokio::net::windows::named_pipe::ClientOptions::new().open(path)?;
    let (reader, writer) = tokio::io::split(pipe);
    Ok((Box::new(reader), Box::new(writer)))
}

#[cfg(not(any(unix, windows)))]
async fn open_local(_path: &std::path::Path) -> std::io::Result<(BoxedReader, BoxedWriter)> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "local sockets are not supported on this platform",
    ))
}
