//! Broadcast stream clients
//!
//! A stream client holds one long-lived HTTP GET open, splits the body into
//! event-stream frames and republishes the decoded payloads on typed
//! channels. Any end of the stream (EOF, transport error, non-200 status)
//! schedules a reconnect through the stream backoff policy. Clients retry
//! until disposed.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use libtether_core::{
    Backoff, BackoffPolicy, Channel, DomainEvent, EventCategory, Heartbeat, TetherConfig,
    TetherError,
};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::frame::{is_keep_alive, FrameBuffer};

/// Path of the supervisor heartbeat stream
pub const HEARTBEAT_PATH: &str = "/supervisor/heartbeat";

/// Path of the dashboard domain-event stream
pub const EVENTS_PATH: &str = "/api/events/stream";

/// Body of an open stream
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TetherError>> + Send>>;

/// Connection-level signals from a stream client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// First successful connection
    Connected,
    /// Successful connection after an earlier loss
    Restored,
    /// A connected stream ended
    Lost,
    /// Next connection attempt is due after this delay
    ReconnectScheduled(Duration),
}

/// Something that can open an event-stream body
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Open the stream. A non-success status is an error.
    async fn open(&self) -> Result<ByteStream, TetherError>;

    /// Where this source connects, for logs
    fn describe(&self) -> String;
}

/// [`StreamSource`] over a streaming HTTP GET
#[derive(Debug, Clone)]
pub struct HttpStreamSource {
    client: reqwest::Client,
    url: String,
}

impl HttpStreamSource {
    pub fn new(url: impl Into<String>) -> Result<Self, TetherError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| TetherError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StreamSource for HttpStreamSource {
    async fn open(&self) -> Result<ByteStream, TetherError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| TetherError::Unreachable(format!("{}: {}", self.url, e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(TetherError::Unreachable(format!(
                "{} returned HTTP {}",
                self.url,
                status.as_u16()
            )));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TetherError::Unreachable(format!("stream body: {}", e))));
        Ok(Box::pin(body))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Receives every non-keep-alive payload of a stream
trait PayloadSink: Send + Sync {
    fn deliver(&self, payload: &str);
}

fn decode<T: DeserializeOwned>(stream: &str, payload: &str) -> Option<T> {
    match serde_json::from_str(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(stream, error = %e, "dropping malformed frame");
            None
        }
    }
}

enum Lifecycle {
    Idle,
    Running(JoinHandle<()>),
    Disposed,
}

/// Connection loop shared by both stream clients
struct StreamDriver {
    name: &'static str,
    source: Arc<dyn StreamSource>,
    sink: Arc<dyn PayloadSink>,
    status: Channel<StreamStatus>,
    policy: BackoffPolicy,
    disposed: Arc<AtomicBool>,
    lifecycle: Mutex<Lifecycle>,
}

impl StreamDriver {
    fn new(name: &'static str, source: Arc<dyn StreamSource>, sink: Arc<dyn PayloadSink>) -> Self {
        Self {
            name,
            source,
            sink,
            status: Channel::new(),
            policy: BackoffPolicy::stream(),
            disposed: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self) {
        let mut lifecycle = self.lifecycle();
        if !matches!(*lifecycle, Lifecycle::Idle) {
            return;
        }

        let session = Session {
            name: self.name,
            source: Arc::clone(&self.source),
            sink: Arc::clone(&self.sink),
            status: self.status.clone(),
            backoff: Backoff::new(self.policy.clone()),
            disposed: Arc::clone(&self.disposed),
        };
        info!(stream = self.name, source = %self.source.describe(), "stream client starting");
        *lifecycle = Lifecycle::Running(tokio::spawn(session.run()));
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Disposed);
        if let Lifecycle::Running(handle) = previous {
            handle.abort();
            info!(stream = self.name, "stream client disposed");
        }
    }

    fn is_running(&self) -> bool {
        matches!(*self.lifecycle(), Lifecycle::Running(_))
    }

    fn is_disposed(&self) -> bool {
        matches!(*self.lifecycle(), Lifecycle::Disposed)
    }
}

impl Drop for StreamDriver {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// State owned by the spawned connection loop
struct Session {
    name: &'static str,
    source: Arc<dyn StreamSource>,
    sink: Arc<dyn PayloadSink>,
    status: Channel<StreamStatus>,
    backoff: Backoff,
    disposed: Arc<AtomicBool>,
}

impl Session {
    fn emit(&self, status: StreamStatus) {
        if !self.disposed.load(Ordering::SeqCst) {
            self.status.publish(status);
        }
    }

    async fn run(mut self) {
        let mut ever_connected = false;

        loop {
            match self.source.open().await {
                Ok(body) => {
                    self.backoff.reset();
                    if ever_connected {
                        info!(stream = self.name, "stream restored");
                        self.emit(StreamStatus::Restored);
                    } else {
                        info!(stream = self.name, "stream connected");
                        self.emit(StreamStatus::Connected);
                    }
                    ever_connected = true;

                    self.pump(body).await;

                    info!(stream = self.name, "stream lost");
                    self.emit(StreamStatus::Lost);
                }
                Err(e) => {
                    debug!(stream = self.name, error = %e, "stream connect failed");
                }
            }

            let delay = self.backoff.next_delay();
            debug!(
                stream = self.name,
                delay_ms = delay.as_millis() as u64,
                "reconnect scheduled"
            );
            self.emit(StreamStatus::ReconnectScheduled(delay));
            tokio::time::sleep(delay).await;
        }
    }

    async fn pump(&self, mut body: ByteStream) {
        let mut frames = FrameBuffer::new();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for payload in frames.push(&bytes) {
                        self.deliver(&payload);
                    }
                }
                Err(e) => {
                    debug!(stream = self.name, error = %e, "stream read failed");
                    break;
                }
            }
        }

        if let Some(payload) = frames.finish() {
            self.deliver(&payload);
        }
    }

    fn deliver(&self, payload: &str) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if is_keep_alive(payload) {
            trace!(stream = self.name, "keep-alive");
            return;
        }
        self.sink.deliver(payload);
    }
}

struct BeatSink {
    beats: Channel<Heartbeat>,
}

impl PayloadSink for BeatSink {
    fn deliver(&self, payload: &str) {
        if let Some(beat) = decode::<Heartbeat>("heartbeat", payload) {
            self.beats.publish(beat);
        }
    }
}

/// Client for the supervisor heartbeat stream
pub struct HeartbeatClient {
    driver: StreamDriver,
    beats: Channel<Heartbeat>,
}

impl HeartbeatClient {
    pub fn new<S: StreamSource + 'static>(source: S) -> Self {
        let beats = Channel::new();
        let sink = BeatSink {
            beats: beats.clone(),
        };
        Self {
            driver: StreamDriver::new("heartbeat", Arc::new(source), Arc::new(sink)),
            beats,
        }
    }

    /// Heartbeat stream at `<supervisor>/supervisor/heartbeat`
    pub fn from_config(config: &TetherConfig) -> Result<Self, TetherError> {
        let url = format!("{}{}", config.supervisor_base_url(), HEARTBEAT_PATH);
        Ok(Self::new(HttpStreamSource::new(url)?))
    }

    /// Replace the reconnect policy; only effective before `start`
    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.driver.policy = policy;
        self
    }

    pub fn subscribe_beats(&self) -> broadcast::Receiver<Heartbeat> {
        self.beats.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StreamStatus> {
        self.driver.status.subscribe()
    }

    /// Begin connecting. No-op if already started or disposed.
    pub fn start(&self) {
        self.driver.start();
    }

    /// Stop for good. Idempotent.
    pub fn dispose(&self) {
        self.driver.dispose();
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    pub fn is_disposed(&self) -> bool {
        self.driver.is_disposed()
    }
}

struct EventSink {
    all: Channel<DomainEvent>,
    categories: HashMap<EventCategory, Channel<DomainEvent>>,
}

impl PayloadSink for EventSink {
    fn deliver(&self, payload: &str) {
        let Some(event) = decode::<DomainEvent>("events", payload) else {
            return;
        };
        let routed = event
            .category()
            .and_then(|category| self.categories.get(&category));

        match routed {
            Some(channel) => {
                self.all.publish(event.clone());
                channel.publish(event);
            }
            None => {
                trace!(event_type = %event.event_type, "uncategorized event");
                self.all.publish(event);
            }
        }
    }
}

/// Client for the dashboard domain-event stream
pub struct EventFeedClient {
    driver: StreamDriver,
    all: Channel<DomainEvent>,
    categories: HashMap<EventCategory, Channel<DomainEvent>>,
}

impl EventFeedClient {
    pub fn new<S: StreamSource + 'static>(source: S) -> Self {
        let all = Channel::new();
        let categories: HashMap<_, _> = EventCategory::ALL
            .iter()
            .map(|category| (*category, Channel::new()))
            .collect();
        let sink = EventSink {
            all: all.clone(),
            categories: categories.clone(),
        };
        Self {
            driver: StreamDriver::new("events", Arc::new(source), Arc::new(sink)),
            all,
            categories,
        }
    }

    /// Event stream at `<dashboard>/api/events/stream`
    pub fn from_config(config: &TetherConfig) -> Result<Self, TetherError> {
        let url = format!("{}{}", config.dashboard_base_url(), EVENTS_PATH);
        Ok(Self::new(HttpStreamSource::new(url)?))
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.driver.policy = policy;
        self
    }

    /// Every event, categorized or not
    pub fn subscribe_all(&self) -> broadcast::Receiver<DomainEvent> {
        self.all.subscribe()
    }

    /// Events of one category
    pub fn subscribe(&self, category: EventCategory) -> broadcast::Receiver<DomainEvent> {
        match self.categories.get(&category) {
            Some(channel) => channel.subscribe(),
            // every category is populated in `new`
            None => Channel::new().subscribe(),
        }
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StreamStatus> {
        self.driver.status.subscribe()
    }

    pub fn start(&self) {
        self.driver.start();
    }

    pub fn dispose(&self) {
        self.driver.dispose();
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    pub fn is_disposed(&self) -> bool {
        self.driver.is_disposed()
    }
}
