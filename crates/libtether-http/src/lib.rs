//! HTTP side of tether
//!
//! This crate provides:
//! - Event-stream frame parsing (FrameBuffer)
//! - The heartbeat and domain-event stream clients (HeartbeatClient, EventFeedClient)
//! - HTTP reachability probes for the health monitor (HttpProbe)
//! - The process launcher used by activation (ProcessLauncher)

pub mod frame;
pub mod launcher;
pub mod probe;
pub mod stream;

pub use frame::{FrameBuffer, MAX_BLOCK_BYTES};
pub use launcher::ProcessLauncher;
pub use probe::HttpProbe;
pub use stream::{
    ByteStream, EventFeedClient, HeartbeatClient, HttpStreamSource, StreamSource, StreamStatus,
};
