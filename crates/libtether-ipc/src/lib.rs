//! Control-channel client for the tether supervisor
//!
//! This crate provides:
//! - Message types for the control channel (ControlRequest, ControlResponse)
//! - Connection targets and transport selection (ConnectionTarget, TargetSet)
//! - The single-flight, newline-delimited JSON client (ControlClient)

pub mod client;
pub mod error;
pub mod messages;
pub mod target;

pub use client::{ControlClient, ControlOptions};
pub use error::IpcError;
pub use messages::{ControlRequest, ControlResponse};
pub use target::{default_local_target, ConnectionTarget, TargetSet, DEFAULT_CONTROL_PORT};

/// Default request timeout in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Default per-target connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1_500;
