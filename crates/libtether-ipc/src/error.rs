//! IPC error types

use libtether_core::TetherError;
use thiserror::Error;

/// Errors that can occur during control-channel operations
#[derive(Error, Debug)]
pub enum IpcError {
    /// No target accepted the connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Socket closed or errored while a request was in flight
    #[error("Disconnected from supervisor")]
    Disconnected,

    /// Another request is already pending on this channel
    #[error("Control channel busy: a request is already pending")]
    Busy,

    /// `send_request` called without a live connection
    #[error("Not connected to supervisor")]
    NotConnected,

    /// Supervisor answered with `ok: false`
    #[error("Supervisor rejected request: {message}")]
    Rejected { message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<IpcError> for TetherError {
    fn from(e: IpcError) -> Self {
        match e {
            IpcError::ConnectionFailed(msg) => TetherError::Unreachable(msg),
            IpcError::Timeout(ms) => TetherError::Timeout(ms),
            IpcError::Disconnected | IpcError::NotConnected => TetherError::Disconnected,
            IpcError::Busy => TetherError::Busy,
            IpcError::Rejected { message } => TetherError::Internal(message),
            IpcError::Serialization(msg) => TetherError::MalformedPayload(msg),
            IpcError::Io(e) => TetherError::Io(e),
            IpcError::Json(e) => TetherError::Json(e),
        }
    }
}

