use thiserror::Error;

/// Main error type for tether operations
#[derive(Debug, Error)]
pub enum TetherError {
    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("disconnected")]
    Disconnected,

    #[error("busy: a request is already pending")]
    Busy,

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("launch failed: {0}")]
    Launch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TetherError {
    /// Get the error code for JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            TetherError::Timeout(_) => "timeout",
            TetherError::Disconnected => "disconnected",
            TetherError::Busy => "busy",
            TetherError::Unreachable(_) => "unreachable",
            TetherError::MalformedPayload(_) => "malformed_payload",
            TetherError::InvalidConfig(_) => "invalid_config",
            TetherError::Launch(_) => "launch_failed",
            TetherError::Io(_) => "io_error",
            TetherError::Json(_) => "internal_error",
            TetherError::TomlParse(_) => "invalid_config",
            TetherError::TomlSerialize(_) => "internal_error",
            TetherError::Internal(_) => "internal_error",
        }
    }

    /// Get the exit code for the CLI host
    pub fn exit_code(&self) -> i32 {
        match self {
            TetherError::InvalidConfig(_) | TetherError::TomlParse(_) => 2,
            TetherError::Unreachable(_) | TetherError::Disconnected => 3,
            TetherError::Timeout(_) => 4,
            TetherError::Busy => 5,
            TetherError::Io(_) => 5,
            TetherError::Launch(_) => 6,
            _ => 1,
        }
    }

    /// Get actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            TetherError::Unreachable(_) | TetherError::Disconnected => vec![
                "Run 'tether activate' to detect or launch the supervisor",
                "Check 'supervisor_port' and 'control_endpoint' in the config file",
            ],
            TetherError::Timeout(_) => vec![
                "The supervisor may be overloaded; retry shortly",
                "Raise 'request_timeout_ms' if requests are legitimately slow",
            ],
            TetherError::Busy => vec!["Wait for the in-flight request to finish and retry"],
            TetherError::InvalidConfig(_) | TetherError::TomlParse(_) => {
                vec!["Fix the config file or pass --config with a valid path"]
            }
            TetherError::Launch(_) => vec!["Check that 'launch_target' points at an executable"],
            _ => vec![],
        }
    }
}
