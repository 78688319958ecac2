//! Configuration for the connectivity subsystem
//!
//! Stored as TOML. Every field has a default so a partial (or missing)
//! file is always usable.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TetherError;

/// Which control-channel transport to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Try the local socket first, fall back to TCP
    #[default]
    Auto,
    /// Local socket / named pipe only
    Local,
    /// TCP only
    Remote,
}

impl FromStr for TransportMode {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(TransportMode::Auto),
            "local" => Ok(TransportMode::Local),
            "remote" => Ok(TransportMode::Remote),
            other => Err(TetherError::InvalidConfig(format!(
                "transport must be auto, local or remote (got '{}')",
                other
            ))),
        }
    }
}

/// What to do at startup when the supervisor is not running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartupMode {
    /// Never probe or launch
    Off,
    /// Ask before probing/launching
    Prompt,
    /// Probe and launch without asking
    #[default]
    Auto,
}

impl FromStr for StartupMode {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(StartupMode::Off),
            "prompt" => Ok(StartupMode::Prompt),
            "auto" => Ok(StartupMode::Auto),
            other => Err(TetherError::InvalidConfig(format!(
                "startup must be off, prompt or auto (got '{}')",
                other
            ))),
        }
    }
}

/// Connectivity configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    /// Control-channel transport preference
    pub transport: TransportMode,
    /// Explicit control-channel endpoint (socket path, pipe name or host:port)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_endpoint: Option<String>,
    /// Host the HTTP endpoints are served on
    pub host: String,
    /// Supervisor HTTP port (health probe + heartbeat stream)
    pub supervisor_port: u16,
    /// Dashboard HTTP port (health probe + domain event stream)
    pub dashboard_port: u16,
    /// Health polling interval
    pub poll_interval_ms: u64,
    /// Per-probe timeout inside a health cycle
    pub probe_timeout_ms: u64,
    /// Startup behavior
    pub startup: StartupMode,
    /// Executable fired when the supervisor must be launched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_target: Option<PathBuf>,
    /// Bound on the initial "already running?" probe
    pub detect_timeout_ms: u64,
    /// Overall deadline for launch-and-wait
    pub startup_timeout_ms: u64,
    /// Control-channel request timeout
    pub request_timeout_ms: u64,
    /// Control-channel connect timeout, per target
    pub connect_timeout_ms: u64,
}

impl Default for TetherConfig {
    fn default() -> Self {
        Self {
            transport: TransportMode::Auto,
            control_endpoint: None,
            host: "127.0.0.1".to_string(),
            supervisor_port: 3457,
            dashboard_port: 3001,
            poll_interval_ms: 10_000,
            probe_timeout_ms: 3_000,
            startup: StartupMode::Auto,
            launch_target: None,
            detect_timeout_ms: 1_000,
            startup_timeout_ms: 15_000,
            request_timeout_ms: 5_000,
            connect_timeout_ms: 1_500,
        }
    }
}

impl TetherConfig {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), TetherError> {
        if self.host.trim().is_empty() {
            return Err(TetherError::InvalidConfig("host must not be empty".to_string()));
        }
        if self.supervisor_port == 0 || self.dashboard_port == 0 {
            return Err(TetherError::InvalidConfig(
                "supervisor_port and dashboard_port must be non-zero".to_string(),
            ));
        }
        for (name, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("detect_timeout_ms", self.detect_timeout_ms),
            ("startup_timeout_ms", self.startup_timeout_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
        ] {
            if value == 0 {
                return Err(TetherError::InvalidConfig(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }

    pub fn supervisor_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.supervisor_port)
    }

    pub fn dashboard_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.dashboard_port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Load config from a TOML file, `None` if the file does not exist
pub fn load_config(path: &Path) -> Result<Option<TetherConfig>, TetherError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let config: TetherConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(Some(config))
}

/// Save config to a TOML file, creating parent directories
pub fn save_config(path: &Path, config: &TetherConfig) -> Result<(), TetherError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tether.toml");

        let config = TetherConfig {
            transport: TransportMode::Remote,
            control_endpoint: Some("127.0.0.1:45470".to_string()),
            startup: StartupMode::Prompt,
            launch_target: Some(PathBuf::from("/opt/supervisor/bin/supervisor")),
            ..TetherConfig::default()
        };

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(load_config(&dir.path().join("absent.toml")).unwrap().is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tether.toml");
        std::fs::write(&path, "startup = \"off\"\ndashboard_port = 4100\n").unwrap();

        let loaded = load_config(&path).unwrap().unwrap();
        assert_eq!(loaded.startup, StartupMode::Off);
        assert_eq!(loaded.dashboard_port, 4100);
        assert_eq!(loaded.supervisor_port, 3457);
        assert_eq!(loaded.transport, TransportMode::Auto);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = TetherConfig {
            request_timeout_ms: 0,
            ..TetherConfig::default()
        };
        assert!(matches!(config.validate(), Err(TetherError::InvalidConfig(_))));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("local".parse::<TransportMode>().unwrap(), TransportMode::Local);
        assert_eq!("prompt".parse::<StartupMode>().unwrap(), StartupMode::Prompt);
        assert!("sometimes".parse::<StartupMode>().is_err());
    }
}
