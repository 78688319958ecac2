use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connectivity state folded from the two reachability signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Initial state, never re-entered
    #[default]
    Unknown,
    Connected,
    /// Supervisor reachable, dashboard not
    Degraded,
    Disconnected,
    /// First healthy cycle after `Degraded` or `Disconnected`
    Reconnected,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Connected => "connected",
            HealthState::Degraded => "degraded",
            HealthState::Disconnected => "disconnected",
            HealthState::Reconnected => "reconnected",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one probe cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub state: HealthState,
    /// Signal A: supervisor reachability
    pub supervisor_healthy: bool,
    /// Signal B: dashboard reachability
    pub dashboard_healthy: bool,
    pub last_check: DateTime<Utc>,
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<f64>,
}

impl HealthSnapshot {
    /// Snapshot before any probe has run
    pub fn initial() -> Self {
        Self {
            state: HealthState::Unknown,
            supervisor_healthy: false,
            dashboard_healthy: false,
            last_check: Utc::now(),
            consecutive_failures: 0,
            uptime_secs: None,
        }
    }
}

/// An actual change of state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    pub from: HealthState,
    pub to: HealthState,
}
