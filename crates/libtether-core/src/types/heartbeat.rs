use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot broadcast by the supervisor on its heartbeat stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Supervisor wall-clock time (ms since Unix epoch)
    #[serde(default)]
    pub timestamp_ms: u64,
    /// Control-channel proxy port
    #[serde(default)]
    pub mcp_proxy_port: u16,
    /// First port of the instance pool
    #[serde(default)]
    pub pool_base_port: u16,
    /// Number of pooled instances
    #[serde(default)]
    pub pool_instances: u32,
    /// Aggregate health reported by the supervisor
    #[serde(default)]
    pub mcp_healthy: bool,
}

impl Heartbeat {
    /// Supervisor wall-clock time, if the timestamp is representable
    pub fn wall_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms as i64).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_heartbeat() {
        let beat: Heartbeat = serde_json::from_str(
            r#"{"timestamp_ms":1700000000000,"mcp_proxy_port":3457,"pool_base_port":3460,"pool_instances":2,"mcp_healthy":true}"#,
        )
        .unwrap();
        assert_eq!(beat.mcp_proxy_port, 3457);
        assert_eq!(beat.pool_instances, 2);
        assert!(beat.mcp_healthy);
        assert_eq!(
            beat.wall_time().unwrap().format("%Y-%m-%d").to_string(),
            "2023-11-14"
        );
    }

    #[test]
    fn test_missing_fields_default() {
        let beat: Heartbeat = serde_json::from_str(r#"{"timestamp_ms":5}"#).unwrap();
        assert_eq!(beat.pool_instances, 0);
        assert!(!beat.mcp_healthy);
    }
}
