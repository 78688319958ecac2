//! HTTP reachability probes

use std::time::Duration;

use async_trait::async_trait;
use libtether_core::probe::bounded;
use libtether_core::{Probe, ProbeReport, TetherConfig, TetherError};
use serde::Deserialize;

/// Supervisor health endpoint
pub const SUPERVISOR_HEALTH_PATH: &str = "/health";

/// Dashboard health endpoint
pub const DASHBOARD_HEALTH_PATH: &str = "/api/health";

#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    uptime: Option<f64>,
}

/// Probe that GETs a JSON health endpoint
///
/// Healthy means HTTP 200 with `"status": "ok"` (or `"healthy"`).
#[derive(Debug, Clone)]
pub struct HttpProbe {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self, TetherError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TetherError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(name, url, client))
    }

    pub fn with_client(name: impl Into<String>, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client,
        }
    }

    /// Signal A: the supervisor's own health endpoint
    pub fn supervisor(config: &TetherConfig) -> Result<Self, TetherError> {
        Self::new(
            "supervisor",
            format!("{}{}", config.supervisor_base_url(), SUPERVISOR_HEALTH_PATH),
        )
    }

    /// Signal B: the dashboard's health endpoint
    pub fn dashboard(config: &TetherConfig) -> Result<Self, TetherError> {
        Self::new(
            "dashboard",
            format!("{}{}", config.dashboard_base_url(), DASHBOARD_HEALTH_PATH),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self, timeout: Duration) -> Result<ProbeReport, TetherError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TetherError::Timeout(timeout.as_millis() as u64)
                } else {
                    TetherError::Unreachable(format!("{}: {}", self.url, e))
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(TetherError::Unreachable(format!(
                "{} returned HTTP {}",
                self.url,
                status.as_u16()
            )));
        }

        let body: HealthBody = response
            .json()
            .await
            .map_err(|e| TetherError::MalformedPayload(format!("{}: {}", self.url, e)))?;

        match body.status.as_str() {
            "ok" | "healthy" => Ok(ProbeReport {
                uptime_secs: body.uptime,
            }),
            other => Err(TetherError::Unreachable(format!(
                "{} reported status '{}'",
                self.name, other
            ))),
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, timeout: Duration) -> Result<ProbeReport, TetherError> {
        bounded(timeout, self.fetch(timeout)).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_from_config() {
        let config = TetherConfig::default();
        assert_eq!(
            HttpProbe::supervisor(&config).unwrap().url(),
            "http://127.0.0.1:3457/health"
        );
        assert_eq!(
            HttpProbe::dashboard(&config).unwrap().url(),
            "http://127.0.0.1:3001/api/health"
        );
    }

    #[test]
    fn test_health_body_defaults() {
        let body: HealthBody = serde_json::from_str("{}").unwrap();
        assert!(body.status.is_empty());
        assert!(body.uptime.is_none());
    }
}
