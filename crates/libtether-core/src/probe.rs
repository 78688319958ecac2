//! Reachability probes
//!
//! A probe answers "is this endpoint up right now?" within a caller-supplied
//! bound. Implementations must return (not hang) once `timeout` elapses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TetherError;

/// Details from a successful probe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    /// Uptime reported by the endpoint, if any
    pub uptime_secs: Option<f64>,
}

/// One reachability signal
#[async_trait]
pub trait Probe: Send + Sync {
    /// Check reachability; `Ok` means healthy
    async fn check(&self, timeout: Duration) -> Result<ProbeReport, TetherError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<P: Probe + ?Sized> Probe for Arc<P> {
    async fn check(&self, timeout: Duration) -> Result<ProbeReport, TetherError> {
        (**self).check(timeout).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<P: Probe + ?Sized> Probe for Box<P> {
    async fn check(&self, timeout: Duration) -> Result<ProbeReport, TetherError> {
        (**self).check(timeout).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Run a probe future under `timeout`, mapping expiry to [`TetherError::Timeout`]
pub async fn bounded<F>(timeout: Duration, probe: F) -> Result<ProbeReport, TetherError>
where
    F: std::future::Future<Output = Result<ProbeReport, TetherError>>,
{
    match tokio::time::timeout(timeout, probe).await {
        Ok(result) => result,
        Err(_) => Err(TetherError::Timeout(timeout.as_millis() as u64)),
    }
}
