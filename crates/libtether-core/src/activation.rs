//! One-shot "detect or launch and wait" startup sequence
//!
//! The sequencer probes for a running supervisor, fires an external launch
//! action if none is found, then polls with backoff until the supervisor
//! answers or the startup deadline passes. It never fails: a missing or
//! broken launcher degrades to [`ActivationOutcome::Degraded`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backoff::{Backoff, BackoffPolicy};
use crate::config::{StartupMode, TetherConfig};
use crate::error::TetherError;
use crate::probe::{bounded, Probe};

/// How activation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationOutcome {
    /// Supervisor reachable
    Ready,
    /// Deadline passed without the supervisor answering
    Degraded,
    /// Startup disabled or declined
    Skipped,
}

impl fmt::Display for ActivationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActivationOutcome::Ready => "ready",
            ActivationOutcome::Degraded => "degraded",
            ActivationOutcome::Skipped => "skipped",
        })
    }
}

/// External action that starts the supervisor
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<(), TetherError>;
}

/// Asks the user whether to start the supervisor
#[async_trait]
pub trait StartupPrompt: Send + Sync {
    async fn confirm(&self) -> bool;
}

/// Startup sequence; consumed by [`ActivationSequencer::run`]
pub struct ActivationSequencer {
    mode: StartupMode,
    probe: Box<dyn Probe>,
    launcher: Option<Box<dyn Launcher>>,
    prompt: Option<Box<dyn StartupPrompt>>,
    detect_timeout: Duration,
    startup_timeout: Duration,
}

impl ActivationSequencer {
    pub fn new<P: Probe + 'static>(mode: StartupMode, probe: P) -> Self {
        let defaults = TetherConfig::default();
        Self {
            mode,
            probe: Box::new(probe),
            launcher: None,
            prompt: None,
            detect_timeout: defaults.detect_timeout(),
            startup_timeout: defaults.startup_timeout(),
        }
    }

    /// Sequencer configured from `config`
    pub fn from_config<P: Probe + 'static>(config: &TetherConfig, probe: P) -> Self {
        Self::new(config.startup, probe)
            .detect_timeout(config.detect_timeout())
            .startup_timeout(config.startup_timeout())
    }

    pub fn with_launcher<L: Launcher + 'static>(mut self, launcher: L) -> Self {
        self.launcher = Some(Box::new(launcher));
        self
    }

    pub fn with_prompt<S: StartupPrompt + 'static>(mut self, prompt: S) -> Self {
        self.prompt = Some(Box::new(prompt));
        self
    }

    pub fn detect_timeout(mut self, timeout: Duration) -> Self {
        self.detect_timeout = timeout;
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Run the sequence once
    pub async fn run(self) -> ActivationOutcome {
        match self.mode {
            StartupMode::Off => {
                info!("Supervisor startup disabled, skipping activation");
                return ActivationOutcome::Skipped;
            }
            StartupMode::Prompt => {
                let accepted = match self.prompt {
                    Some(ref prompt) => prompt.confirm().await,
                    None => false,
                };
                if !accepted {
                    info!("Supervisor startup declined");
                    return ActivationOutcome::Skipped;
                }
            }
            StartupMode::Auto => {}
        }

        let detect = self.detect_timeout;
        if bounded(detect, self.probe.check(detect)).await.is_ok() {
            info!(probe = self.probe.name(), "Supervisor already running");
            return ActivationOutcome::Ready;
        }

        match self.launcher {
            Some(ref launcher) => match launcher.launch().await {
                Ok(()) => info!("Supervisor launch requested"),
                Err(e) => warn!(error = %e, "Supervisor launch failed, waiting anyway"),
            },
            None => warn!("No launch action configured, waiting for an external start"),
        }

        self.wait_until_ready().await
    }

    async fn wait_until_ready(&self) -> ActivationOutcome {
        let mut backoff = Backoff::new(BackoffPolicy::activation(self.startup_timeout));
        let mut attempts = 0u32;

        loop {
            let remaining = backoff.remaining().unwrap_or_default();
            if remaining.is_zero() {
                break;
            }

            let probe_timeout = backoff.current().min(remaining);
            attempts += 1;
            match bounded(probe_timeout, self.probe.check(probe_timeout)).await {
                Ok(_) => {
                    info!(attempts, "Supervisor ready");
                    return ActivationOutcome::Ready;
                }
                Err(e) => debug!(attempt = attempts, error = %e, "Supervisor not ready yet"),
            }

            let remaining = backoff.remaining().unwrap_or_default();
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(backoff.next_delay().min(remaining)).await;
        }

        warn!(
            attempts,
            timeout_ms = self.startup_timeout.as_millis() as u64,
            "Supervisor did not become ready before the startup deadline"
        );
        ActivationOutcome::Degraded
    }
}
