//! Health state machine
//!
//! [`HealthMachine`] is the pure fold of probe outcomes into a
//! [`HealthState`] with failure-count hysteresis. [`HealthMonitor`] drives it:
//! it runs both probes concurrently each cycle, publishes the latest
//! snapshot, and emits events only on actual transitions.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::bus::Channel;
use crate::probe::{bounded, Probe};
use crate::types::{HealthSnapshot, HealthState, HealthTransition};

/// Consecutive dual failures required before leaving a known-good state
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Pure state machine over (supervisor, dashboard) probe outcomes
#[derive(Debug, Clone)]
pub struct HealthMachine {
    state: HealthState,
    consecutive_failures: u32,
    threshold: u32,
}

impl HealthMachine {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_FAILURE_THRESHOLD)
    }

    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            state: HealthState::Unknown,
            consecutive_failures: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Fold one cycle's outcomes, returning the transition if the state changed
    ///
    /// An unreachable supervisor counts as a failure regardless of the
    /// dashboard.
    pub fn observe(&mut self, supervisor_ok: bool, dashboard_ok: bool) -> Option<HealthTransition> {
        let previous = self.state;
        let next = match (supervisor_ok, dashboard_ok) {
            (true, true) => {
                self.consecutive_failures = 0;
                match previous {
                    HealthState::Disconnected | HealthState::Degraded => HealthState::Reconnected,
                    _ => HealthState::Connected,
                }
            }
            (true, false) => {
                self.consecutive_failures = 0;
                HealthState::Degraded
            }
            (false, _) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if previous == HealthState::Unknown || self.consecutive_failures >= self.threshold {
                    HealthState::Disconnected
                } else {
                    previous
                }
            }
        };
        self.state = next;

        (next != previous).then_some(HealthTransition {
            from: previous,
            to: next,
        })
    }
}

impl Default for HealthMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// A transition together with the snapshot that caused it
#[derive(Debug, Clone)]
pub struct HealthChange {
    pub transition: HealthTransition,
    pub snapshot: HealthSnapshot,
}

/// Transition channels: one per enterable state plus a generic one
#[derive(Debug, Clone, Default)]
pub struct HealthEvents {
    changed: Channel<HealthChange>,
    connected: Channel<HealthSnapshot>,
    degraded: Channel<HealthSnapshot>,
    disconnected: Channel<HealthSnapshot>,
    reconnected: Channel<HealthSnapshot>,
}

impl HealthEvents {
    /// Every transition, whatever state was entered
    pub fn subscribe_changed(&self) -> tokio::sync::broadcast::Receiver<HealthChange> {
        self.changed.subscribe()
    }

    /// Transitions into `state`; `None` for `Unknown`, which is never entered
    pub fn subscribe_state(
        &self,
        state: HealthState,
    ) -> Option<tokio::sync::broadcast::Receiver<HealthSnapshot>> {
        self.channel_for(state).map(Channel::subscribe)
    }

    fn channel_for(&self, state: HealthState) -> Option<&Channel<HealthSnapshot>> {
        match state {
            HealthState::Unknown => None,
            HealthState::Connected => Some(&self.connected),
            HealthState::Degraded => Some(&self.degraded),
            HealthState::Disconnected => Some(&self.disconnected),
            HealthState::Reconnected => Some(&self.reconnected),
        }
    }

    fn emit(&self, transition: HealthTransition, snapshot: &HealthSnapshot) {
        if let Some(channel) = self.channel_for(transition.to) {
            channel.publish(snapshot.clone());
        }
        self.changed.publish(HealthChange {
            transition,
            snapshot: snapshot.clone(),
        });
    }
}

struct MonitorInner {
    supervisor: Box<dyn Probe>,
    dashboard: Box<dyn Probe>,
    probe_timeout: Duration,
    machine: tokio::sync::Mutex<HealthMachine>,
    latest: watch::Sender<HealthSnapshot>,
    events: HealthEvents,
}

impl MonitorInner {
    async fn poll(&self) -> HealthSnapshot {
        let timeout = self.probe_timeout;
        let (supervisor, dashboard) = tokio::join!(
            bounded(timeout, self.supervisor.check(timeout)),
            bounded(timeout, self.dashboard.check(timeout)),
        );

        if let Err(ref e) = supervisor {
            debug!(probe = self.supervisor.name(), error = %e, "Probe failed");
        }
        if let Err(ref e) = dashboard {
            debug!(probe = self.dashboard.name(), error = %e, "Probe failed");
        }

        let uptime_secs = supervisor
            .as_ref()
            .ok()
            .and_then(|r| r.uptime_secs)
            .or_else(|| dashboard.as_ref().ok().and_then(|r| r.uptime_secs));

        // Held through publishing so concurrent polls emit in fold order
        let mut machine = self.machine.lock().await;
        let transition = machine.observe(supervisor.is_ok(), dashboard.is_ok());
        let snapshot = HealthSnapshot {
            state: machine.state(),
            supervisor_healthy: supervisor.is_ok(),
            dashboard_healthy: dashboard.is_ok(),
            last_check: Utc::now(),
            consecutive_failures: machine.consecutive_failures(),
            uptime_secs,
        };

        self.latest.send_replace(snapshot.clone());
        match transition {
            Some(transition) => {
                info!(
                    from = %transition.from,
                    to = %transition.to,
                    failures = snapshot.consecutive_failures,
                    "Health state changed"
                );
                self.events.emit(transition, &snapshot);
            }
            None if snapshot.consecutive_failures > 0 => {
                debug!(
                    state = %snapshot.state,
                    failures = snapshot.consecutive_failures,
                    "Probe failure below threshold, holding state"
                );
            }
            None => {}
        }

        snapshot
    }
}

/// Periodic driver for [`HealthMachine`]
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new<A, B>(supervisor: A, dashboard: B, probe_timeout: Duration) -> Self
    where
        A: Probe + 'static,
        B: Probe + 'static,
    {
        Self::with_machine(supervisor, dashboard, probe_timeout, HealthMachine::new())
    }

    pub fn with_machine<A, B>(
        supervisor: A,
        dashboard: B,
        probe_timeout: Duration,
        machine: HealthMachine,
    ) -> Self
    where
        A: Probe + 'static,
        B: Probe + 'static,
    {
        let (latest, _) = watch::channel(HealthSnapshot::initial());
        Self {
            inner: Arc::new(MonitorInner {
                supervisor: Box::new(supervisor),
                dashboard: Box::new(dashboard),
                probe_timeout,
                machine: tokio::sync::Mutex::new(machine),
                latest,
                events: HealthEvents::default(),
            }),
            poller: Mutex::new(None),
        }
    }

    /// Transition channels
    pub fn events(&self) -> &HealthEvents {
        &self.inner.events
    }

    /// Most recent snapshot
    pub fn snapshot(&self) -> HealthSnapshot {
        self.inner.latest.borrow().clone()
    }

    /// Receiver that always holds the most recent snapshot
    pub fn watch(&self) -> watch::Receiver<HealthSnapshot> {
        self.inner.latest.subscribe()
    }

    /// Run one probe cycle now, independent of the polling timer
    pub async fn poll(&self) -> HealthSnapshot {
        self.inner.poll().await
    }

    /// Poll immediately and then every `interval`, replacing any running poller
    pub fn start_polling(&self, interval: Duration) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                inner.poll().await;
            }
        });

        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = poller.replace(handle) {
            previous.abort();
        }
        debug!(interval_ms = interval.as_millis() as u64, "Health polling started");
    }

    /// Stop the poller; safe to call repeatedly or before starting
    pub fn stop_polling(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = poller.take() {
            handle.abort();
            debug!("Health polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
