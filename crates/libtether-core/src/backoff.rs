//! Exponential backoff
//!
//! One parameterized primitive shared by every reconnecting component. The
//! broadcast streams use [`BackoffPolicy::stream`] and retry until disposed;
//! the activation sequencer uses [`BackoffPolicy::activation`] with a hard
//! overall deadline.

use std::time::Duration;

use tokio::time::Instant;

/// Backoff parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// First delay, and the delay after a reset
    pub initial: Duration,
    /// Growth factor applied after every delay
    pub multiplier: f64,
    /// Upper bound on any single delay
    pub cap: Duration,
    /// Overall budget measured from when the cursor was created
    pub deadline: Option<Duration>,
}

impl BackoffPolicy {
    /// Policy for long-lived stream reconnects: 2s doubling to 30s, no deadline
    pub fn stream() -> Self {
        Self {
            initial: Duration::from_secs(2),
            multiplier: 2.0,
            cap: Duration::from_secs(30),
            deadline: None,
        }
    }

    /// Policy for waiting on a freshly launched supervisor
    pub fn activation(deadline: Duration) -> Self {
        Self {
            initial: Duration::from_millis(200),
            multiplier: 1.5,
            cap: Duration::from_millis(2000),
            deadline: Some(deadline),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::stream()
    }
}

/// Stateful cursor over a [`BackoffPolicy`]
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
    started: Instant,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: policy.initial,
            started: Instant::now(),
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Delay the next call to [`Backoff::next_delay`] will return
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Return the current delay and advance to `min(delay * multiplier, cap)`
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown_nanos = (self.current.as_nanos() as f64 * self.policy.multiplier).round();
        let cap_nanos = self.policy.cap.as_nanos() as f64;
        self.current = Duration::from_nanos(grown_nanos.min(cap_nanos) as u64);
        delay
    }

    /// Back to the initial delay after a success
    pub fn reset(&mut self) {
        self.current = self.policy.initial;
    }

    /// Time left before the deadline; `None` when the policy has no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.policy
            .deadline
            .map(|deadline| deadline.saturating_sub(self.started.elapsed()))
    }

    /// Whether the deadline has elapsed (never true without a deadline)
    pub fn expired(&self) -> bool {
        matches!(self.remaining(), Some(remaining) if remaining.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(delays: &[Duration]) -> Vec<u128> {
        delays.iter().map(|d| d.as_millis()).collect()
    }

    #[test]
    fn test_stream_sequence_caps_at_thirty_seconds() {
        let mut backoff = Backoff::new(BackoffPolicy::stream());
        let delays: Vec<Duration> = (0..7).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            millis(&delays),
            vec![2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut backoff = Backoff::new(BackoffPolicy::stream());
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn test_activation_sequence() {
        let mut backoff = Backoff::new(BackoffPolicy::activation(Duration::from_secs(15)));
        let delays: Vec<Duration> = (0..9).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            millis(&delays),
            vec![200, 300, 450, 675, 1012, 1518, 2000, 2000, 2000]
        );
    }

    #[test]
    fn test_no_deadline_never_expires() {
        let backoff = Backoff::new(BackoffPolicy::stream());
        assert_eq!(backoff.remaining(), None);
        assert!(!backoff.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_counts_down() {
        let backoff = Backoff::new(BackoffPolicy::activation(Duration::from_millis(1000)));
        assert_eq!(backoff.remaining(), Some(Duration::from_millis(1000)));

        tokio::time::advance(Duration::from_millis(400)).await;
        assert_eq!(backoff.remaining(), Some(Duration::from_millis(600)));
        assert!(!backoff.expired());

        tokio::time::advance(Duration::from_millis(700)).await;
        assert_eq!(backoff.remaining(), Some(Duration::ZERO));
        assert!(backoff.expired());
    }
}
