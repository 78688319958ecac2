//! Typed publish/subscribe channels
//!
//! Each event category gets its own [`Channel`] so subscribers are statically
//! typed. Publishing never blocks and never fails: with no subscribers the
//! value is simply dropped, and slow subscribers observe `Lagged` on their
//! receiver instead of slowing the publisher.

use tokio::sync::broadcast;

/// Default per-channel buffer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// One typed broadcast channel
#[derive(Debug)]
pub struct Channel<T: Clone> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Channel<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to values published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Publish to every current subscriber, returning how many received it
    pub fn publish(&self, value: T) -> usize {
        self.tx.send(value).unwrap_or(0)
    }
}

impl<T: Clone> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}
