//! Snapshot fan-out to live subscribers.
//!
//! Each subscriber gets its own unbounded queue so a slow listener never
//! causes a snapshot to be dropped for anyone. Senders whose receiver is gone
//! are pruned on the next publish.

use tokio::sync::mpsc;
use tracing::trace;

/// Receiving half of a subscription. The first item is always the state at
/// the moment of subscribing.
pub type SnapshotFeed<T> = mpsc::UnboundedReceiver<T>;

#[derive(Debug)]
pub struct SnapshotHub<T> {
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> SnapshotHub<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Register a subscriber and seed it with `current`.
    pub fn attach(&mut self, current: T) -> SnapshotFeed<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Cannot fail: `rx` is alive.
        let _ = tx.send(current);
        self.subscribers.push(tx);
        rx
    }

    /// Push `snapshot` to every live subscriber. Returns how many received it.
    pub fn publish(&mut self, snapshot: &T) -> usize {
        let before = self.subscribers.len();
        self.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());

        let pruned = before - self.subscribers.len();
        if pruned > 0 {
            trace!(pruned, remaining = self.subscribers.len(), "Pruned closed subscribers");
        }
        self.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|tx| !tx.is_closed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriber_count() == 0
    }
}

impl<T: Clone> Default for SnapshotHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_delivers_current_state_first() {
        let mut hub = SnapshotHub::new();
        let mut rx = hub.attach(1u32);
        hub.publish(&2);
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publish_prunes_dropped_receivers() {
        let mut hub = SnapshotHub::new();
        let keep = hub.attach("a".to_string());
        let gone = hub.attach("a".to_string());
        drop(gone);

        assert_eq!(hub.publish(&"b".to_string()), 1);
        assert_eq!(hub.subscriber_count(), 1);
        drop(keep);
        assert!(hub.is_empty());
    }

    #[test]
    fn every_snapshot_reaches_every_subscriber() {
        let mut hub = SnapshotHub::new();
        let mut a = hub.attach(0u32);
        let mut b = hub.attach(0u32);
        for i in 1..=50 {
            hub.publish(&i);
        }
        for rx in [&mut a, &mut b] {
            let got: Vec<u32> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
            assert_eq!(got, (0..=50).collect::<Vec<_>>());
        }
    }
}
