//! Callback subscriptions with a disposer.
//!
//! A [`SubscriptionHandle`] owns a spawned task that drains a snapshot feed
//! into a listener. The listener sits behind a lock together with a closed
//! flag: delivery takes the lock and checks the flag before calling, and
//! `close` sets the flag and then waits for the lock. Once `close` returns no
//! invocation can start, including one for a snapshot that was already queued.
//!
//! A `close` issued from inside a listener never waits. The listener it would
//! wait for may be its own, or one that is closing us from another thread.
//! In that case the flag alone stops the next delivery.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::hub::SnapshotFeed;

thread_local! {
    /// Set while a listener runs on this thread.
    static IN_LISTENER: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running a listener until dropped, so a
/// panicking listener does not leave the mark behind.
struct Delivering;

impl Delivering {
    fn enter() -> Self {
        IN_LISTENER.with(|d| d.set(true));
        Delivering
    }
}

impl Drop for Delivering {
    fn drop(&mut self) {
        IN_LISTENER.with(|d| d.set(false));
    }
}

struct Gate<F> {
    closed: AtomicBool,
    listener: Mutex<Option<F>>,
}

trait Disposer: Send + Sync {
    fn shut(&self);
    fn is_shut(&self) -> bool;
}

impl<F: Send> Disposer for Gate<F> {
    fn shut(&self) {
        self.closed.store(true, Ordering::SeqCst);

        let mut slot = if IN_LISTENER.with(|d| d.get()) {
            match self.listener.try_lock() {
                Ok(slot) => slot,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            }
        } else {
            self.listener.lock().unwrap_or_else(PoisonError::into_inner)
        };
        slot.take();
    }

    fn is_shut(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Disposer for a live subscription. Dropping the handle closes it.
#[must_use = "dropping a SubscriptionHandle closes the subscription"]
pub struct SubscriptionHandle {
    gate: Arc<dyn Disposer>,
    task: JoinHandle<()>,
    label: &'static str,
}

impl SubscriptionHandle {
    /// Spawn a task delivering every item of `feed` to `listener` until the
    /// feed ends or the handle is closed.
    pub fn spawn<T, F>(mut feed: SnapshotFeed<T>, listener: F, label: &'static str) -> Self
    where
        T: Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let gate = Arc::new(Gate {
            closed: AtomicBool::new(false),
            listener: Mutex::new(Some(listener)),
        });

        let worker = Arc::clone(&gate);
        let task = tokio::spawn(async move {
            while let Some(snapshot) = feed.recv().await {
                let Ok(mut slot) = worker.listener.lock() else {
                    warn!(subscription = label, "Listener panicked earlier, stopping delivery");
                    break;
                };
                if worker.closed.load(Ordering::SeqCst) {
                    break;
                }
                let Some(listener) = slot.as_mut() else {
                    break;
                };
                let _mark = Delivering::enter();
                listener(snapshot);
            }
            debug!(subscription = label, "Subscription feed finished");
        });

        Self { gate, task, label }
    }

    /// Stop delivery. Idempotent.
    pub fn close(&self) {
        if self.gate.is_shut() {
            return;
        }
        self.gate.shut();
        self.task.abort();
        debug!(subscription = self.label, "Subscription closed");
    }

    pub fn is_closed(&self) -> bool {
        self.gate.is_shut()
    }

    /// True once the feed has ended or the handle was closed.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn delivers_until_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handle = SubscriptionHandle::spawn(rx, move |_: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        }, "test");

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        handle.close();
        handle.close();
        assert!(handle.is_closed());

        let _ = tx.send(3);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn queued_snapshots_are_dropped_on_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        for i in 0..100u32 {
            tx.send(i).unwrap();
        }
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        // Nothing has run yet on the current-thread runtime.
        let handle = SubscriptionHandle::spawn(rx, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }, "test");
        handle.close();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn listener_can_close_its_own_subscription() {
        let (tx, rx) = mpsc::unbounded_channel();
        let slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));
        let seen = Arc::new(AtomicUsize::new(0));

        let own = Arc::clone(&slot);
        let counter = Arc::clone(&seen);
        let handle = SubscriptionHandle::spawn(rx, move |_: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(h) = own.lock().unwrap().as_ref() {
                h.close();
            }
        }, "test");
        *slot.lock().unwrap() = Some(handle);

        tx.send(1).unwrap();
        let _ = tx.send(2);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(slot.lock().unwrap().as_ref().unwrap().is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn listeners_closing_each_other_do_not_deadlock() {
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let done = Arc::new(AtomicUsize::new(0));
        let slots: [Arc<Mutex<Option<SubscriptionHandle>>>; 2] =
            [Arc::new(Mutex::new(None)), Arc::new(Mutex::new(None))];

        let mut senders = Vec::new();
        for me in 0..2 {
            let (tx, rx) = mpsc::unbounded_channel::<u32>();
            let other = Arc::clone(&slots[1 - me]);
            let barrier = Arc::clone(&barrier);
            let done = Arc::clone(&done);
            let handle = SubscriptionHandle::spawn(rx, move |_| {
                barrier.wait();
                let peer = other.lock().unwrap().take();
                if let Some(peer) = peer {
                    peer.close();
                }
                done.fetch_add(1, Ordering::SeqCst);
            }, "test");
            *slots[me].lock().unwrap() = Some(handle);
            senders.push(tx);
        }

        for tx in &senders {
            tx.send(0).unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while done.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("listeners deadlocked closing each other");
        assert!(slots.iter().all(|s| s.lock().unwrap().is_none()));
    }

    #[tokio::test]
    async fn drop_closes() {
        let (tx, rx) = mpsc::unbounded_channel::<u32>();
        let handle = SubscriptionHandle::spawn(rx, |_| {}, "test");
        drop(handle);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(tx.is_closed());
    }
}
