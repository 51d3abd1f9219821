//! Per-room change notification.
//!
//! Every waiting reader owns a [`Subscription`] backed by a single-slot
//! channel. [`Notifier::notify`] posts to each slot without blocking and
//! leaves already-signalled slots alone, so a burst of updates wakes a reader
//! once. Dropping a subscription unregisters it, which is how a cancelled
//! request releases its slot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

#[derive(Debug, Default)]
pub struct Notifier {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, mpsc::Sender<()>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(1);
        self.lock().insert(id, tx);
        Subscription {
            id,
            rx,
            notifier: Arc::clone(self),
        }
    }

    /// Wakes every subscriber. Returns how many slots received a fresh signal.
    pub fn notify(&self) -> usize {
        self.lock()
            .values()
            .filter(|tx| tx.try_send(()).is_ok())
            .count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().remove(&id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::Sender<()>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<()>,
    notifier: Arc<Notifier>,
}

impl Subscription {
    /// Resolves once a change has been signalled since the last one consumed.
    pub async fn changed(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Like [`Subscription::changed`] but gives up after `timeout`.
    /// Returns `false` on timeout.
    pub async fn wait(&mut self, timeout: Duration) -> bool {
        tokio::select! {
            signal = self.rx.recv() => signal.is_some(),
            _ = sleep(timeout) => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.notifier.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_notify_wakes_pending_subscriber() {
        let notifier = Arc::new(Notifier::new());
        let mut sub = notifier.subscribe();

        let mut changed = task::spawn(sub.changed());
        assert_pending!(changed.poll());

        assert_eq!(notifier.notify(), 1);
        assert!(changed.is_woken());
        assert!(assert_ready!(changed.poll()));
    }

    #[test]
    fn test_bursts_are_coalesced() {
        let notifier = Arc::new(Notifier::new());
        let mut sub = notifier.subscribe();

        assert_eq!(notifier.notify(), 1);
        assert_eq!(notifier.notify(), 0);
        assert_eq!(notifier.notify(), 0);

        {
            let mut first = task::spawn(sub.changed());
            assert!(assert_ready!(first.poll()));
        }
        let mut second = task::spawn(sub.changed());
        assert_pending!(second.poll());
    }

    #[test]
    fn test_every_subscriber_is_woken() {
        let notifier = Arc::new(Notifier::new());
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 2);

        assert_eq!(notifier.notify(), 2);
        assert!(assert_ready!(task::spawn(a.changed()).poll()));
        assert!(assert_ready!(task::spawn(b.changed()).poll()));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let notifier = Arc::new(Notifier::new());
        let sub = notifier.subscribe();
        let other = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 2);

        drop(sub);
        assert_eq!(notifier.subscriber_count(), 1);
        drop(other);
        assert_eq!(notifier.subscriber_count(), 0);
        assert_eq!(notifier.notify(), 0);
    }

    #[tokio::test]
    async fn test_wait_times_out_without_change() {
        let notifier = Arc::new(Notifier::new());
        let mut sub = notifier.subscribe();
        assert!(!sub.wait(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_wait_returns_on_notify() {
        let notifier = Arc::new(Notifier::new());
        let mut sub = notifier.subscribe();

        let waker = Arc::clone(&notifier);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waker.notify();
        });

        assert!(sub.wait(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_cancelled_wait_releases_subscription() {
        let notifier = Arc::new(Notifier::new());
        let waiting = {
            let notifier = Arc::clone(&notifier);
            tokio::spawn(async move {
                let mut sub = notifier.subscribe();
                sub.wait(Duration::from_secs(60)).await
            })
        };

        while notifier.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
        waiting.abort();
        assert!(waiting.await.unwrap_err().is_cancelled());
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
