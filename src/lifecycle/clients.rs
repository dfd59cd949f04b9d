//! Open application clients controlled by the active version.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct ClientTracker {
    open: AtomicUsize,
    released: Notify,
}

impl ClientTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_clients(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Registers one client; it is released when the guard drops.
    pub fn claim(self: &Arc<Self>) -> ClientGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        ClientGuard {
            tracker: self.clone(),
        }
    }

    /// Resolves once no client is open.
    pub async fn all_released(&self) {
        loop {
            let notified = self.released.notified();
            if self.open_clients() == 0 {
                return;
            }
            notified.await;
        }
    }
}

// == Client Guard ==
/// One open client referencing the active version.
#[derive(Debug)]
#[must_use = "the client is released as soon as the guard is dropped"]
pub struct ClientGuard {
    tracker: Arc<ClientTracker>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        if self.tracker.open.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.released.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_guards_count_clients() {
        let tracker = Arc::new(ClientTracker::new());
        let a = tracker.claim();
        let b = tracker.claim();
        assert_eq!(tracker.open_clients(), 2);

        drop(a);
        assert_eq!(tracker.open_clients(), 1);
        drop(b);
        assert_eq!(tracker.open_clients(), 0);
    }

    #[tokio::test]
    async fn test_all_released_wakes_on_last_drop() {
        let tracker = Arc::new(ClientTracker::new());
        let guard = tracker.claim();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.all_released().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_all_released_immediate_when_none_open() {
        let tracker = ClientTracker::new();
        tracker.all_released().await;
    }
}
