//! Subscriber Lists
//!
//! Register/unregister/dispatch for in-process notifications (connectivity
//! transitions, lifecycle events). Dispatch snapshots the list before
//! invoking callbacks, so a callback may unsubscribe itself or others
//! without skipping anyone in the current round.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct SubscriberList<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

// == Subscribers ==
/// Ordered list of callbacks for events of type `T`.
pub struct Subscribers<T> {
    inner: Arc<Mutex<SubscriberList<T>>>,
}

impl<T: 'static> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SubscriberList {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Appends a callback; callbacks run in subscription order.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut list = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let id = list.next_id;
            list.next_id += 1;
            list.entries.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<SubscriberList<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            remove: Some(Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return false;
                };
                let mut list = inner.lock().unwrap_or_else(|e| e.into_inner());
                let before = list.entries.len();
                list.entries.retain(|(entry_id, _)| *entry_id != id);
                list.entries.len() != before
            })),
        }
    }

    /// Invokes every callback registered at the time of the call.
    ///
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self, event: &T) -> usize {
        let snapshot: Vec<Callback<T>> = {
            let list = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            list.entries.iter().map(|(_, cb)| cb.clone()).collect()
        };

        for callback in &snapshot {
            callback(event);
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.inner.lock().map(|l| l.entries.len()).unwrap_or(0);
        f.debug_struct("Subscribers").field("len", &len).finish()
    }
}

// == Subscription ==
/// Returned by `subscribe`; dropping it does not unsubscribe.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() -> bool + Send + Sync>>,
}

impl Subscription {
    /// Removes the callback. Returns false if it was already gone.
    pub fn unsubscribe(mut self) -> bool {
        self.remove.take().map(|remove| remove()).unwrap_or(false)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
