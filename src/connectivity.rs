//! Connectivity Monitor
//!
//! Passive online/offline state fed by the host's reachability signal.
//! Subscribers hear about genuine transitions only.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::events::{Subscribers, Subscription};

#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
    subscribers: Subscribers<bool>,
}

impl ConnectivityMonitor {
    /// Seeds the state from the host signal at construction.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            subscribers: Subscribers::new(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Point-in-time read; does not touch the network.
    pub fn is_offline(&self) -> bool {
        !self.is_online()
    }

    /// Registers a callback receiving the new `online` value on each transition.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(move |online: &bool| callback(*online))
    }

    /// Feeds a host reachability signal.
    ///
    /// Returns true if it was a transition; repeated identical states are ignored.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        info!(
            "Connectivity changed: {}",
            if online { "online" } else { "offline" }
        );
        self.subscribers.dispatch(&online);
        true
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
