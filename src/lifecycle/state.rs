//! Lifecycle states and the registration handle.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

// == Lifecycle State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Idle,
    /// First-time registration in progress
    Registering,
    /// A new version found by an update check is installing
    Installing,
    Installed,
    /// Installed but held back while the previous version controls clients
    Waiting,
    Activating,
    Activated,
    /// Superseded or unregistered; never leaves this state
    Redundant,
}

impl LifecycleState {
    /// Legal edges of the state machine.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Idle, Registering)
                | (Idle, Installing)
                | (Registering, Installed)
                | (Installing, Installed)
                | (Installed, Waiting)
                | (Installed, Activating)
                | (Waiting, Activating)
                | (Activating, Activated)
        ) || (next == Redundant && self != Redundant)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Registering => "registering",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Waiting => "waiting",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

// == Registration Handle ==
/// Lifecycle state of one version of the caching process.
#[derive(Debug)]
pub struct RegistrationHandle {
    id: u64,
    version: String,
    state: watch::Sender<LifecycleState>,
}

impl RegistrationHandle {
    pub(crate) fn new(id: u64, version: impl Into<String>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            id,
            version: version.into(),
            state,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Receiver that observes every later transition.
    pub fn watch(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Moves to `next` if the edge is legal. Returns false otherwise.
    pub(crate) fn transition(&self, next: LifecycleState) -> bool {
        let current = self.state();
        if !current.can_transition_to(next) {
            warn!(
                "Ignoring illegal transition {} -> {} for {}",
                current, next, self.version
            );
            return false;
        }
        debug!("{} ({}): {} -> {}", self.version, self.id, current, next);
        self.state.send_replace(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_path() {
        let handle = RegistrationHandle::new(1, "v1");
        assert_eq!(handle.state(), LifecycleState::Idle);

        for next in [
            LifecycleState::Registering,
            LifecycleState::Installed,
            LifecycleState::Activating,
            LifecycleState::Activated,
            LifecycleState::Redundant,
        ] {
            assert!(handle.transition(next));
        }
        assert_eq!(handle.state(), LifecycleState::Redundant);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let handle = RegistrationHandle::new(1, "v1");
        assert!(!handle.transition(LifecycleState::Activated));
        assert!(!handle.transition(LifecycleState::Waiting));
        assert_eq!(handle.state(), LifecycleState::Idle);

        handle.transition(LifecycleState::Redundant);
        assert!(!handle.transition(LifecycleState::Registering));
        assert!(!handle.transition(LifecycleState::Redundant));
    }

    #[tokio::test]
    async fn test_watch_observes_transitions() {
        let handle = RegistrationHandle::new(7, "v2");
        let mut rx = handle.watch();

        handle.transition(LifecycleState::Installing);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LifecycleState::Installing);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&LifecycleState::Waiting).unwrap();
        assert_eq!(json, "\"waiting\"");
    }
}
