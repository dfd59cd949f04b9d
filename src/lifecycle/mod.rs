//! Lifecycle Module
//!
//! Registration, versioned install/activate, and the clients that hold a
//! waiting version back.

mod clients;
mod controller;
mod state;
mod version;

pub use clients::{ClientGuard, ClientTracker};
pub use controller::{ControllerSettings, LifecycleController, LifecycleEvent};
pub use state::{LifecycleState, RegistrationHandle};
pub use version::{FixedVersion, OriginVersion, VersionSource};
