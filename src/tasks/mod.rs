//! Background Tasks Module
//!
//! Long-running tasks spawned next to the control server.
//!
//! # Tasks
//! - Expiry sweep: applies age and count bounds to the active version's tiers
//! - Message loop: executes control messages posted to the caching process

mod messages;
mod sweep;

pub use messages::spawn_message_loop;
pub use sweep::spawn_sweep_task;
