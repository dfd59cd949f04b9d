//! Message Loop Task
//!
//! Drains the control channel in order, executing each message inside the
//! caching process and answering senders that asked for a reply.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::manager::CacheManager;
use crate::messaging::{ControlReply, MessageReceiver};

/// Spawns the task that executes posted control messages.
///
/// Posts are accepted from this call on. The task ends when every sender is
/// gone; abort it on shutdown, after which posts fail again.
pub fn spawn_message_loop(manager: CacheManager, mut receiver: MessageReceiver) -> JoinHandle<()> {
    receiver.set_ready();
    tokio::spawn(async move {
        info!("Control message loop started");

        while let Some(envelope) = receiver.recv().await {
            debug!("Control message: {:?}", envelope.message);
            match manager.handle_message(envelope.message.clone()).await {
                Ok(reply) => envelope.respond(reply),
                Err(e) => {
                    warn!("Control message {:?} failed: {}", envelope.message, e);
                    envelope.respond(ControlReply::Ack { ok: false });
                }
            }
        }

        info!("Control message loop stopped");
    })
}
