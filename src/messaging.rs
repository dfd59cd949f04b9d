//! Control Messages
//!
//! Ordered, best-effort messages from the application to the caching
//! process. A message the receiver is not ready for is dropped, never queued
//! without bound.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::error::{CacheError, Result};
use crate::prefetch::PrefetchReport;

// == Control Message ==
/// Wire form: `{"type":"CACHE_URLS","urls":[...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting version now
    SkipWaiting,
    /// Seed the dynamic tier
    CacheUrls { urls: Vec<String> },
    ClearCache,
    GetCacheSize,
}

// == Control Reply ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ControlReply {
    Ack { ok: bool },
    Size { size: u64 },
    Prefetched(PrefetchReport),
}

/// A message plus the slot its reply goes to, if the sender wants one.
#[derive(Debug)]
pub struct Envelope {
    pub message: ControlMessage,
    pub reply: Option<oneshot::Sender<ControlReply>>,
}

impl Envelope {
    pub fn new(message: ControlMessage) -> Self {
        Self {
            message,
            reply: None,
        }
    }

    /// Envelope whose reply arrives on the returned receiver.
    pub fn with_reply(message: ControlMessage) -> (Self, oneshot::Receiver<ControlReply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                message,
                reply: Some(tx),
            },
            rx,
        )
    }

    /// Sends the reply. A sender that stopped listening is ignored.
    pub fn respond(self, reply: ControlReply) {
        if let Some(tx) = self.reply {
            let _ = tx.send(reply);
        }
    }
}

// == Message Channel ==
pub trait MessageChannel: Send + Sync {
    /// Delivers without waiting; `MessageDeliveryFailure` if the receiver is
    /// gone or not ready.
    fn post(&self, envelope: Envelope) -> Result<()>;
}

// == In-Memory Channel ==
/// Bounded channel backed by a tokio mpsc queue.
///
/// Posts are refused until the receiving end is marked ready, so nothing
/// piles up in front of a receiver nobody drains.
#[derive(Debug, Clone)]
pub struct InMemoryChannel {
    tx: mpsc::Sender<Envelope>,
    ready: Arc<AtomicBool>,
}

/// Receiving end, drained by the caching process.
#[derive(Debug)]
pub struct MessageReceiver {
    rx: mpsc::Receiver<Envelope>,
    ready: Arc<AtomicBool>,
}

impl InMemoryChannel {
    /// # Arguments
    /// * `capacity` - Messages buffered before further posts are dropped
    pub fn bounded(capacity: usize) -> (Self, MessageReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let ready = Arc::new(AtomicBool::new(false));
        (
            Self {
                tx,
                ready: ready.clone(),
            },
            MessageReceiver { rx, ready },
        )
    }

    /// True while a receiver is draining the channel.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}

impl MessageChannel for InMemoryChannel {
    fn post(&self, envelope: Envelope) -> Result<()> {
        if !self.ready.load(Ordering::SeqCst) {
            warn!("Dropping control message {:?}: receiver not ready", envelope.message);
            return Err(CacheError::MessageDeliveryFailure(format!(
                "{:?}: receiver not ready",
                envelope.message
            )));
        }

        self.tx.try_send(envelope).map_err(|e| {
            let reason = match &e {
                mpsc::error::TrySendError::Full(_) => "receiver not ready",
                mpsc::error::TrySendError::Closed(_) => "receiver closed",
            };
            let message = &e.into_inner().message;
            warn!("Dropping control message {:?}: {}", message, reason);
            CacheError::MessageDeliveryFailure(format!("{:?}: {}", message, reason))
        })
    }
}

impl Drop for MessageReceiver {
    fn drop(&mut self) {
        self.ready.store(false, Ordering::SeqCst);
    }
}

impl MessageReceiver {
    /// Starts accepting posts. Call once something drains this receiver.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Next message, or None once every sender is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}
