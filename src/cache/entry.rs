//! Cache Entry Module
//!
//! Defines cached resource snapshots and the entries that hold them.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// == Snapshot ==
/// Opaque copy of a network response, as stored in and served from a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// HTTP status code of the original response
    pub status: u16,
    /// Content type reported by the origin, if any
    pub content_type: Option<String>,
    /// Response body
    pub body: Bytes,
}

impl Snapshot {
    /// Creates a 200 snapshot with no content type.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content_type: None,
            body: body.into(),
        }
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Only 2xx snapshots are written to a tier.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }
}

// == Cache Entry ==
/// A single entry of a tier, keyed by resource key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Resource key (path+query, or full URL when cross-origin)
    pub key: String,
    /// Stored response
    pub payload: Snapshot,
    /// Insertion timestamp (Unix milliseconds)
    pub inserted_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(key: impl Into<String>, payload: Snapshot) -> Self {
        Self::at(key, payload, current_timestamp_ms())
    }

    /// Creates an entry with an explicit insertion time.
    pub fn at(key: impl Into<String>, payload: Snapshot, inserted_at: u64) -> Self {
        Self {
            key: key.into(),
            payload,
            inserted_at,
        }
    }

    // == Age ==
    /// Returns the entry age in milliseconds relative to `now`.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.inserted_at)
    }

    // == Is Expired ==
    /// An entry is expired once its age is strictly greater than `max_age_ms`.
    pub fn is_expired(&self, max_age_ms: u64, now: u64) -> bool {
        self.age_ms(now) > max_age_ms
    }

    /// Bookkeeping view of this entry.
    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            key: self.key.clone(),
            inserted_at: self.inserted_at,
            size: self.payload.size(),
        }
    }
}

// == Entry Meta ==
/// What eviction and the inspector need to know about an entry, without its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub key: String,
    pub inserted_at: u64,
    /// Payload size in bytes
    pub size: u64,
}

impl EntryMeta {
    /// Same rule as `CacheEntry::is_expired`.
    pub fn is_expired(&self, max_age_ms: u64, now: u64) -> bool {
        now.saturating_sub(self.inserted_at) > max_age_ms
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
