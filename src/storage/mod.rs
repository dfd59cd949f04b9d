//! Storage Backends
//!
//! Namespaced key/entry storage behind a trait, so the cache runs the same on
//! a persistent host store and on the in-memory store used for tests.

mod file;
mod memory;

use async_trait::async_trait;

use crate::cache::{CacheEntry, EntryMeta};
use crate::error::Result;

pub use file::FileStorage;
pub use memory::MemoryStorage;

// == Storage Backend ==
/// Per-namespace entry storage.
///
/// `list_keys` returns keys oldest insertion first; replacing a key counts as
/// a new insertion. Operations on a missing namespace behave as on an empty
/// one, except `put`, which creates it.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Creates the namespace if it does not exist.
    async fn open(&self, namespace: &str) -> Result<()>;

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>>;

    /// Stores the entry, replacing any entry under the same key.
    async fn put(&self, namespace: &str, entry: CacheEntry) -> Result<()>;

    /// Returns true if an entry was removed.
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool>;

    async fn list_keys(&self, namespace: &str) -> Result<Vec<String>>;

    /// Key, insertion time and size of every entry, in `list_keys` order.
    /// Never loads payload bodies.
    async fn list_entries(&self, namespace: &str) -> Result<Vec<EntryMeta>>;

    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Returns true if the namespace existed.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool>;
}
