//! In-memory storage backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheEntry, EntryMeta, InsertionOrder};
use crate::error::{CacheError, Result};
use crate::storage::StorageBackend;

#[derive(Debug, Default)]
struct Namespace {
    entries: HashMap<String, CacheEntry>,
    order: InsertionOrder,
}

impl Namespace {
    fn bytes(&self) -> u64 {
        self.entries.values().map(|e| e.payload.size()).sum()
    }
}

// == Memory Storage ==
/// Deterministic in-process backend with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    namespaces: RwLock<BTreeMap<String, Namespace>>,
    quota_bytes: Option<u64>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes that would push the total payload size above `quota_bytes`.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// While unavailable, `open` and `put` fail as a broken host store would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CacheError::Storage("storage backend unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    /// Total payload bytes across all namespaces.
    pub async fn total_bytes(&self) -> u64 {
        self.namespaces.read().await.values().map(Namespace::bytes).sum()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn open(&self, namespace: &str) -> Result<()> {
        self.check_available()?;
        self.namespaces
            .write()
            .await
            .entry(namespace.to_string())
            .or_default();
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .and_then(|ns| ns.entries.get(key).cloned()))
    }

    async fn put(&self, namespace: &str, entry: CacheEntry) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::CacheWriteFailure(
                "storage backend unavailable".to_string(),
            ));
        }

        let mut namespaces = self.namespaces.write().await;

        if let Some(quota) = self.quota_bytes {
            let total: u64 = namespaces.values().map(Namespace::bytes).sum();
            let replaced = namespaces
                .get(namespace)
                .and_then(|ns| ns.entries.get(&entry.key))
                .map(|e| e.payload.size())
                .unwrap_or(0);
            let after = total - replaced + entry.payload.size();
            if after > quota {
                return Err(CacheError::CacheWriteFailure(format!(
                    "quota of {} bytes exceeded ({} bytes requested)",
                    quota, after
                )));
            }
        }

        let ns = namespaces.entry(namespace.to_string()).or_default();
        ns.order.insert(&entry.key);
        ns.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let mut namespaces = self.namespaces.write().await;
        match namespaces.get_mut(namespace) {
            Some(ns) => {
                ns.order.remove(key);
                Ok(ns.entries.remove(key).is_some())
            }
            None => Ok(false),
        }
    }

    async fn list_keys(&self, namespace: &str) -> Result<Vec<String>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .map(|ns| ns.order.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_entries(&self, namespace: &str) -> Result<Vec<EntryMeta>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .map(|ns| {
                ns.order
                    .keys()
                    .filter_map(|key| ns.entries.get(key))
                    .map(CacheEntry::meta)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.namespaces.read().await.keys().cloned().collect())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces.write().await.remove(namespace).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Snapshot;

    fn entry(key: &str, body: &str) -> CacheEntry {
        CacheEntry::new(key, Snapshot::ok(body.to_string()))
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let storage = MemoryStorage::new();
        storage.put("ns", entry("/a", "hello")).await.unwrap();

        let found = storage.get("ns", "/a").await.unwrap().unwrap();
        assert_eq!(found.payload.body, "hello");
        assert!(storage.get("ns", "/b").await.unwrap().is_none());
        assert!(storage.get("other", "/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_keys_in_insertion_order() {
        let storage = MemoryStorage::new();
        storage.put("ns", entry("/a", "1")).await.unwrap();
        storage.put("ns", entry("/b", "2")).await.unwrap();
        storage.put("ns", entry("/c", "3")).await.unwrap();
        storage.put("ns", entry("/a", "4")).await.unwrap();

        let keys = storage.list_keys("ns").await.unwrap();
        assert_eq!(keys, vec!["/b", "/c", "/a"]);
    }

    #[tokio::test]
    async fn test_list_entries_reports_metadata_in_order() {
        let storage = MemoryStorage::new();
        storage.put("ns", CacheEntry::at("/a", Snapshot::ok("12345"), 10)).await.unwrap();
        storage.put("ns", CacheEntry::at("/b", Snapshot::ok("1"), 20)).await.unwrap();

        let entries = storage.list_entries("ns").await.unwrap();
        assert_eq!(
            entries,
            vec![
                EntryMeta { key: "/a".to_string(), inserted_at: 10, size: 5 },
                EntryMeta { key: "/b".to_string(), inserted_at: 20, size: 1 },
            ]
        );
        assert!(storage.list_entries("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_delete_namespace() {
        let storage = MemoryStorage::new();
        storage.put("ns", entry("/a", "1")).await.unwrap();

        assert!(storage.delete("ns", "/a").await.unwrap());
        assert!(!storage.delete("ns", "/a").await.unwrap());
        assert!(!storage.delete("missing", "/a").await.unwrap());

        assert!(storage.delete_namespace("ns").await.unwrap());
        assert!(!storage.delete_namespace("ns").await.unwrap());
        assert!(storage.list_namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_creates_empty_namespace() {
        let storage = MemoryStorage::new();
        storage.open("app-v1-static").await.unwrap();
        storage.open("app-v1-static").await.unwrap();

        assert_eq!(storage.list_namespaces().await.unwrap(), vec!["app-v1-static"]);
        assert!(storage.list_keys("app-v1-static").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quota_rejects_oversized_write() {
        let storage = MemoryStorage::with_quota(8);
        storage.put("ns", entry("/a", "1234")).await.unwrap();
        storage.put("ns", entry("/b", "1234")).await.unwrap();

        let result = storage.put("ns", entry("/c", "1")).await;
        assert!(matches!(result, Err(CacheError::CacheWriteFailure(_))));

        // Replacing an entry only counts the difference
        storage.put("ns", entry("/a", "abcd")).await.unwrap();
        assert_eq!(storage.total_bytes().await, 8);
    }

    #[tokio::test]
    async fn test_unavailable_backend() {
        let storage = MemoryStorage::new();
        storage.set_unavailable(true);

        assert!(matches!(storage.open("ns").await, Err(CacheError::Storage(_))));
        assert!(matches!(
            storage.put("ns", entry("/a", "1")).await,
            Err(CacheError::CacheWriteFailure(_))
        ));

        storage.set_unavailable(false);
        assert!(storage.open("ns").await.is_ok());
    }
}
