//! Filesystem storage backend.
//!
//! Each namespace is a directory holding `index.json` (keys in insertion
//! order plus metadata) and one blob file per entry body.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{CacheEntry, EntryMeta, Snapshot};
use crate::error::{CacheError, Result};
use crate::storage::StorageBackend;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Index {
    next_blob: u64,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    key: String,
    inserted_at: u64,
    size: u64,
    status: u16,
    content_type: Option<String>,
    blob: String,
}

// == File Storage ==
/// Persistent backend rooted at a directory; survives host restarts.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
    // Serializes index read-modify-write cycles
    lock: Mutex<()>,
}

impl FileStorage {
    /// Creates the root directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| CacheError::Storage(format!("cannot create {}: {}", root.display(), e)))?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        if namespace.is_empty()
            || namespace.contains('/')
            || namespace.contains('\\')
            || namespace.starts_with('.')
        {
            return Err(CacheError::Storage(format!(
                "invalid namespace name '{}'",
                namespace
            )));
        }
        Ok(self.root.join(namespace))
    }

    async fn read_index(dir: &Path) -> Result<Option<Index>> {
        match fs::read(dir.join(INDEX_FILE)).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| CacheError::Storage(format!("corrupt index in {}: {}", dir.display(), e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Storage(e.to_string())),
        }
    }

    async fn write_index(dir: &Path, index: &Index) -> std::io::Result<()> {
        let raw = serde_json::to_vec_pretty(index)?;
        let tmp = dir.join("index.json.tmp");
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, dir.join(INDEX_FILE)).await
    }

    async fn remove_blob(dir: &Path, blob: &str) {
        if let Err(e) = fs::remove_file(dir.join(blob)).await {
            if e.kind() != ErrorKind::NotFound {
                debug!("Failed to remove blob {}: {}", blob, e);
            }
        }
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn open(&self, namespace: &str) -> Result<()> {
        let dir = self.namespace_dir(namespace)?;
        let _guard = self.lock.lock().await;

        if Self::read_index(&dir).await?.is_some() {
            return Ok(());
        }
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        Self::write_index(&dir, &Index::default())
            .await
            .map_err(|e| CacheError::Storage(e.to_string()))
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>> {
        let dir = self.namespace_dir(namespace)?;
        let _guard = self.lock.lock().await;

        let Some(index) = Self::read_index(&dir).await? else {
            return Ok(None);
        };
        let Some(meta) = index.entries.iter().find(|e| e.key == key) else {
            return Ok(None);
        };

        let body = fs::read(dir.join(&meta.blob))
            .await
            .map_err(|e| CacheError::Storage(format!("missing blob for '{}': {}", key, e)))?;

        Ok(Some(CacheEntry::at(
            meta.key.clone(),
            Snapshot {
                status: meta.status,
                content_type: meta.content_type.clone(),
                body: Bytes::from(body),
            },
            meta.inserted_at,
        )))
    }

    async fn put(&self, namespace: &str, entry: CacheEntry) -> Result<()> {
        let dir = self.namespace_dir(namespace)?;
        let _guard = self.lock.lock().await;
        let write_err = |e: std::io::Error| CacheError::CacheWriteFailure(e.to_string());

        fs::create_dir_all(&dir).await.map_err(write_err)?;
        let mut index = Self::read_index(&dir).await?.unwrap_or_default();

        let blob = format!("{:016x}.bin", index.next_blob);
        index.next_blob += 1;
        fs::write(dir.join(&blob), &entry.payload.body)
            .await
            .map_err(write_err)?;

        let replaced = index
            .entries
            .iter()
            .position(|e| e.key == entry.key)
            .map(|pos| index.entries.remove(pos));

        index.entries.push(IndexEntry {
            size: entry.payload.size(),
            key: entry.key,
            inserted_at: entry.inserted_at,
            status: entry.payload.status,
            content_type: entry.payload.content_type,
            blob,
        });
        Self::write_index(&dir, &index).await.map_err(write_err)?;

        if let Some(old) = replaced {
            Self::remove_blob(&dir, &old.blob).await;
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let dir = self.namespace_dir(namespace)?;
        let _guard = self.lock.lock().await;

        let Some(mut index) = Self::read_index(&dir).await? else {
            return Ok(false);
        };
        let Some(pos) = index.entries.iter().position(|e| e.key == key) else {
            return Ok(false);
        };

        let removed = index.entries.remove(pos);
        Self::write_index(&dir, &index)
            .await
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        Self::remove_blob(&dir, &removed.blob).await;
        Ok(true)
    }

    async fn list_keys(&self, namespace: &str) -> Result<Vec<String>> {
        let dir = self.namespace_dir(namespace)?;
        let _guard = self.lock.lock().await;

        Ok(Self::read_index(&dir)
            .await?
            .map(|index| index.entries.into_iter().map(|e| e.key).collect())
            .unwrap_or_default())
    }

    async fn list_entries(&self, namespace: &str) -> Result<Vec<EntryMeta>> {
        let dir = self.namespace_dir(namespace)?;
        let _guard = self.lock.lock().await;

        Ok(Self::read_index(&dir)
            .await?
            .map(|index| {
                index
                    .entries
                    .into_iter()
                    .map(|e| EntryMeta {
                        key: e.key,
                        inserted_at: e.inserted_at,
                        size: e.size,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        let mut names = Vec::new();

        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::Storage(e.to_string()))?
        {
            let is_dir = item.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if let (true, Some(name)) = (is_dir, item.file_name().to_str()) {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        let dir = self.namespace_dir(namespace)?;
        let _guard = self.lock.lock().await;

        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Storage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, body: &'static str) -> CacheEntry {
        CacheEntry::new(key, Snapshot::ok(body).with_content_type("text/html"))
    }

    #[tokio::test]
    async fn test_put_get_roundtrip_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path()).await.unwrap();

        storage.put("app-v1-pages", entry("/", "home")).await.unwrap();
        let found = storage.get("app-v1-pages", "/").await.unwrap().unwrap();

        assert_eq!(found.payload.body, "home");
        assert_eq!(found.payload.content_type.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let storage = FileStorage::new(tmp.path()).await.unwrap();
            storage.put("ns", entry("/a", "1")).await.unwrap();
            storage.put("ns", entry("/b", "2")).await.unwrap();
        }

        let storage = FileStorage::new(tmp.path()).await.unwrap();
        assert_eq!(storage.list_keys("ns").await.unwrap(), vec!["/a", "/b"]);
        assert_eq!(storage.list_namespaces().await.unwrap(), vec!["ns"]);
    }

    #[tokio::test]
    async fn test_replace_moves_key_to_newest() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path()).await.unwrap();

        storage.put("ns", entry("/a", "1")).await.unwrap();
        storage.put("ns", entry("/b", "2")).await.unwrap();
        storage.put("ns", entry("/a", "3")).await.unwrap();

        assert_eq!(storage.list_keys("ns").await.unwrap(), vec!["/b", "/a"]);
        let a = storage.get("ns", "/a").await.unwrap().unwrap();
        assert_eq!(a.payload.body, "3");
    }

    #[tokio::test]
    async fn test_list_entries_reads_index_only() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path()).await.unwrap();
        storage.put("ns", CacheEntry::at("/a", Snapshot::ok("hello"), 42)).await.unwrap();

        // Blob gone: a body read would fail, the listing must not
        for blob in std::fs::read_dir(tmp.path().join("ns")).unwrap() {
            let path = blob.unwrap().path();
            if path.extension().and_then(|e| e.to_str()) == Some("bin") {
                std::fs::remove_file(path).unwrap();
            }
        }

        assert!(storage.get("ns", "/a").await.is_err());
        let entries = storage.list_entries("ns").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].inserted_at, 42);
        assert_eq!(entries[0].size, 5);
    }

    #[tokio::test]
    async fn test_delete_namespace_removes_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path()).await.unwrap();

        storage.open("ns").await.unwrap();
        storage.put("ns", entry("/a", "1")).await.unwrap();
        assert!(storage.delete("ns", "/a").await.unwrap());
        assert!(storage.delete_namespace("ns").await.unwrap());
        assert!(!tmp.path().join("ns").exists());
        assert!(!storage.delete_namespace("ns").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_path_like_namespace() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path()).await.unwrap();

        assert!(storage.open("../escape").await.is_err());
        assert!(storage.list_keys("a/b").await.is_err());
    }
}
