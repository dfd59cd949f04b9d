//! Cache Inspector
//!
//! Aggregates and formats the total payload footprint across namespaces.

use crate::error::Result;
use crate::storage::StorageBackend;

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Sums payload sizes over every namespace, regardless of version.
pub async fn get_cache_size(storage: &dyn StorageBackend) -> Result<u64> {
    let mut total = 0;
    for namespace in storage.list_namespaces().await? {
        total += storage
            .list_entries(&namespace)
            .await?
            .iter()
            .map(|meta| meta.size)
            .sum::<u64>();
    }
    Ok(total)
}

/// Renders a byte count with base-1024 units, rounded to two decimals.
///
/// The unit is the largest one not exceeding `bytes`, capped at GB.
pub fn format_cache_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut scale: u64 = 1;
    while unit + 1 < UNITS.len() && bytes >= scale * 1024 {
        scale *= 1024;
        unit += 1;
    }

    let value = (bytes as f64 / scale as f64 * 100.0).round() / 100.0;
    format!("{} {}", value, UNITS[unit])
}

/// Index of the unit `format_cache_size` picks for `bytes`.
pub fn size_unit_index(bytes: u64) -> usize {
    let formatted = format_cache_size(bytes);
    let unit = formatted.rsplit(' ').next().unwrap_or("Bytes");
    UNITS.iter().position(|u| *u == unit).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, Snapshot};
    use crate::storage::MemoryStorage;

    #[test]
    fn test_format_zero_and_exact_units() {
        assert_eq!(format_cache_size(0), "0 Bytes");
        assert_eq!(format_cache_size(1), "1 Bytes");
        assert_eq!(format_cache_size(1023), "1023 Bytes");
        assert_eq!(format_cache_size(1024), "1 KB");
        assert_eq!(format_cache_size(1024 * 1024), "1 MB");
        assert_eq!(format_cache_size(1024 * 1024 * 1024), "1 GB");
    }

    #[test]
    fn test_format_rounds_to_two_decimals() {
        assert_eq!(format_cache_size(1536), "1.5 KB");
        assert_eq!(format_cache_size(1100), "1.07 KB");
    }

    #[test]
    fn test_format_caps_at_gb() {
        assert_eq!(format_cache_size(2 * 1024u64.pow(4)), "2048 GB");
        assert_eq!(size_unit_index(u64::MAX), 3);
    }

    #[tokio::test]
    async fn test_cache_size_spans_namespaces() {
        let storage = MemoryStorage::new();
        storage
            .put("app-v1-static", CacheEntry::new("/a.js", Snapshot::ok(vec![0u8; 100])))
            .await
            .unwrap();
        storage
            .put("app-v0-pages", CacheEntry::new("/", Snapshot::ok(vec![0u8; 24])))
            .await
            .unwrap();

        assert_eq!(get_cache_size(&storage).await.unwrap(), 124);
    }

    #[tokio::test]
    async fn test_cache_size_empty() {
        let storage = MemoryStorage::new();
        assert_eq!(get_cache_size(&storage).await.unwrap(), 0);
    }
}
