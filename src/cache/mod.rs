//! Transfer-id cache
//!
//! The messaging channel hands back a native transfer id after every fresh
//! upload; reusing that id on later sends skips the upload entirely. This
//! cache maps content fingerprints to those ids and persists them as a flat
//! JSON document.
//!
//! The fingerprint is the SHA-256 of the file's bytes (`hash:<hex>`), so a
//! re-downloaded or renamed copy of the same content still hits. When the
//! file cannot be read the path itself is the key (`path:<path>`), weaker
//! but still useful.
//!
//! A stale entry surfaces as an `InvalidIdentifier` channel error on send;
//! the delivery loop evicts it with [`TransferCache::remove`] and falls back
//! to a fresh upload.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Persistent fingerprint -> native transfer id cache
pub struct TransferCache {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl TransferCache {
    /// Open the cache, loading existing entries if the file exists.
    ///
    /// An unreadable or corrupt cache file is not fatal: the cache starts
    /// empty and every item just re-uploads once.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => {
                    tracing::info!(count = entries.len(), "Loaded transfer-id cache");
                    entries
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Transfer cache is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Fingerprint key for a file.
    pub async fn key_for(&self, file: &Path) -> String {
        match tokio::fs::read(file).await {
            Ok(bytes) => {
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                format!("hash:{:x}", hasher.finalize())
            }
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "Falling back to path key");
                format!("path:{}", file.display())
            }
        }
    }

    /// Cached transfer id for a key.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    /// Record a transfer id and persist.
    pub async fn set(&self, key: &str, transfer_id: &str) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), transfer_id.to_string());
        self.persist(&entries).await;
    }

    /// Evict a stale entry and persist.
    pub async fn remove(&self, key: &str) {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            tracing::info!(key, "Evicted stale transfer id");
            self.persist(&entries).await;
        }
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.persist(&entries).await;
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Failure to persist costs re-uploads, not correctness, so it only
    /// warns.
    async fn persist(&self, entries: &BTreeMap<String, String>) {
        let json = match serde_json::to_string_pretty(entries) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Could not serialize transfer cache");
                return;
            }
        };

        let tmp = self.path.with_extension("tmp");
        let result = async {
            tokio::fs::write(&tmp, json).await?;
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "Could not persist transfer cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_roundtrip_and_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let cache = TransferCache::open(&path).await;
        assert!(cache.is_empty().await);

        cache.set("hash:abc", "id-1").await;
        assert_eq!(cache.get("hash:abc").await.as_deref(), Some("id-1"));
        assert_eq!(cache.len().await, 1);

        // A fresh instance sees the persisted entry.
        let reopened = TransferCache::open(&path).await;
        assert_eq!(reopened.get("hash:abc").await.as_deref(), Some("id-1"));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let dir = TempDir::new().unwrap();
        let cache = TransferCache::open(dir.path().join("cache.json")).await;

        cache.set("hash:abc", "id-1").await;
        cache.set("hash:def", "id-2").await;

        cache.remove("hash:abc").await;
        assert!(cache.get("hash:abc").await.is_none());
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_corrupt_cache_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let cache = TransferCache::open(&path).await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_key_is_content_hash_regardless_of_name() {
        let dir = TempDir::new().unwrap();
        let cache = TransferCache::open(dir.path().join("cache.json")).await;

        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        tokio::fs::write(&a, b"same bytes").await.unwrap();
        tokio::fs::write(&b, b"same bytes").await.unwrap();

        let key_a = cache.key_for(&a).await;
        let key_b = cache.key_for(&b).await;
        assert_eq!(key_a, key_b);
        assert!(key_a.starts_with("hash:"));
    }

    #[tokio::test]
    async fn test_unreadable_file_falls_back_to_path_key() {
        let dir = TempDir::new().unwrap();
        let cache = TransferCache::open(dir.path().join("cache.json")).await;

        let missing = dir.path().join("missing.jpg");
        let key = cache.key_for(&missing).await;
        assert!(key.starts_with("path:"));
    }
}
