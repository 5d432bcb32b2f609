//! Content-addressed TTS audio cache.
//!
//! Keys hash the synthesized text and the voice identity, so identical
//! requests map to the same entry. Entries are write-once, read-many;
//! concurrent writers racing on a key are safe because content per key is
//! deterministic (last-writer-wins). Cache failures are never surfaced to the
//! pipeline; a broken cache degrades to re-synthesis.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

const METADATA_FILE: &str = "cache_metadata.json";

/// Content-addressed key for one synthesis result.
pub fn cache_key(text: &str, voice_identity: &str, speed: f32) -> String {
    let content = format!("{}_{}_{}", text, voice_identity, speed);
    format!("{:x}", md5::compute(content.as_bytes()))
}

#[async_trait]
pub trait TtsCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: &str, bytes: &[u8]);
    /// Drop entries older than `max_age`; returns how many were removed.
    async fn evict_older_than(&self, max_age: Duration) -> usize;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    size: u64,
    created_at: DateTime<Utc>,
}

/// Filesystem cache: one audio blob per key plus a JSON metadata sidecar.
pub struct FsTtsCache {
    dir: PathBuf,
    index: DashMap<String, CacheEntry>,
}

impl FsTtsCache {
    pub fn open(dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&dir)?;

        let index = DashMap::new();
        let metadata_path = dir.join(METADATA_FILE);
        if metadata_path.exists() {
            match std::fs::read_to_string(&metadata_path) {
                Ok(json) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&json) {
                    Ok(entries) => {
                        for (key, entry) in entries {
                            index.insert(key, entry);
                        }
                    }
                    Err(e) => warn!("ignoring unreadable cache metadata: {}", e),
                },
                Err(e) => warn!("failed to read cache metadata: {}", e),
            }
        }

        debug!(entries = index.len(), dir = %dir.display(), "opened TTS cache");
        Ok(Self { dir, index })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.mp3", key))
    }

    async fn save_metadata(&self) {
        let snapshot: HashMap<String, CacheEntry> = self
            .index
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize cache metadata: {}", e);
                return;
            }
        };
        if let Err(e) = tokio::fs::write(self.dir.join(METADATA_FILE), json).await {
            warn!("failed to persist cache metadata: {}", e);
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[async_trait]
impl TtsCache for FsTtsCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.index.get(key)?;
        match tokio::fs::read(self.blob_path(key)).await {
            Ok(bytes) => {
                debug!(key, "TTS cache hit");
                Some(bytes)
            }
            Err(_) => {
                // Blob vanished out from under the index; drop the entry.
                self.index.remove(key);
                None
            }
        }
    }

    async fn put(&self, key: &str, bytes: &[u8]) {
        if let Err(e) = tokio::fs::write(self.blob_path(key), bytes).await {
            warn!(key, "failed to write cache blob: {}", e);
            return;
        }
        self.index.insert(
            key.to_string(),
            CacheEntry {
                size: bytes.len() as u64,
                created_at: Utc::now(),
            },
        );
        self.save_metadata().await;
        debug!(key, bytes = bytes.len(), "cached synthesis result");
    }

    async fn evict_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::days(36_500));

        let stale: Vec<String> = self
            .index
            .iter()
            .filter(|e| e.value().created_at < cutoff)
            .map(|e| e.key().clone())
            .collect();

        for key in &stale {
            self.index.remove(key);
            if let Err(e) = tokio::fs::remove_file(self.blob_path(key)).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(key, "failed to remove stale cache blob: {}", e);
                }
            }
        }

        if !stale.is_empty() {
            self.save_metadata().await;
            debug!(evicted = stale.len(), "evicted stale cache entries");
        }
        stale.len()
    }
}

/// In-memory cache for tests and cache-less deployments.
#[derive(Default)]
pub struct MemoryTtsCache {
    entries: DashMap<String, (Vec<u8>, DateTime<Utc>)>,
}

impl MemoryTtsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TtsCache for MemoryTtsCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).map(|e| e.value().0.clone())
    }

    async fn put(&self, key: &str, bytes: &[u8]) {
        self.entries
            .insert(key.to_string(), (bytes.to_vec(), Utc::now()));
    }

    async fn evict_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let before = self.entries.len();
        self.entries.retain(|_, (_, created_at)| *created_at >= cutoff);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_stable_and_voice_scoped() {
        let a = cache_key("hello", "ai_c1", 1.0);
        let b = cache_key("hello", "ai_c1", 1.0);
        let other_voice = cache_key("hello", "ai_c2", 1.0);
        let other_speed = cache_key("hello", "ai_c1", 1.25);

        assert_eq!(a, b);
        assert_ne!(a, other_voice);
        assert_ne!(a, other_speed);
        assert_eq!(a.len(), 32);
    }

    #[tokio::test]
    async fn test_fs_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsTtsCache::open(dir.path().to_path_buf()).unwrap();

        let key = cache_key("line", "ai_c1", 1.0);
        assert!(cache.get(&key).await.is_none());

        cache.put(&key, b"encoded-audio").await;
        assert_eq!(cache.get(&key).await.unwrap(), b"encoded-audio");

        // A fresh handle over the same directory sees the entry.
        let reopened = FsTtsCache::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.get(&key).await.unwrap(), b"encoded-audio");
    }

    #[tokio::test]
    async fn test_fs_cache_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsTtsCache::open(dir.path().to_path_buf()).unwrap();

        cache.put("old", b"a").await;
        cache.put("new", b"b").await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Nothing is older than an hour yet.
        assert_eq!(cache.evict_older_than(Duration::from_secs(3600)).await, 0);
        // Everything is older than zero seconds.
        assert_eq!(cache.evict_older_than(Duration::ZERO).await, 2);
        assert!(cache.get("old").await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_memory_cache_last_writer_wins() {
        let cache = MemoryTtsCache::new();
        cache.put("k", b"first").await;
        cache.put("k", b"second").await;
        assert_eq!(cache.get("k").await.unwrap(), b"second");
        assert_eq!(cache.len(), 1);
    }
}
