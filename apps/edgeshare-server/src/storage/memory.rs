//! In-memory stores
//!
//! `MemoryKvStore` backs the metadata and token namespaces for single-node
//! deployments and tests. `MemoryBlobStore` models the edge cache tier: a
//! byte-bounded LRU that drops the coldest chunks when it fills up.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use futures::stream;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};

use crate::clock::SharedClock;
use crate::error::StorageResult;

use super::traits::{BlobRead, BlobStore, KvStore};
use super::EXPIRED_SWEEP_INTERVAL_SECS;

// ============================================================================
// Key-Value Store
// ============================================================================

struct KvEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// HashMap-backed key-value namespace
///
/// Reads drop the expired record they hit. Writes also sweep every expired
/// record, at most once per `EXPIRED_SWEEP_INTERVAL_SECS`, so records
/// nobody reads again are still reclaimed.
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, KvEntry>>,
    next_sweep: Mutex<DateTime<Utc>>,
    clock: SharedClock,
}

impl MemoryKvStore {
    pub fn new(clock: SharedClock) -> Self {
        let next_sweep = clock.now() + Duration::seconds(EXPIRED_SWEEP_INTERVAL_SECS);
        Self {
            entries: RwLock::new(HashMap::new()),
            next_sweep: Mutex::new(next_sweep),
            clock,
        }
    }

    fn sweep_due(&self, now: DateTime<Utc>) -> bool {
        let mut next_sweep = self.next_sweep.lock();
        if now < *next_sweep {
            return false;
        }
        *next_sweep = now + Duration::seconds(EXPIRED_SWEEP_INTERVAL_SECS);
        true
    }

    /// Number of stored records, including expired ones not yet touched
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: drop it so memory does not grow with abandoned sessions
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: String, expires_at: DateTime<Utc>) -> StorageResult<()> {
        let now = self.clock.now();
        let sweep = self.sweep_due(now);

        let mut entries = self.entries.write();
        if sweep {
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at > now);
            let reclaimed = before - entries.len();
            if reclaimed > 0 {
                tracing::debug!(reclaimed, "Swept expired records");
            }
        }
        entries.insert(key.to_string(), KvEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

// ============================================================================
// Blob Cache
// ============================================================================

struct CachedBlob {
    data: Bytes,
    expires_at: DateTime<Utc>,
}

struct BlobCache {
    entries: LruCache<String, CachedBlob>,
    used_bytes: usize,
}

impl BlobCache {
    fn remove(&mut self, key: &str) -> Option<CachedBlob> {
        let blob = self.entries.pop(key)?;
        self.used_bytes -= blob.data.len();
        Some(blob)
    }
}

/// Byte-bounded LRU blob cache
pub struct MemoryBlobStore {
    cache: Mutex<BlobCache>,
    capacity_bytes: usize,
    clock: SharedClock,
}

impl MemoryBlobStore {
    pub fn new(capacity_bytes: usize, clock: SharedClock) -> Self {
        Self {
            cache: Mutex::new(BlobCache {
                entries: LruCache::unbounded(),
                used_bytes: 0,
            }),
            capacity_bytes,
            clock,
        }
    }

    /// Total payload bytes currently cached
    pub fn used_bytes(&self) -> usize {
        self.cache.lock().used_bytes
    }

    pub fn len(&self) -> usize {
        self.cache.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop a blob as if the cache had evicted it
    pub fn evict(&self, key: &str) -> bool {
        self.cache.lock().remove(key).is_some()
    }

    fn live_blob(&self, key: &str) -> Option<Bytes> {
        let now = self.clock.now();
        let mut cache = self.cache.lock();
        let expired = match cache.entries.get(key) {
            Some(blob) if blob.expires_at > now => return Some(blob.data.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.remove(key);
        }
        None
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Bytes, expires_at: DateTime<Utc>) -> StorageResult<()> {
        let mut cache = self.cache.lock();
        cache.remove(key);

        if data.len() > self.capacity_bytes {
            tracing::warn!(
                key = %key,
                size = data.len(),
                capacity = self.capacity_bytes,
                "Blob larger than cache capacity, not retained"
            );
            return Ok(());
        }

        while cache.used_bytes + data.len() > self.capacity_bytes {
            match cache.entries.pop_lru() {
                Some((evicted, blob)) => {
                    cache.used_bytes -= blob.data.len();
                    tracing::debug!(key = %evicted, size = blob.data.len(), "Evicted blob");
                }
                None => break,
            }
        }

        cache.used_bytes += data.len();
        cache
            .entries
            .put(key.to_string(), CachedBlob { data, expires_at });
        Ok(())
    }

    async fn open(&self, key: &str) -> StorageResult<BlobRead> {
        Ok(match self.live_blob(key) {
            Some(data) => BlobRead::Present(Box::pin(stream::once(async move { Ok(data) }))),
            None => BlobRead::Absent,
        })
    }

    async fn contains(&self, key: &str) -> StorageResult<bool> {
        let now = self.clock.now();
        let cache = self.cache.lock();
        Ok(cache
            .entries
            .peek(key)
            .is_some_and(|blob| blob.expires_at > now))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.cache.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use chrono::Duration;
    use futures::TryStreamExt;
    use std::sync::Arc;

    async fn read_all(read: BlobRead) -> Vec<u8> {
        match read {
            BlobRead::Present(stream) => {
                let parts: Vec<Bytes> = stream.try_collect().await.unwrap();
                parts.concat()
            }
            BlobRead::Absent => panic!("expected blob to be present"),
        }
    }

    #[tokio::test]
    async fn test_kv_expiry() {
        let clock = ManualClock::starting_now();
        let store = MemoryKvStore::new(Arc::new(clock.clone()));
        let deadline = clock.now() + Duration::seconds(10);

        store.put("a", "1".to_string(), deadline).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));

        clock.advance(Duration::seconds(10));
        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_kv_write_reclaims_untouched_expired_records() {
        let clock = ManualClock::starting_now();
        let store = MemoryKvStore::new(Arc::new(clock.clone()));
        let deadline = clock.now() + Duration::hours(1);

        for i in 0..1000 {
            store.put(&format!("f{}", i), "{}".to_string(), deadline).await.unwrap();
        }
        assert_eq!(store.len(), 1000);

        clock.advance(Duration::days(30));
        store
            .put("fresh", "{}".to_string(), clock.now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("fresh").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_kv_sweep_keeps_live_records() {
        let clock = ManualClock::starting_now();
        let store = MemoryKvStore::new(Arc::new(clock.clone()));

        store
            .put("short", "1".to_string(), clock.now() + Duration::seconds(30))
            .await
            .unwrap();
        store
            .put("long", "2".to_string(), clock.now() + Duration::days(1))
            .await
            .unwrap();

        clock.advance(Duration::minutes(2));
        store
            .put("new", "3".to_string(), clock.now() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_kv_delete_is_idempotent() {
        let clock = ManualClock::starting_now();
        let store = MemoryKvStore::new(Arc::new(clock.clone()));
        store.delete("missing").await.unwrap();
        store
            .put("k", "v".to_string(), clock.now() + Duration::hours(1))
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blob_roundtrip_and_expiry() {
        let clock = ManualClock::starting_now();
        let store = MemoryBlobStore::new(1024, Arc::new(clock.clone()));
        let deadline = clock.now() + Duration::seconds(5);

        store.put("c0", Bytes::from_static(b"hello"), deadline).await.unwrap();
        assert!(store.contains("c0").await.unwrap());
        assert_eq!(read_all(store.open("c0").await.unwrap()).await, b"hello");

        clock.advance(Duration::seconds(6));
        assert!(!store.contains("c0").await.unwrap());
        assert!(matches!(store.open("c0").await.unwrap(), BlobRead::Absent));
        assert_eq!(store.used_bytes(), 0);
    }

    #[tokio::test]
    async fn test_blob_lru_eviction_under_pressure() {
        let clock = ManualClock::starting_now();
        let store = MemoryBlobStore::new(10, Arc::new(clock.clone()));
        let deadline = clock.now() + Duration::hours(1);

        store.put("a", Bytes::from_static(b"aaaa"), deadline).await.unwrap();
        store.put("b", Bytes::from_static(b"bbbb"), deadline).await.unwrap();
        // Touch "a" so "b" is the coldest
        assert!(matches!(store.open("a").await.unwrap(), BlobRead::Present(_)));
        store.put("c", Bytes::from_static(b"cccc"), deadline).await.unwrap();

        assert!(store.contains("a").await.unwrap());
        assert!(!store.contains("b").await.unwrap());
        assert!(store.contains("c").await.unwrap());
        assert_eq!(store.used_bytes(), 8);
    }

    #[tokio::test]
    async fn test_oversized_blob_is_not_retained() {
        let clock = ManualClock::starting_now();
        let store = MemoryBlobStore::new(4, Arc::new(clock.clone()));
        store
            .put("big", Bytes::from_static(b"too large"), clock.now() + Duration::hours(1))
            .await
            .unwrap();
        assert!(!store.contains("big").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_accounting() {
        let clock = ManualClock::starting_now();
        let store = MemoryBlobStore::new(100, Arc::new(clock.clone()));
        let deadline = clock.now() + Duration::hours(1);
        store.put("k", Bytes::from_static(b"12345"), deadline).await.unwrap();
        store.put("k", Bytes::from_static(b"12"), deadline).await.unwrap();
        assert_eq!(store.used_bytes(), 2);
        assert!(store.evict("k"));
        assert!(!store.evict("k"));
    }
}
