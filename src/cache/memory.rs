//! In-process [`SharedCache`] backend.
//!
//! A `HashMap` behind a tokio mutex with per-entry expiry, suitable for
//! single-process deployments and for tests. Expiry is enforced lazily: an
//! entry past its deadline reads as absent and is dropped on access.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::trace;

use crate::cache::SharedCache;
use crate::error::{RelayError, Result};

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    /// `None` for counters, which never expire.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(deadline) if Instant::now() >= deadline)
    }
}

/// Thread-safe in-memory cache with TTL-based expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries. Test and diagnostics helper.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|e| !e.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn parse_counter(entry: &Entry, key: &str) -> Result<u64> {
        std::str::from_utf8(&entry.value)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| RelayError::CacheUnavailable(format!("key {key} is not a counter")))
    }
}

#[async_trait]
impl SharedCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                trace!(key, "entry expired on read");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn add(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(false),
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value,
                        expires_at: Some(Instant::now() + ttl),
                    },
                );
                Ok(true)
            }
        }
    }

    async fn incr(&self, key: &str, delta: u64, initial: u64) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        let current = match entries.get(key) {
            Some(entry) if !entry.is_expired() => Self::parse_counter(entry, key)?,
            _ => initial,
        };
        let next = current.saturating_add(delta);
        entries.insert(
            key.to_string(),
            Entry {
                value: Bytes::from(next.to_string()),
                expires_at: None,
            },
        );
        Ok(next)
    }

    async fn decr(&self, key: &str, delta: u64) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        let current = match entries.get(key) {
            Some(entry) if !entry.is_expired() => Self::parse_counter(entry, key)?,
            _ => return Ok(0),
        };
        let next = current.saturating_sub(delta);
        entries.insert(
            key.to_string(),
            Entry {
                value: Bytes::from(next.to_string()),
                expires_at: None,
            },
        );
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_is_exclusive() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);

        assert!(cache.add("lock", Bytes::from("1"), ttl).await.unwrap());
        assert!(!cache.add("lock", Bytes::from("1"), ttl).await.unwrap());

        cache.delete("lock").await.unwrap();
        assert!(cache.add("lock", Bytes::from("1"), ttl).await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let cache = MemoryCache::new();

        cache
            .set("k", Bytes::from("v"), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("k").await.unwrap().is_none());

        // An expired lock no longer blocks add.
        assert!(cache
            .add("k", Bytes::from("w"), Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn incr_starts_from_initial() {
        let cache = MemoryCache::new();

        assert_eq!(cache.incr("size", 1, 0).await.unwrap(), 1);
        assert_eq!(cache.incr("size", 2, 0).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn decr_floors_at_zero_and_skips_absent_keys() {
        let cache = MemoryCache::new();

        assert_eq!(cache.decr("missing", 1).await.unwrap(), 0);
        assert!(cache.get("missing").await.unwrap().is_none());

        cache.incr("size", 2, 0).await.unwrap();
        assert_eq!(cache.decr("size", 5).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn counters_survive_value_expiry() {
        let cache = MemoryCache::new();

        cache.incr("size", 3, 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(cache.incr("size", 1, 0).await.unwrap(), 4);
    }
}
