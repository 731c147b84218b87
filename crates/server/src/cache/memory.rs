//! In-process cache backed by `moka`, used when no Redis URL is configured.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;

use super::Cache;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expires each entry after its own TTL rather than a cache-wide one.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-memory cache with per-entry TTL.
pub struct MemoryCache {
    inner: moka::future::Cache<String, Entry>,
}

impl MemoryCache {
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        let inner = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) {
        self.inner
            .insert(key.to_owned(), Entry { value, ttl })
            .await;
    }

    async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}
