//! Best-effort cache in front of single-entity reads.
//!
//! Keys follow the `"<entity>:<id>"` convention; values are the JSON
//! response form of the entity. Every operation is best-effort: a cache
//! failure degrades silently to a store round-trip and never fails the
//! request.

pub mod memory;
pub mod redis;

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use memory::MemoryCache;
pub use redis::RedisCache;

/// Best-effort key/value cache with per-entry TTL.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value. Errors and misses both come back as `None`.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value with a TTL. Failures are logged and swallowed.
    async fn put(&self, key: &str, value: String, ttl: Duration);

    /// Remove a value. Failures are logged and swallowed.
    async fn delete(&self, key: &str);
}

/// Shared handle to the process-wide cache backend.
pub type SharedCache = Arc<dyn Cache>;

/// Entry bound for the in-process backend.
const MEMORY_CAPACITY: u64 = 10_000;

/// Select the cache backend from configuration: Redis when a URL is set,
/// the in-process cache otherwise. A failed Redis connection degrades to
/// the in-process cache rather than failing startup.
pub async fn from_config(config: &crate::config::Config) -> SharedCache {
    if let Some(url) = &config.redis_url {
        match RedisCache::connect(url).await {
            Ok(cache) => {
                tracing::info!("Redis cache connected");
                return Arc::new(cache);
            }
            Err(err) => {
                tracing::warn!(error = %err, "Redis unavailable, using in-process cache");
            }
        }
    }
    Arc::new(MemoryCache::new(MEMORY_CAPACITY))
}

/// Build the conventional cache key for an entity.
#[must_use]
pub fn entity_key(entity: &str, id: impl Display) -> String {
    format!("{entity}:{id}")
}

/// Cache-aside read: serve from cache when present, otherwise load from the
/// store and populate the cache with `ttl`.
///
/// A well-formed cached entry is trusted outright (no freshness check beyond
/// TTL); a malformed one is evicted and treated as a miss. A `None` from the
/// loader is never cached.
///
/// # Errors
///
/// Propagates only the loader's error; cache failures are swallowed.
pub async fn read_through<T, E, Fut>(
    cache: &dyn Cache,
    key: &str,
    ttl: Duration,
    load: impl FnOnce() -> Fut,
) -> Result<Option<T>, E>
where
    T: Serialize + DeserializeOwned,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    if let Some(raw) = cache.get(key).await {
        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key, "cache hit");
                return Ok(Some(value));
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "evicting malformed cache entry");
                cache.delete(key).await;
            }
        }
    }

    let Some(value) = load().await? else {
        return Ok(None);
    };
    refresh(cache, key, &value, ttl).await;
    Ok(Some(value))
}

/// Overwrite the cache entry for `key` with the serialized value
/// (refresh-on-write).
pub async fn refresh<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.put(key, raw, ttl).await,
        Err(err) => tracing::warn!(key, error = %err, "failed to serialize cache value"),
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: u32,
        name: String,
    }

    fn widget(name: &str) -> Widget {
        Widget {
            id: 7,
            name: name.to_owned(),
        }
    }

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn entity_keys_follow_the_convention() {
        assert_eq!(entity_key("product", 42), "product:42");
        let id = uuid::Uuid::new_v4();
        assert_eq!(entity_key("user", id), format!("user:{id}"));
    }

    #[tokio::test]
    async fn miss_loads_and_populates() {
        let cache = MemoryCache::new(100);
        let loaded: Option<Widget> =
            read_through::<_, Infallible, _>(&cache, "widget:7", TTL, || async {
                Ok(Some(widget("fresh")))
            })
            .await
            .expect("load");
        assert_eq!(loaded, Some(widget("fresh")));
        assert!(cache.get("widget:7").await.is_some());
    }

    #[tokio::test]
    async fn hit_is_trusted_even_when_the_store_moved_on() {
        let cache = MemoryCache::new(100);
        let _first: Option<Widget> =
            read_through::<_, Infallible, _>(&cache, "widget:7", TTL, || async {
                Ok(Some(widget("original")))
            })
            .await
            .expect("load");

        // Store mutated out-of-band; the cached value still wins until TTL.
        let second: Option<Widget> =
            read_through::<_, Infallible, _>(&cache, "widget:7", TTL, || async {
                Ok(Some(widget("mutated")))
            })
            .await
            .expect("load");
        assert_eq!(second, Some(widget("original")));
    }

    #[tokio::test]
    async fn not_found_is_never_cached() {
        let cache = MemoryCache::new(100);
        let missing: Option<Widget> =
            read_through::<_, Infallible, _>(&cache, "widget:9", TTL, || async { Ok(None) })
                .await
                .expect("load");
        assert_eq!(missing, None);
        assert!(cache.get("widget:9").await.is_none());
    }

    #[tokio::test]
    async fn malformed_entries_are_evicted_and_reloaded() {
        let cache = MemoryCache::new(100);
        cache.put("widget:7", "{not json".to_owned(), TTL).await;

        let loaded: Option<Widget> =
            read_through::<_, Infallible, _>(&cache, "widget:7", TTL, || async {
                Ok(Some(widget("reloaded")))
            })
            .await
            .expect("load");
        assert_eq!(loaded, Some(widget("reloaded")));

        let raw = cache.get("widget:7").await.expect("repopulated");
        let parsed: Widget = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(parsed, widget("reloaded"));
    }

    #[tokio::test]
    async fn refresh_overwrites_the_entry() {
        let cache = MemoryCache::new(100);
        refresh(&cache, "widget:7", &widget("v1"), TTL).await;
        refresh(&cache, "widget:7", &widget("v2"), TTL).await;
        let raw = cache.get("widget:7").await.expect("entry");
        let parsed: Widget = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(parsed.name, "v2");
    }
}
