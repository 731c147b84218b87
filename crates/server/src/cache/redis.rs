//! Redis-backed cache using a multiplexed connection manager.
//!
//! Redis failures are logged and otherwise ignored; the store remains the
//! source of truth.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::Cache;

/// Shared Redis cache over a self-reconnecting connection manager.
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to the Redis instance at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is malformed or the initial
    /// connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, error = %err, "redis get failed");
                None
            }
        }
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        if let Err(err) = conn.set_ex::<_, _, ()>(key, value, seconds).await {
            tracing::warn!(key, error = %err, "redis set failed");
        }
    }

    async fn delete(&self, key: &str) {
        let mut conn = self.conn.clone();
        if let Err(err) = conn.del::<_, ()>(key).await {
            tracing::warn!(key, error = %err, "redis delete failed");
        }
    }
}
