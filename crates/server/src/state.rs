//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::SharedCache;
use crate::config::Config;

/// Application state shared across all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pool: PgPool,
    cache: SharedCache,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, pool: PgPool, cache: SharedCache) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cache,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn cache(&self) -> &SharedCache {
        &self.inner.cache
    }
}
