//! User operations with cache-aside single-entity reads.

use std::collections::HashMap;
use std::time::Duration;

use sqlx::PgPool;

use clementine_core::UserId;

use super::{parse_listing, require_text};
use crate::cache::{self, SharedCache, entity_key};
use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::filters::USER_FILTERS;
use crate::models::{ListResponse, NewUser, User, UserPatch};
use crate::state::AppState;

/// Service for user operations.
pub struct UserService {
    pool: PgPool,
    cache: SharedCache,
    cache_ttl: Duration,
}

impl UserService {
    #[must_use]
    pub const fn new(pool: PgPool, cache: SharedCache, cache_ttl: Duration) -> Self {
        Self {
            pool,
            cache,
            cache_ttl,
        }
    }

    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.pool().clone(),
            state.cache().clone(),
            state.config().user_cache_ttl,
        )
    }

    fn missing(id: UserId) -> AppError {
        AppError::NotFound(format!("User with ID {id} not found"))
    }

    /// Fetch a user, serving from the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs, `Database` on store failures.
    pub async fn get(&self, id: UserId) -> Result<User> {
        let key = entity_key("user", id);
        let pool = &self.pool;
        let user = cache::read_through(self.cache.as_ref(), &key, self.cache_ttl, move || async move {
            UserRepository::new(pool).get_by_id(id).await
        })
        .await?;
        user.ok_or_else(|| Self::missing(id))
    }

    /// List users matching the query-string filters, paginated.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed filter or pagination values.
    pub async fn list(&self, params: &HashMap<String, String>) -> Result<ListResponse<User>> {
        let (plan, page) = parse_listing(&USER_FILTERS, params)?;
        let (items, total) = UserRepository::new(&self.pool)
            .get_filtered(&plan, page)
            .await?;
        Ok(ListResponse::new(items, total, page))
    }

    /// Create a user and warm its cache entry.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad payloads, `Database` on store failures.
    pub async fn create(&self, data: &NewUser) -> Result<User> {
        require_text("username", &data.username)?;
        require_text("email", &data.email)?;

        let user = UserRepository::new(&self.pool).create(data).await?;
        let key = entity_key("user", user.id);
        cache::refresh(self.cache.as_ref(), &key, &user, self.cache_ttl).await;
        Ok(user)
    }

    /// Apply a partial update and refresh the cache entry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs, `Validation` for bad payloads.
    pub async fn update(&self, id: UserId, patch: &UserPatch) -> Result<User> {
        if patch.is_empty() {
            return Err(AppError::Validation("No fields to update".to_owned()));
        }
        if let Some(username) = &patch.username {
            require_text("username", username)?;
        }
        if let Some(email) = &patch.email {
            require_text("email", email)?;
        }

        let user = UserRepository::new(&self.pool)
            .update(id, patch)
            .await?
            .ok_or_else(|| Self::missing(id))?;
        let key = entity_key("user", id);
        cache::refresh(self.cache.as_ref(), &key, &user, self.cache_ttl).await;
        Ok(user)
    }

    /// Delete a user and evict its cache entry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs.
    pub async fn delete(&self, id: UserId) -> Result<()> {
        let deleted = UserRepository::new(&self.pool).delete(id).await?;
        if !deleted {
            return Err(Self::missing(id));
        }
        self.cache.delete(&entity_key("user", id)).await;
        Ok(())
    }
}
