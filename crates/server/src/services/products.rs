//! Product operations with cache-aside single-entity reads.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::PgPool;

use clementine_core::ProductId;

use super::{parse_listing, require_text};
use crate::cache::{self, SharedCache, entity_key};
use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::filters::PRODUCT_FILTERS;
use crate::models::{ListResponse, NewProduct, Product, ProductPatch};
use crate::state::AppState;

/// Service for product operations.
pub struct ProductService {
    pool: PgPool,
    cache: SharedCache,
    cache_ttl: Duration,
}

impl ProductService {
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
            state.config().product_cache_ttl,
        )
    }

    fn missing(id: ProductId) -> AppError {
        AppError::NotFound(format!("Product with ID {id} not found"))
    }

    fn require_positive_price(price: Decimal) -> Result<()> {
        if price <= Decimal::ZERO {
            return Err(AppError::Validation("price must be positive".to_owned()));
        }
        Ok(())
    }

    /// Fetch a product, serving from the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs, `Database` on store failures.
    pub async fn get(&self, id: ProductId) -> Result<Product> {
        let key = entity_key("product", id);
        let pool = &self.pool;
        let product =
            cache::read_through(self.cache.as_ref(), &key, self.cache_ttl, move || async move {
                ProductRepository::new(pool).get_by_id(id).await
            })
            .await?;
        product.ok_or_else(|| Self::missing(id))
    }

    /// List products matching the query-string filters, paginated.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed filter or pagination values.
    pub async fn list(&self, params: &HashMap<String, String>) -> Result<ListResponse<Product>> {
        let (plan, page) = parse_listing(&PRODUCT_FILTERS, params)?;
        let (items, total) = ProductRepository::new(&self.pool)
            .get_filtered(&plan, page)
            .await?;
        Ok(ListResponse::new(items, total, page))
    }

    /// Create a product and warm its cache entry.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad payloads, `Database` on store failures.
    pub async fn create(&self, data: &NewProduct) -> Result<Product> {
        require_text("name", &data.name)?;
        require_text("category", &data.category)?;
        Self::require_positive_price(data.price)?;

        let product = ProductRepository::new(&self.pool).create(data).await?;
        let key = entity_key("product", product.id);
        cache::refresh(self.cache.as_ref(), &key, &product, self.cache_ttl).await;
        Ok(product)
    }

    /// Apply a partial update and refresh the cache entry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs, `Validation` for bad payloads.
    pub async fn update(&self, id: ProductId, patch: &ProductPatch) -> Result<Product> {
        if let Some(name) = &patch.name {
            require_text("name", name)?;
        }
        if let Some(category) = &patch.category {
            require_text("category", category)?;
        }
        if let Some(price) = patch.price {
            Self::require_positive_price(price)?;
        }

        let product = ProductRepository::new(&self.pool)
            .update(id, patch)
            .await?
            .ok_or_else(|| Self::missing(id))?;
        let key = entity_key("product", id);
        cache::refresh(self.cache.as_ref(), &key, &product, self.cache_ttl).await;
        Ok(product)
    }

    /// Delete a product and evict its cache entry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs.
    pub async fn delete(&self, id: ProductId) -> Result<()> {
        let deleted = ProductRepository::new(&self.pool).delete(id).await?;
        if !deleted {
            return Err(Self::missing(id));
        }
        self.cache.delete(&entity_key("product", id)).await;
        Ok(())
    }
}
