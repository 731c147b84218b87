//! Product repository.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use clementine_core::ProductId;

use super::RepositoryError;
use crate::filters::{FilterPlan, Page, fetch_page};
use crate::models::{NewProduct, Product, ProductPatch};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, category, in_stock, created_at, updated_at";

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(product)
    }

    /// Get a filtered page of products plus the unpaginated match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_filtered(
        &self,
        plan: &FilterPlan,
        page: Page,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        Ok(fetch_page(self.pool, "products", "created_at ASC", plan, page).await?)
    }

    /// Create a new product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, data: &NewProduct) -> Result<Product, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, data).await
    }

    /// Insert a product on an existing connection or transaction.
    pub(crate) async fn insert(
        conn: &mut PgConnection,
        data: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (name, description, price, category, in_stock) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.price)
        .bind(&data.category)
        .bind(data.in_stock)
        .fetch_one(conn)
        .await?;
        Ok(product)
    }

    /// Apply a partial update; only supplied fields change. Changing the
    /// price never touches existing order items, which keep their snapshot.
    ///
    /// Returns `None` if the product does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE products SET updated_at = now()");
        if let Some(name) = &patch.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(description) = &patch.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(price) = patch.price {
            qb.push(", price = ").push_bind(price);
        }
        if let Some(category) = &patch.category {
            qb.push(", category = ").push_bind(category);
        }
        if let Some(in_stock) = patch.in_stock {
            qb.push(", in_stock = ").push_bind(in_stock);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        let product = qb
            .build_query_as::<Product>()
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Delete a product, cascading to its order items.
    ///
    /// Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
