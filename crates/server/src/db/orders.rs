//! Order repository and the pricing workflow.
//!
//! Order creation is one transaction: insert the order with a zero total,
//! snapshot each product's current price into an order item, then write the
//! accumulated total. Either every row commits with the final total or none
//! do.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use clementine_core::{OrderId, UserId};

use super::{RepositoryError, map_fk_violation};
use crate::filters::{FilterPlan, FilterValue, Page, fetch_page};
use crate::models::{NewOrder, Order, OrderItem, OrderPatch, OrderWithItems, Product};

const ORDER_COLUMNS: &str =
    "id, user_id, delivery_address_id, status, total_amount, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, unit_price, created_at";

/// Sum of `unit_price * quantity` over the order's items.
#[must_use]
pub fn order_total(items: &[OrderItem]) -> Decimal {
    items
        .iter()
        .map(|item| item.unit_price * Decimal::from(item.quantity))
        .sum()
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by ID, without items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// Get an order's line items in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY created_at ASC"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Get a filtered page of orders plus the unpaginated match count,
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_filtered(
        &self,
        plan: &FilterPlan,
        page: Page,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        Ok(fetch_page(self.pool, "orders", "created_at DESC", plan, page).await?)
    }

    /// Get one user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_user_id(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let plan = FilterPlan::eq("user_id", FilterValue::Id(user_id.as_uuid()));
        self.get_filtered(&plan, page).await
    }

    /// Create an order with priced items in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::MissingReference` if any item's product does
    /// not exist (the whole order is rolled back), `RepositoryError::Conflict`
    /// if the user or delivery address is missing, `RepositoryError::Database`
    /// for other failures.
    pub async fn create(&self, data: &NewOrder) -> Result<OrderWithItems, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order = Self::create_in(&mut *tx, data).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Run the pricing workflow on an existing connection or transaction.
    ///
    /// The caller is responsible for committing; on error the caller's
    /// rollback discards the placeholder order and any items.
    pub(crate) async fn create_in(
        conn: &mut PgConnection,
        data: &NewOrder,
    ) -> Result<OrderWithItems, RepositoryError> {
        // Placeholder total; items need the order id to reference.
        let order = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (user_id, delivery_address_id, status, total_amount) \
             VALUES ($1, $2, $3, 0) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(data.user_id)
        .bind(data.delivery_address_id)
        .bind(&data.status)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_fk_violation(e, "user or delivery address does not exist"))?;

        let mut items = Vec::with_capacity(data.items.len());
        for item in &data.items {
            // Snapshot the product's price as of this instant.
            let product = sqlx::query_as::<_, Product>(
                "SELECT id, name, description, price, category, in_stock, created_at, updated_at \
                 FROM products WHERE id = $1",
            )
            .bind(item.product_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                RepositoryError::MissingReference(format!(
                    "Product with ID {} not found",
                    item.product_id
                ))
            })?;

            let row = sqlx::query_as::<_, OrderItem>(&format!(
                "INSERT INTO order_items (order_id, product_id, quantity, unit_price) \
                 VALUES ($1, $2, $3, $4) RETURNING {ITEM_COLUMNS}"
            ))
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(product.price)
            .fetch_one(&mut *conn)
            .await?;
            items.push(row);
        }

        let total = order_total(&items);
        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET total_amount = $1, updated_at = now() \
             WHERE id = $2 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(total)
        .bind(order.id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(OrderWithItems { order, items })
    }

    /// Apply a partial update; only supplied fields change.
    ///
    /// Returns `None` if the order does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: OrderId,
        patch: &OrderPatch,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE orders SET updated_at = now()");
        if let Some(status) = &patch.status {
            qb.push(", status = ").push_bind(status);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {ORDER_COLUMNS}"));

        let order = qb
            .build_query_as::<Order>()
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Replace the order's status. Any string is accepted.
    ///
    /// Returns `None` if the order does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET status = $1, updated_at = now() \
             WHERE id = $2 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(status)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// Delete an order, cascading to its items.
    ///
    /// Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use clementine_core::{OrderItemId, ProductId};

    use super::*;

    fn item(unit_price: &str, quantity: i32) -> OrderItem {
        OrderItem {
            id: OrderItemId::generate(),
            order_id: OrderId::generate(),
            product_id: ProductId::generate(),
            quantity,
            unit_price: unit_price.parse().expect("decimal"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn total_multiplies_price_by_quantity() {
        let items = vec![item("50.0", 2)];
        assert_eq!(order_total(&items), "100.0".parse().expect("decimal"));
    }

    #[test]
    fn total_sums_across_items_exactly() {
        let items = vec![item("9999.99", 1), item("2000.0", 2)];
        assert_eq!(order_total(&items), "13999.99".parse().expect("decimal"));
    }

    #[test]
    fn total_of_no_items_is_zero() {
        assert_eq!(order_total(&[]), Decimal::ZERO);
    }
}
