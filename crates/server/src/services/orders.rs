//! Order operations, including the pricing workflow.
//!
//! Order totals are always computed server-side from current product prices
//! at creation time; the per-line `unit_price` snapshot is immutable after
//! that.

use std::collections::HashMap;

use sqlx::PgPool;

use clementine_core::{OrderId, UserId};

use super::parse_listing;
use crate::db::{AddressRepository, OrderRepository, RepositoryError, UserRepository};
use crate::error::{AppError, Result};
use crate::filters::{ORDER_FILTERS, Page};
use crate::models::{
    ListResponse, NewAddress, NewOrder, NewUser, Order, OrderItem, OrderPatch, OrderWithItems,
};
use crate::state::AppState;

/// Service for order operations.
pub struct OrderService {
    pool: PgPool,
}

impl OrderService {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.pool().clone())
    }

    fn missing(id: OrderId) -> AppError {
        AppError::NotFound(format!("Order with ID {id} not found"))
    }

    fn validate(data: &NewOrder) -> Result<()> {
        if data.items.is_empty() {
            return Err(AppError::Validation(
                "Order must contain at least one item".to_owned(),
            ));
        }
        if data.items.iter().any(|item| item.quantity < 1) {
            return Err(AppError::Validation(
                "item quantity must be at least 1".to_owned(),
            ));
        }
        if data.status.trim().is_empty() {
            return Err(AppError::Validation("status must not be empty".to_owned()));
        }
        Ok(())
    }

    /// Fetch an order together with its line items.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs, `Database` on store failures.
    pub async fn get(&self, id: OrderId) -> Result<OrderWithItems> {
        let repo = OrderRepository::new(&self.pool);
        let order = repo.get_by_id(id).await?.ok_or_else(|| Self::missing(id))?;
        let items = repo.items(id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Fetch an order's line items. The order must exist.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown orders.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        let repo = OrderRepository::new(&self.pool);
        if repo.get_by_id(id).await?.is_none() {
            return Err(Self::missing(id));
        }
        Ok(repo.items(id).await?)
    }

    /// List orders matching the query-string filters, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed filter or pagination values.
    pub async fn list(&self, params: &HashMap<String, String>) -> Result<ListResponse<Order>> {
        let (plan, page) = parse_listing(&ORDER_FILTERS, params)?;
        let (items, total) = OrderRepository::new(&self.pool)
            .get_filtered(&plan, page)
            .await?;
        Ok(ListResponse::new(items, total, page))
    }

    /// List one user's orders, newest first. The user must exist.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown users.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        params: &HashMap<String, String>,
    ) -> Result<ListResponse<Order>> {
        if UserRepository::new(&self.pool)
            .get_by_id(user_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "User with ID {user_id} not found"
            )));
        }

        let page = Page::from_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
        let (items, total) = OrderRepository::new(&self.pool)
            .get_by_user_id(user_id, page)
            .await?;
        Ok(ListResponse::new(items, total, page))
    }

    /// Create an order, pricing each line from the current product price.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad payloads, `NotFound` when a referenced
    /// product is missing, `Conflict` when the user or address is missing.
    pub async fn create(&self, data: &NewOrder) -> Result<OrderWithItems> {
        Self::validate(data)?;
        Ok(OrderRepository::new(&self.pool).create(data).await?)
    }

    /// Create an order, synthesizing a placeholder user and primary address
    /// when the payload names neither. Used by the command consumer; the
    /// placeholders and the order commit or roll back together.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create`].
    pub async fn create_with_defaults(&self, data: &NewOrder) -> Result<OrderWithItems> {
        Self::validate(data)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let mut data = data.clone();

        if data.user_id.is_none() {
            let user = UserRepository::insert(
                &mut *tx,
                &NewUser {
                    username: "username".to_owned(),
                    email: "email".to_owned(),
                    description: None,
                },
            )
            .await?;
            data.user_id = Some(user.id);
        }

        if data.delivery_address_id.is_none()
            && let Some(user_id) = data.user_id
        {
            let address = AddressRepository::insert(
                &mut *tx,
                &NewAddress {
                    user_id,
                    street: "street".to_owned(),
                    city: "city".to_owned(),
                    state: "state".to_owned(),
                    zip_code: "zip_code".to_owned(),
                    country: "country".to_owned(),
                    is_primary: false,
                },
            )
            .await?;
            data.delivery_address_id = Some(address.id);
        }

        let order = OrderRepository::create_in(&mut *tx, &data).await?;
        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(order)
    }

    /// Replace an order's status.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs, `Validation` for an empty status.
    pub async fn update_status(&self, id: OrderId, status: &str) -> Result<Order> {
        if status.trim().is_empty() {
            return Err(AppError::Validation("status must not be empty".to_owned()));
        }
        OrderRepository::new(&self.pool)
            .update_status(id, status)
            .await?
            .ok_or_else(|| Self::missing(id))
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs, `Validation` for bad payloads.
    pub async fn update(&self, id: OrderId, patch: &OrderPatch) -> Result<Order> {
        if let Some(status) = &patch.status {
            if status.trim().is_empty() {
                return Err(AppError::Validation("status must not be empty".to_owned()));
            }
        } else {
            return Err(AppError::Validation("No fields to update".to_owned()));
        }
        OrderRepository::new(&self.pool)
            .update(id, patch)
            .await?
            .ok_or_else(|| Self::missing(id))
    }

    /// Delete an order, cascading to its items.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs.
    pub async fn delete(&self, id: OrderId) -> Result<()> {
        let deleted = OrderRepository::new(&self.pool).delete(id).await?;
        if deleted { Ok(()) } else { Err(Self::missing(id)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clementine_core::ProductId;
    use crate::models::NewOrderItem;

    fn order_with(items: Vec<NewOrderItem>) -> NewOrder {
        NewOrder {
            user_id: None,
            delivery_address_id: None,
            status: "pending".to_owned(),
            items,
        }
    }

    #[test]
    fn empty_orders_are_rejected() {
        let err = OrderService::validate(&order_with(vec![])).unwrap_err();
        assert_eq!(
            err.public_message(),
            "Order must contain at least one item"
        );
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let order = order_with(vec![NewOrderItem {
            product_id: ProductId::generate(),
            quantity: 0,
        }]);
        assert!(OrderService::validate(&order).is_err());
    }

    #[test]
    fn a_plain_order_passes_validation() {
        let order = order_with(vec![NewOrderItem {
            product_id: ProductId::generate(),
            quantity: 3,
        }]);
        assert!(OrderService::validate(&order).is_ok());
    }
}
