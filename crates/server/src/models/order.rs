//! Order and order-item rows and payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use clementine_core::{AddressId, OrderId, OrderItemId, ProductId, UserId};

/// An order row. `total_amount` is always server-computed from the order's
/// items; clients never supply it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub delivery_address_id: Option<AddressId>,
    pub status: String,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order line item. `unit_price` is a snapshot of the product price at
/// order-creation time and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// An order together with its line items, as returned by single-order reads.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// One requested line on a new order. The price is looked up server-side.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Payload for creating an order.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub delivery_address_id: Option<AddressId>,
    #[serde(default = "default_status")]
    pub status: String,
    pub items: Vec<NewOrderItem>,
}

pub(crate) fn default_status() -> String {
    "pending".to_owned()
}

/// Partial update for an order. Status is a free-form string; transition
/// legality is not enforced.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderPatch {
    pub status: Option<String>,
}
