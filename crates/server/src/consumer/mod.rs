//! AMQP command consumer.
//!
//! Two queues carry JSON commands: `product` and `order`. Each message is
//! `{"action": ..., "data": {...}}` plus the target entity ID for updates
//! and deletes. Every command gets a JSON reply (sent to the message's
//! `reply-to` queue when one is set): `{"success": true, ...}` with the
//! created entity's ID, or `{"error": ...}`.
//!
//! Marking a product out of stock additionally publishes a notification to
//! the `notifications` queue before the update is applied.

pub mod amqp;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use clementine_core::{OrderId, ProductId};

use crate::models::{NewOrder, NewProduct, OrderPatch, Product, ProductPatch};
use crate::services::{OrderService, ProductService};
use crate::state::AppState;

/// Verb carried by a command message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// A decoded command message.
///
/// `entity_id` accepts either `product_id` or `order_id` on the wire,
/// matching the queue the command arrives on.
#[derive(Debug, Deserialize)]
pub struct Command {
    pub action: Action,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, alias = "product_id", alias = "order_id")]
    pub entity_id: Option<Uuid>,
}

/// Reply sent back for a processed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The command succeeded; creates carry the new entity's ID field.
    Success(Option<(&'static str, String)>),
    /// The command failed with a client-facing message.
    Error(String),
}

impl Reply {
    fn created(field: &'static str, id: impl ToString) -> Self {
        Self::Success(Some((field, id.to_string())))
    }

    fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// JSON body of the reply.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        match self {
            Self::Success(id) => {
                body.insert("success".to_owned(), Value::Bool(true));
                if let Some((field, value)) = id {
                    body.insert((*field).to_owned(), Value::String(value.clone()));
                }
            }
            Self::Error(message) => {
                body.insert("error".to_owned(), Value::String(message.clone()));
            }
        }
        Value::Object(body)
    }
}

/// Outbound side-channel for notifications. Failures are best-effort.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, queue: &str, payload: Value);
}

/// Publisher that drops everything; used in tests.
pub struct NoopPublisher;

#[async_trait]
impl Publisher for NoopPublisher {
    async fn publish(&self, _queue: &str, _payload: Value) {}
}

/// Whether a patch transitions the product out of stock.
fn marks_out_of_stock(patch: &ProductPatch) -> bool {
    patch.in_stock == Some(false)
}

/// Payload published to `notifications` when a product goes out of stock.
fn out_of_stock_notification(product: &Product) -> Value {
    json!({
        "type": "out_of_stock",
        "product_id": product.id,
        "product_name": product.name,
    })
}

fn parse_data<T: serde::de::DeserializeOwned>(data: Option<Value>) -> Result<T, Reply> {
    let data = data.ok_or_else(|| Reply::error("missing data"))?;
    serde_json::from_value(data).map_err(|err| Reply::error(format!("invalid data: {err}")))
}

/// Process one command from the `product` queue.
pub async fn handle_product(state: &AppState, publisher: &dyn Publisher, cmd: Command) -> Reply {
    let products = ProductService::from_state(state);

    match cmd.action {
        Action::Create => {
            let data: NewProduct = match parse_data(cmd.data) {
                Ok(data) => data,
                Err(reply) => return reply,
            };
            match products.create(&data).await {
                Ok(product) => Reply::created("product_id", product.id),
                Err(err) => Reply::error(err.public_message()),
            }
        }
        Action::Update => {
            let Some(id) = cmd.entity_id.map(ProductId::from) else {
                return Reply::error("missing product_id");
            };
            let patch: ProductPatch = match parse_data(cmd.data) {
                Ok(patch) => patch,
                Err(reply) => return reply,
            };

            // The stock notification goes out before the update is applied,
            // while the product row still carries its previous state.
            if marks_out_of_stock(&patch) {
                match products.get(id).await {
                    Ok(product) => {
                        publisher
                            .publish(amqp::NOTIFICATIONS_QUEUE, out_of_stock_notification(&product))
                            .await;
                    }
                    Err(err) => return Reply::error(err.public_message()),
                }
            }

            match products.update(id, &patch).await {
                Ok(_) => Reply::Success(None),
                Err(err) => Reply::error(err.public_message()),
            }
        }
        Action::Delete => {
            let Some(id) = cmd.entity_id.map(ProductId::from) else {
                return Reply::error("missing product_id");
            };
            match products.delete(id).await {
                Ok(()) => Reply::Success(None),
                Err(err) => Reply::error(err.public_message()),
            }
        }
    }
}

/// Process one command from the `order` queue.
pub async fn handle_order(state: &AppState, cmd: Command) -> Reply {
    let orders = OrderService::from_state(state);

    match cmd.action {
        Action::Create => {
            let data: NewOrder = match parse_data(cmd.data) {
                Ok(data) => data,
                Err(reply) => return reply,
            };
            let result = if state.config().synthesize_order_defaults {
                orders.create_with_defaults(&data).await
            } else {
                orders.create(&data).await
            };
            match result {
                Ok(order) => Reply::created("order_id", order.order.id),
                Err(err) => Reply::error(err.public_message()),
            }
        }
        Action::Update => {
            let Some(id) = cmd.entity_id.map(OrderId::from) else {
                return Reply::error("missing order_id");
            };
            let patch: OrderPatch = match parse_data(cmd.data) {
                Ok(patch) => patch,
                Err(reply) => return reply,
            };
            match orders.update(id, &patch).await {
                Ok(_) => Reply::Success(None),
                Err(err) => Reply::error(err.public_message()),
            }
        }
        Action::Delete => {
            let Some(id) = cmd.entity_id.map(OrderId::from) else {
                return Reply::error("missing order_id");
            };
            match orders.delete(id).await {
                Ok(()) => Reply::Success(None),
                Err(err) => Reply::error(err.public_message()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_accept_entity_id_aliases() {
        let raw = json!({"action": "update", "product_id": Uuid::new_v4(), "data": {"in_stock": false}});
        let cmd: Command = serde_json::from_value(raw).expect("parse");
        assert_eq!(cmd.action, Action::Update);
        assert!(cmd.entity_id.is_some());

        let raw = json!({"action": "delete", "order_id": Uuid::new_v4()});
        let cmd: Command = serde_json::from_value(raw).expect("parse");
        assert_eq!(cmd.action, Action::Delete);
        assert!(cmd.entity_id.is_some());
        assert!(cmd.data.is_none());
    }

    #[test]
    fn unknown_actions_fail_to_parse() {
        let raw = json!({"action": "upsert"});
        assert!(serde_json::from_value::<Command>(raw).is_err());
    }

    #[test]
    fn replies_serialize_to_the_wire_shapes() {
        let id = Uuid::new_v4();
        assert_eq!(
            Reply::created("order_id", id).to_json(),
            json!({"success": true, "order_id": id.to_string()})
        );
        assert_eq!(Reply::Success(None).to_json(), json!({"success": true}));
        assert_eq!(
            Reply::error("Unknown action").to_json(),
            json!({"error": "Unknown action"})
        );
    }

    #[test]
    fn only_an_explicit_false_marks_out_of_stock() {
        assert!(marks_out_of_stock(&ProductPatch {
            in_stock: Some(false),
            ..ProductPatch::default()
        }));
        assert!(!marks_out_of_stock(&ProductPatch {
            in_stock: Some(true),
            ..ProductPatch::default()
        }));
        assert!(!marks_out_of_stock(&ProductPatch::default()));
    }
}
