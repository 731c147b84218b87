//! Integration tests for the AMQP command handlers.
//!
//! These exercise the handlers directly against the database; the broker
//! plumbing is covered separately and not required here.
//!
//! Run with: TEST_DATABASE_URL=... cargo test -- --ignored

use rust_decimal::Decimal;
use serde_json::json;

use clementine_core::OrderId;
use clementine_integration_tests::{TestContext, unique};
use clementine_server::consumer::{Command, NoopPublisher, Reply, handle_order, handle_product};
use clementine_server::services::OrderService;

fn command(value: serde_json::Value) -> Command {
    serde_json::from_value(value).expect("parse command")
}

fn created_id(reply: &Reply, field: &str) -> String {
    match reply {
        Reply::Success(Some((name, id))) if *name == field => id.clone(),
        other => panic!("expected created {field}, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn product_create_commands_insert_and_reply_with_the_id() {
    let ctx = TestContext::new().await;
    let state = ctx.state();

    let name = unique("product");
    let reply = handle_product(
        &state,
        &NoopPublisher,
        command(json!({
            "action": "create",
            "data": {"name": name, "price": "19.99", "category": unique("cat")}
        })),
    )
    .await;

    let id = created_id(&reply, "product_id");
    let stored: (String,) = sqlx::query_as("SELECT name FROM products WHERE id = $1::uuid")
        .bind(&id)
        .fetch_one(&ctx.pool)
        .await
        .expect("product row");
    assert_eq!(stored.0, name);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn order_create_commands_synthesize_a_user_and_address() {
    let ctx = TestContext::new().await;
    let state = ctx.state();
    let product = ctx.create_product(Decimal::new(450, 2)).await;

    let reply = handle_order(
        &state,
        command(json!({
            "action": "create",
            "data": {"items": [{"product_id": product.id, "quantity": 2}]}
        })),
    )
    .await;

    let id: OrderId = created_id(&reply, "order_id").parse().expect("order id");
    let order = OrderService::from_state(&state).get(id).await.expect("order");
    assert!(order.order.user_id.is_some());
    assert!(order.order.delivery_address_id.is_some());
    assert_eq!(order.order.total_amount, Decimal::new(900, 2));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn failed_commands_reply_with_an_error() {
    let ctx = TestContext::new().await;
    let state = ctx.state();

    let reply = handle_order(
        &state,
        command(json!({"action": "delete", "order_id": OrderId::generate()})),
    )
    .await;
    let Reply::Error(message) = reply else {
        panic!("expected error reply");
    };
    assert!(message.contains("not found"));

    let reply = handle_product(
        &state,
        &NoopPublisher,
        command(json!({"action": "create", "data": {"name": "", "price": "1.00", "category": "c"}})),
    )
    .await;
    assert!(matches!(reply, Reply::Error(_)));
}
