//! Integration tests for the order pricing workflow.
//!
//! Totals are computed server-side from current product prices, each line
//! snapshots its unit price at creation, and a failed line rolls back the
//! whole order.
//!
//! Run with: TEST_DATABASE_URL=... cargo test -- --ignored

use axum::http::StatusCode;
use rust_decimal::Decimal;

use clementine_core::{OrderId, ProductId};
use clementine_integration_tests::TestContext;
use clementine_server::models::{NewOrder, NewOrderItem, ProductPatch};
use clementine_server::services::{OrderService, ProductService};

fn order_of(items: Vec<NewOrderItem>) -> NewOrder {
    NewOrder {
        user_id: None,
        delivery_address_id: None,
        status: "pending".to_owned(),
        items,
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn totals_are_computed_from_current_prices() {
    let ctx = TestContext::new().await;
    let coffee = ctx.create_product(Decimal::new(1250, 2)).await; // 12.50
    let mug = ctx.create_product(Decimal::new(900, 2)).await; // 9.00
    let service = OrderService::from_state(&ctx.state());

    let order = service
        .create(&order_of(vec![
            NewOrderItem {
                product_id: coffee.id,
                quantity: 2,
            },
            NewOrderItem {
                product_id: mug.id,
                quantity: 3,
            },
        ]))
        .await
        .expect("create order");

    // 2 * 12.50 + 3 * 9.00
    assert_eq!(order.order.total_amount, Decimal::new(5200, 2));
    assert_eq!(order.items.len(), 2);
    let coffee_line = order
        .items
        .iter()
        .find(|item| item.product_id == coffee.id)
        .expect("coffee line");
    assert_eq!(coffee_line.unit_price, Decimal::new(1250, 2));
    assert_eq!(coffee_line.quantity, 2);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn unit_prices_survive_later_product_changes() {
    let ctx = TestContext::new().await;
    let product = ctx.create_product(Decimal::new(2000, 2)).await;
    let orders = OrderService::from_state(&ctx.state());
    let products = ProductService::from_state(&ctx.state());

    let order = orders
        .create(&order_of(vec![NewOrderItem {
            product_id: product.id,
            quantity: 1,
        }]))
        .await
        .expect("create order");

    products
        .update(
            product.id,
            &ProductPatch {
                price: Some(Decimal::new(9999, 2)),
                ..ProductPatch::default()
            },
        )
        .await
        .expect("reprice product");

    let reloaded = orders.get(order.order.id).await.expect("reload order");
    assert_eq!(reloaded.items[0].unit_price, Decimal::new(2000, 2));
    assert_eq!(reloaded.order.total_amount, Decimal::new(2000, 2));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn a_missing_product_rolls_back_the_whole_order() {
    let ctx = TestContext::new().await;
    let product = ctx.create_product(Decimal::new(500, 2)).await;
    let service = OrderService::from_state(&ctx.state());

    let before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&ctx.pool)
        .await
        .expect("count orders");

    let err = service
        .create(&order_of(vec![
            NewOrderItem {
                product_id: product.id,
                quantity: 1,
            },
            NewOrderItem {
                product_id: ProductId::generate(),
                quantity: 1,
            },
        ]))
        .await
        .expect_err("unknown product");
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&ctx.pool)
        .await
        .expect("count orders");
    assert_eq!(before, after);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn empty_orders_are_rejected_before_touching_the_store() {
    let ctx = TestContext::new().await;
    let service = OrderService::from_state(&ctx.state());

    let err = service.create(&order_of(vec![])).await.expect_err("empty");
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(err.public_message(), "Order must contain at least one item");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn status_updates_do_not_touch_the_total() {
    let ctx = TestContext::new().await;
    let product = ctx.create_product(Decimal::new(750, 2)).await;
    let service = OrderService::from_state(&ctx.state());

    let order = service
        .create(&order_of(vec![NewOrderItem {
            product_id: product.id,
            quantity: 4,
        }]))
        .await
        .expect("create order");

    let updated = service
        .update_status(order.order.id, "shipped")
        .await
        .expect("update status");
    assert_eq!(updated.status, "shipped");
    assert_eq!(updated.total_amount, Decimal::new(3000, 2));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn deleting_a_missing_order_is_not_found() {
    let ctx = TestContext::new().await;
    let service = OrderService::from_state(&ctx.state());

    let err = service
        .delete(OrderId::generate())
        .await
        .expect_err("missing order");
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn deleting_an_order_cascades_to_its_items() {
    let ctx = TestContext::new().await;
    let product = ctx.create_product(Decimal::new(100, 2)).await;
    let service = OrderService::from_state(&ctx.state());

    let order = service
        .create(&order_of(vec![NewOrderItem {
            product_id: product.id,
            quantity: 1,
        }]))
        .await
        .expect("create order");
    service.delete(order.order.id).await.expect("delete order");

    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE order_id = $1")
            .bind(order.order.id)
            .fetch_one(&ctx.pool)
            .await
            .expect("count items");
    assert_eq!(remaining, 0);
}
