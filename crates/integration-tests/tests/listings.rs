//! Integration tests for filtered, paginated listings.
//!
//! Tests scope their assertions with unique filter values so they tolerate
//! concurrent runs and leftover rows.
//!
//! Run with: TEST_DATABASE_URL=... cargo test -- --ignored

use std::collections::HashMap;

use axum::http::StatusCode;
use rust_decimal::Decimal;

use clementine_integration_tests::{TestContext, unique};
use clementine_server::models::NewProduct;
use clementine_server::services::ProductService;

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

async fn seed_category(ctx: &TestContext, category: &str, count: usize) {
    let service = ProductService::from_state(&ctx.state());
    for i in 0..count {
        service
            .create(&NewProduct {
                name: format!("{category}-item-{i}"),
                description: None,
                price: Decimal::from(i as u32 + 1),
                category: category.to_owned(),
                in_stock: i % 2 == 0,
            })
            .await
            .expect("seed product");
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn pages_are_disjoint_and_share_a_total() {
    let ctx = TestContext::new().await;
    let category = unique("cat");
    seed_category(&ctx, &category, 7).await;
    let service = ProductService::from_state(&ctx.state());

    let first = service
        .list(&params(&[("category", &category), ("page", "1"), ("count", "3")]))
        .await
        .expect("page 1");
    let second = service
        .list(&params(&[("category", &category), ("page", "2"), ("count", "3")]))
        .await
        .expect("page 2");
    let third = service
        .list(&params(&[("category", &category), ("page", "3"), ("count", "3")]))
        .await
        .expect("page 3");

    assert_eq!(first.total_count, 7);
    assert_eq!(second.total_count, 7);
    assert_eq!(first.items.len(), 3);
    assert_eq!(second.items.len(), 3);
    assert_eq!(third.items.len(), 1);

    let mut seen: Vec<_> = first
        .items
        .iter()
        .chain(&second.items)
        .chain(&third.items)
        .map(|p| p.id)
        .collect();
    seen.sort_by_key(|id| id.as_uuid());
    seen.dedup();
    assert_eq!(seen.len(), 7);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn price_bounds_and_stock_filters_combine() {
    let ctx = TestContext::new().await;
    let category = unique("cat");
    seed_category(&ctx, &category, 6).await; // prices 1..=6
    let service = ProductService::from_state(&ctx.state());

    let listing = service
        .list(&params(&[
            ("category", &category),
            ("price_min", "2"),
            ("price_max", "5"),
        ]))
        .await
        .expect("bounded listing");
    assert_eq!(listing.total_count, 4);
    assert!(listing
        .items
        .iter()
        .all(|p| p.price >= Decimal::from(2) && p.price <= Decimal::from(5)));

    let in_stock = service
        .list(&params(&[("category", &category), ("in_stock", "true")]))
        .await
        .expect("in-stock listing");
    assert!(in_stock.items.iter().all(|p| p.in_stock));
    assert_eq!(in_stock.total_count, 3);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn name_query_matches_substrings_case_insensitively() {
    let ctx = TestContext::new().await;
    let category = unique("cat");
    seed_category(&ctx, &category, 3).await;
    let service = ProductService::from_state(&ctx.state());

    let needle = format!("{}-ITEM-1", category.to_uppercase());
    let listing = service
        .list(&params(&[("name_query", &needle)]))
        .await
        .expect("name query");
    assert_eq!(listing.total_count, 1);
    assert_eq!(listing.items[0].name, format!("{category}-item-1"));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn unknown_filters_are_ignored_but_bad_values_reject() {
    let ctx = TestContext::new().await;
    let category = unique("cat");
    seed_category(&ctx, &category, 2).await;
    let service = ProductService::from_state(&ctx.state());

    // Unknown names fall through without narrowing the result.
    let listing = service
        .list(&params(&[("category", &category), ("flavour", "citrus")]))
        .await
        .expect("unknown filter ignored");
    assert_eq!(listing.total_count, 2);

    // A recognized filter with an unparseable value is a client error.
    let err = service
        .list(&params(&[("price_min", "cheap")]))
        .await
        .expect_err("bad value");
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let err = service
        .list(&params(&[("count", "500")]))
        .await
        .expect_err("oversized page");
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}
