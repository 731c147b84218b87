//! Integration tests for the address primary-flag invariant.
//!
//! For any user, at most one address may be primary in any committed state.
//!
//! Run with: TEST_DATABASE_URL=... cargo test -- --ignored

use clementine_integration_tests::TestContext;
use clementine_server::models::{AddressPatch, NewAddress};
use clementine_server::services::AddressService;

use clementine_core::UserId;
use sqlx::PgPool;

fn new_address(user_id: UserId, is_primary: bool) -> NewAddress {
    NewAddress {
        user_id,
        street: "12 Orchard Way".to_owned(),
        city: "Valencia".to_owned(),
        state: "VC".to_owned(),
        zip_code: "46001".to_owned(),
        country: "Spain".to_owned(),
        is_primary,
    }
}

async fn primary_count(pool: &PgPool, user_id: UserId) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM addresses WHERE user_id = $1 AND is_primary = TRUE",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("count query")
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn creating_a_primary_address_demotes_the_previous_one() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user().await;
    let service = AddressService::from_state(&ctx.state());

    let first = service
        .create(&new_address(user.id, true))
        .await
        .expect("first address");
    assert!(first.is_primary);

    let second = service
        .create(&new_address(user.id, true))
        .await
        .expect("second address");
    assert!(second.is_primary);

    let first = service.get(first.id).await.expect("reload first");
    assert!(!first.is_primary);
    assert_eq!(primary_count(&ctx.pool, user.id).await, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn set_primary_moves_the_flag_between_addresses() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user().await;
    let service = AddressService::from_state(&ctx.state());

    let a = service
        .create(&new_address(user.id, true))
        .await
        .expect("address a");
    let b = service
        .create(&new_address(user.id, false))
        .await
        .expect("address b");

    let b = service.set_primary(b.id).await.expect("promote b");
    assert!(b.is_primary);

    let a = service.get(a.id).await.expect("reload a");
    assert!(!a.is_primary);
    assert_eq!(primary_count(&ctx.pool, user.id).await, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn patching_is_primary_true_demotes_siblings() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user().await;
    let service = AddressService::from_state(&ctx.state());

    let a = service
        .create(&new_address(user.id, true))
        .await
        .expect("address a");
    let b = service
        .create(&new_address(user.id, false))
        .await
        .expect("address b");

    let patch = AddressPatch {
        is_primary: Some(true),
        ..AddressPatch::default()
    };
    let b = service.update(b.id, &patch).await.expect("patch b");
    assert!(b.is_primary);

    let a = service.get(a.id).await.expect("reload a");
    assert!(!a.is_primary);
    assert_eq!(primary_count(&ctx.pool, user.id).await, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn primary_flags_are_scoped_per_user() {
    let ctx = TestContext::new().await;
    let alice = ctx.create_user().await;
    let bob = ctx.create_user().await;
    let service = AddressService::from_state(&ctx.state());

    service
        .create(&new_address(alice.id, true))
        .await
        .expect("alice address");
    service
        .create(&new_address(bob.id, true))
        .await
        .expect("bob address");

    // One user's promotion must not touch the other's flag.
    assert_eq!(primary_count(&ctx.pool, alice.id).await, 1);
    assert_eq!(primary_count(&ctx.pool, bob.id).await, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn creating_an_address_for_a_missing_user_conflicts() {
    let ctx = TestContext::new().await;
    let service = AddressService::from_state(&ctx.state());

    let err = service
        .create(&new_address(UserId::generate(), false))
        .await
        .expect_err("missing user");
    assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn schema_rejects_a_second_primary_written_behind_the_services_back() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user().await;
    let service = AddressService::from_state(&ctx.state());

    service
        .create(&new_address(user.id, true))
        .await
        .expect("primary address");

    // A writer that skips the demote step must be stopped by the
    // partial unique index, not trusted to behave.
    let err = sqlx::query(
        "INSERT INTO addresses (user_id, street, city, country, is_primary) \
         VALUES ($1, 'rogue', 'rogue', 'rogue', TRUE)",
    )
    .bind(user.id)
    .execute(&ctx.pool)
    .await
    .expect_err("second primary");

    match err {
        sqlx::Error::Database(db_err) => assert!(db_err.is_unique_violation()),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(primary_count(&ctx.pool, user.id).await, 1);
}
