//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Health check (verifies database)
//!
//! # Users
//! GET    /users                       - List users (filterable, paginated)
//! POST   /users                       - Create user
//! GET    /users/{id}                  - Get user (cache-aside)
//! PUT    /users/{id}                  - Update user (PATCH also accepted)
//! DELETE /users/{id}                  - Delete user
//! GET    /users/{id}/addresses        - List the user's addresses
//! GET    /users/{id}/orders           - List the user's orders
//!
//! # Addresses
//! GET    /addresses                   - List addresses (filterable, paginated)
//! POST   /addresses                   - Create address
//! GET    /addresses/{id}              - Get address
//! PUT    /addresses/{id}              - Update address (PATCH also accepted)
//! PUT    /addresses/{id}/primary      - Make this the user's primary address
//! DELETE /addresses/{id}              - Delete address
//!
//! # Products
//! GET    /products                    - List products (filterable, paginated)
//! POST   /products                    - Create product
//! GET    /products/{id}               - Get product (cache-aside)
//! PUT    /products/{id}               - Update product (PATCH also accepted)
//! DELETE /products/{id}               - Delete product
//!
//! # Orders
//! GET    /orders                      - List orders (filterable, newest first)
//! POST   /orders                      - Create order (server-side pricing)
//! GET    /orders/{id}                 - Get order with items
//! PUT    /orders/{id}                 - Update order (PATCH also accepted)
//! GET    /orders/{id}/items           - List the order's items
//! PUT    /orders/{id}/status          - Replace order status
//! DELETE /orders/{id}                 - Delete order
//! ```

pub mod addresses;
pub mod orders;
pub mod products;
pub mod users;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::Router;

use crate::state::AppState;

/// Assemble the full application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Users
        .route("/users", get(users::index).post(users::create))
        .route(
            "/users/{id}",
            get(users::show)
                .put(users::update)
                .patch(users::update)
                .delete(users::destroy),
        )
        .route("/users/{id}/addresses", get(users::addresses))
        .route("/users/{id}/orders", get(users::orders))
        // Addresses
        .route(
            "/addresses",
            get(addresses::index).post(addresses::create),
        )
        .route(
            "/addresses/{id}",
            get(addresses::show)
                .put(addresses::update)
                .patch(addresses::update)
                .delete(addresses::destroy),
        )
        .route("/addresses/{id}/primary", put(addresses::set_primary))
        // Products
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .put(products::update)
                .patch(products::update)
                .delete(products::destroy),
        )
        // Orders
        .route("/orders", get(orders::index).post(orders::create))
        .route(
            "/orders/{id}",
            get(orders::show)
                .put(orders::update)
                .patch(orders::update)
                .delete(orders::destroy),
        )
        .route("/orders/{id}/items", get(orders::items))
        .route("/orders/{id}/status", put(orders::set_status))
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn health(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::Config;

    fn app() -> Router {
        let config = Config {
            database_url: SecretString::from("postgres://unused"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            redis_url: None,
            amqp_url: SecretString::from("amqp://unused"),
            product_cache_ttl: Duration::from_secs(60),
            user_cache_ttl: Duration::from_secs(60),
            synthesize_order_defaults: true,
        };
        // Lazy pool; these tests only exercise routing and never reach it.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool");
        let state = AppState::new(config, pool, Arc::new(MemoryCache::new(16)));
        routes().with_state(state)
    }

    async fn send_empty_json(app: Router, method: Method, path: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .expect("request");
        app.oneshot(request).await.expect("response").status()
    }

    #[tokio::test]
    async fn put_updates_are_routed_for_every_entity() {
        let id = Uuid::new_v4();
        for path in [
            format!("/users/{id}"),
            format!("/addresses/{id}"),
            format!("/products/{id}"),
            format!("/orders/{id}"),
        ] {
            let status = send_empty_json(app(), Method::PUT, &path).await;
            assert_ne!(status, StatusCode::METHOD_NOT_ALLOWED, "PUT {path}");
        }
    }

    #[tokio::test]
    async fn patch_updates_stay_routed() {
        let id = Uuid::new_v4();
        let status = send_empty_json(app(), Method::PATCH, &format!("/products/{id}")).await;
        assert_ne!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn empty_order_update_is_rejected_before_touching_the_store() {
        let id = Uuid::new_v4();
        let status = send_empty_json(app(), Method::PUT, &format!("/orders/{id}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
