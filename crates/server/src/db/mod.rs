//! Database operations for the Clementine `PostgreSQL` store.
//!
//! ## Tables
//!
//! - `users` - Account records
//! - `addresses` - User shipping addresses (at most one primary per user)
//! - `products` - Catalog entries with current price
//! - `orders` - Orders with server-computed totals
//! - `order_items` - Per-order line items with price snapshots
//!
//! All queries use the sqlx runtime API; partial updates and dynamic filters
//! are assembled with `QueryBuilder` and bound parameters.
//!
//! # Migrations
//!
//! Migrations live in `crates/server/migrations/` and are embedded in
//! [`MIGRATOR`]; both binaries run them on startup.

pub mod addresses;
pub mod orders;
pub mod products;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Embedded migrations for the Clementine schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// A referenced entity (e.g. a product on an order line) does not exist.
    #[error("{0}")]
    MissingReference(String),

    /// Constraint violation (e.g. foreign key to a missing row).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a foreign-key violation to [`RepositoryError::Conflict`] with a
/// readable message, passing every other error through unchanged.
pub(crate) fn map_fk_violation(err: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(err)
}
