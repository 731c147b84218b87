//! Clementine - relational commerce backend.
//!
//! # Architecture
//!
//! - Axum HTTP API over `PostgreSQL` (users, addresses, products, orders)
//! - Declarative per-entity filter engine with shared pagination
//! - Cache-aside reads for users and products (Redis or in-process)
//! - AMQP command consumer mirroring the HTTP write operations
//!
//! The `clementine-server` binary serves HTTP; `clementine-consumer` runs
//! the AMQP command loop. Both share this library.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod consumer;
pub mod db;
pub mod error;
pub mod filters;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use state::AppState;
