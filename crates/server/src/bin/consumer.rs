//! Clementine AMQP command consumer.
//!
//! Consumes the `product` and `order` command queues and applies the same
//! write operations the HTTP API exposes, replying on the message's
//! `reply-to` queue when one is set.

#![cfg_attr(not(test), forbid(unsafe_code))]

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use clementine_server::state::AppState;
use clementine_server::{Config, cache, consumer, db};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clementine_server=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    db::MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let cache = cache::from_config(&config).await;
    let state = AppState::new(config, pool, cache);

    tracing::info!("clementine-consumer starting");
    consumer::amqp::run(state)
        .await
        .expect("Consumer failed to start");
}
