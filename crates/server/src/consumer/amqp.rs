//! RabbitMQ plumbing for the command consumer.
//!
//! Connections come from a `deadpool-lapin` pool; each queue gets its own
//! consume loop that reconnects with exponential backoff and jitter. Every
//! delivery is acknowledged after processing, including failures, so poison
//! messages are never redelivered; the outcome travels in the reply instead.

use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use deadpool_lapin::{Manager, Pool};
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, ConnectionProperties};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{Command, Publisher, Reply, handle_order, handle_product};
use crate::state::AppState;

/// Queue carrying product commands.
pub const PRODUCT_QUEUE: &str = "product";
/// Queue carrying order commands.
pub const ORDER_QUEUE: &str = "order";
/// Queue receiving out-of-stock notifications.
pub const NOTIFICATIONS_QUEUE: &str = "notifications";

const CONSUMER_TAG: &str = "clementine-consumer";

/// Errors from setting up or running the AMQP consumer.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Failed to build AMQP pool: {0}")]
    Build(#[from] deadpool_lapin::BuildError),
    #[error("Failed to get AMQP connection: {0}")]
    Pool(#[from] deadpool_lapin::PoolError),
    #[error("AMQP error: {0}")]
    Lapin(#[from] lapin::Error),
}

/// Publisher that sends JSON payloads to a named queue on the default
/// exchange. Failures are logged and swallowed.
pub struct LapinPublisher {
    pool: Pool,
}

impl LapinPublisher {
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn try_publish(&self, queue: &str, payload: &serde_json::Value) -> Result<(), ConsumerError> {
        let conn = self.pool.get().await?;
        let channel = conn.create_channel().await?;
        declare_queue(&channel, queue).await?;
        let body = serde_json::to_vec(payload).unwrap_or_default();
        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await?
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Publisher for LapinPublisher {
    async fn publish(&self, queue: &str, payload: serde_json::Value) {
        if let Err(err) = self.try_publish(queue, &payload).await {
            warn!(queue, error = %err, "failed to publish notification");
        }
    }
}

/// Connect to RabbitMQ and consume both command queues until shutdown.
///
/// # Errors
///
/// Returns [`ConsumerError`] when the pool cannot be built or the initial
/// connection fails; later failures are retried internally.
pub async fn run(state: AppState) -> Result<(), ConsumerError> {
    let manager = Manager::new(
        state.config().amqp_url.expose_secret().to_owned(),
        ConnectionProperties::default(),
    );
    let pool = Pool::builder(manager).max_size(4).build()?;

    // Verify connectivity before spawning the consume loops.
    let conn = pool.get().await?;
    drop(conn);
    info!("Connected to AMQP");

    let publisher = Arc::new(LapinPublisher::new(pool.clone()));

    let product_loop = tokio::spawn(consume_queue(
        pool.clone(),
        PRODUCT_QUEUE,
        state.clone(),
        Arc::clone(&publisher),
    ));
    let order_loop = tokio::spawn(consume_queue(pool, ORDER_QUEUE, state, publisher));

    // The loops only return if their tasks are aborted.
    let _ = tokio::try_join!(product_loop, order_loop);
    Ok(())
}

/// Consume one queue forever, reconnecting with backoff on failure.
async fn consume_queue(
    pool: Pool,
    queue: &'static str,
    state: AppState,
    publisher: Arc<LapinPublisher>,
) {
    let backoff_builder = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(30))
        .with_jitter();
    let mut backoff = backoff_builder.build();

    loop {
        match setup_consumer(&pool, queue).await {
            Ok((channel, mut consumer)) => {
                info!(queue, "Consumer connected, processing messages");
                backoff = backoff_builder.build();

                while let Some(delivery) = consumer.next().await {
                    match delivery {
                        Ok(delivery) => {
                            process_delivery(&state, publisher.as_ref(), &channel, queue, delivery)
                                .await;
                        }
                        Err(err) => {
                            error!(queue, error = %err, "Consumer delivery error, will reconnect");
                            break;
                        }
                    }
                }
                info!(queue, "Consumer stream ended, reconnecting");
            }
            Err(err) => {
                let delay = backoff.next().unwrap_or(Duration::from_secs(30));
                error!(
                    queue,
                    error = %err,
                    backoff_ms = delay.as_millis() as u64,
                    "Failed to set up consumer, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        }

        let delay = backoff.next().unwrap_or(Duration::from_secs(30));
        tokio::time::sleep(delay).await;
    }
}

async fn declare_queue(channel: &Channel, queue: &str) -> Result<(), lapin::Error> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

async fn setup_consumer(
    pool: &Pool,
    queue: &str,
) -> Result<(Channel, lapin::Consumer), ConsumerError> {
    let conn = pool.get().await?;
    let channel = conn.create_channel().await?;
    declare_queue(&channel, queue).await?;

    let consumer = channel
        .basic_consume(
            queue,
            CONSUMER_TAG,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    Ok((channel, consumer))
}

/// Decode, dispatch, reply, and acknowledge one delivery.
async fn process_delivery(
    state: &AppState,
    publisher: &dyn Publisher,
    channel: &Channel,
    queue: &str,
    delivery: Delivery,
) {
    let reply = match serde_json::from_slice::<Command>(&delivery.data) {
        Ok(cmd) => {
            debug!(queue, action = ?cmd.action, "Received command");
            match queue {
                PRODUCT_QUEUE => handle_product(state, publisher, cmd).await,
                _ => handle_order(state, cmd).await,
            }
        }
        Err(err) => {
            error!(queue, error = %err, "Failed to decode command");
            Reply::Error(format!("invalid command: {err}"))
        }
    };

    if let Reply::Error(message) = &reply {
        warn!(queue, message, "Command failed");
    }

    send_reply(channel, &delivery, &reply).await;

    if let Err(err) = delivery.ack(lapin::options::BasicAckOptions::default()).await {
        error!(queue, error = %err, "Failed to ack message");
    }
}

/// Publish the reply to the delivery's `reply-to` queue, when one is set.
async fn send_reply(channel: &Channel, delivery: &Delivery, reply: &Reply) {
    let Some(reply_to) = delivery.properties.reply_to() else {
        return;
    };

    let body = serde_json::to_vec(&reply.to_json()).unwrap_or_default();
    let mut properties = BasicProperties::default().with_content_type("application/json".into());
    if let Some(correlation_id) = delivery.properties.correlation_id() {
        properties = properties.with_correlation_id(correlation_id.clone());
    }

    match channel
        .basic_publish(
            "",
            reply_to.as_str(),
            BasicPublishOptions::default(),
            &body,
            properties,
        )
        .await
    {
        Ok(confirm) => {
            if let Err(err) = confirm.await {
                warn!(error = %err, "Reply publish was not confirmed");
            }
        }
        Err(err) => warn!(error = %err, "Failed to publish reply"),
    }
}
