use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::core::geometry::GeometryError;
use crate::core::Matcher;
use crate::models::{parse_item_message, Item, MatchResult};
use crate::services::backend::{BackendClient, BackendError};

/// Errors from one end-to-end scoring pass.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Broker-driven matching service.
///
/// Consumes one "item reported" message at a time (prefetch 1), runs the
/// fetch -> score -> persist pipeline to completion, then acknowledges.
/// Messages are validated before any acknowledgment decision; malformed
/// and poison payloads are rejected without requeue so a dead-letter
/// exchange can collect them.
pub struct MatcherService {
    backend: Arc<BackendClient>,
    matcher: Arc<Matcher>,
    amqp_url: String,
    queue: String,
    reconnect_delay: Duration,
    max_attempts: u32,
}

impl MatcherService {
    pub fn new(
        backend: Arc<BackendClient>,
        matcher: Arc<Matcher>,
        amqp_url: String,
        queue: String,
        reconnect_delay_secs: u64,
        max_attempts: u32,
    ) -> Self {
        Self {
            backend,
            matcher,
            amqp_url,
            queue,
            reconnect_delay: Duration::from_secs(reconnect_delay_secs),
            max_attempts: max_attempts.max(1),
        }
    }

    /// One full scoring pass for a trigger item: fetch all opposite-kind
    /// candidates, score them, persist the surviving matches.
    pub async fn process_item(&self, item: &Item) -> Result<Vec<MatchResult>, PipelineError> {
        let opposite = item.kind.opposite();
        let candidates = self.backend.fetch_items(opposite).await?;
        info!(
            "Scoring {} {} candidates for {} item {}",
            candidates.len(),
            opposite,
            item.kind,
            item.id
        );

        let results = self.matcher.score_candidates(item, &candidates)?;
        self.backend.save_matches(&results).await?;

        info!("Item {} produced {} matches", item.id, results.len());
        Ok(results)
    }

    /// Bounded retry around the pipeline for transient backend failures.
    async fn process_with_retry(&self, item: &Item) -> Result<Vec<MatchResult>, PipelineError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.process_item(item).await {
                Ok(results) => return Ok(results),
                Err(PipelineError::Backend(e))
                    if e.is_transient() && attempt < self.max_attempts =>
                {
                    let delay = Duration::from_secs(1 << attempt.min(4));
                    warn!(
                        "Transient failure for item {} (attempt {}/{}): {}. Retrying in {:?}",
                        item.id, attempt, self.max_attempts, e, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Consume from the queue until the process is stopped. Connection
    /// loss falls back to the reconnect loop instead of crashing.
    pub async fn run(&self) {
        loop {
            let (connection, channel) = self.connect().await;

            let mut consumer = match channel
                .basic_consume(
                    &self.queue,
                    "refind-matcher",
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await
            {
                Ok(consumer) => consumer,
                Err(e) => {
                    error!("Failed to start consuming: {}", e);
                    sleep(self.reconnect_delay).await;
                    continue;
                }
            };

            info!("Consuming from queue {}", self.queue);

            while let Some(delivery) = consumer.next().await {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(e) => {
                        error!("Broker delivery failure: {}", e);
                        break;
                    }
                };
                if let Err(e) = self.handle_delivery(delivery).await {
                    error!("Failed to settle delivery: {}", e);
                    break;
                }
            }

            drop(connection);
            warn!(
                "Consumer stream ended, reconnecting in {:?}",
                self.reconnect_delay
            );
            sleep(self.reconnect_delay).await;
        }
    }

    async fn handle_delivery(&self, delivery: Delivery) -> Result<(), lapin::Error> {
        // Validate before acknowledging, so malformed payloads land in the
        // dead-letter path instead of being silently lost.
        let item = match parse_item_message(&delivery.data) {
            Ok(item) => item,
            Err(e) => {
                warn!("Rejecting malformed message: {}", e);
                return delivery
                    .reject(BasicRejectOptions { requeue: false })
                    .await;
            }
        };

        match self.process_with_retry(&item).await {
            Ok(_) => delivery.ack(BasicAckOptions::default()).await,
            Err(PipelineError::Geometry(e)) => {
                warn!(
                    "Rejecting item {} with unresolvable geometry: {}",
                    item.id, e
                );
                delivery
                    .reject(BasicRejectOptions { requeue: false })
                    .await
            }
            Err(PipelineError::Backend(e)) if e.is_transient() => {
                error!(
                    "Backend unavailable for item {} after {} attempts: {}. Requeueing",
                    item.id, self.max_attempts, e
                );
                delivery.reject(BasicRejectOptions { requeue: true }).await
            }
            Err(PipelineError::Backend(e)) => {
                error!("Backend refused operation for item {}: {}", item.id, e);
                delivery
                    .reject(BasicRejectOptions { requeue: false })
                    .await
            }
        }
    }

    async fn connect(&self) -> (Connection, Channel) {
        loop {
            match self.try_connect().await {
                Ok(pair) => {
                    info!("Connected to AMQP endpoint");
                    return pair;
                }
                Err(e) => {
                    warn!(
                        "Error connecting to AMQP endpoint: {}. Retrying in {:?}",
                        e, self.reconnect_delay
                    );
                    sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    async fn try_connect(&self) -> Result<(Connection, Channel), lapin::Error> {
        let connection =
            Connection::connect(&self.amqp_url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        // One unacked message at a time keeps scoring passes sequential.
        channel.basic_qos(1, BasicQosOptions::default()).await?;
        channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        Ok((connection, channel))
    }
}
