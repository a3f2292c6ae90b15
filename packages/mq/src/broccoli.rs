use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use broccoli_queue::brokers::broker::BrokerMessage;
use broccoli_queue::error::BroccoliError;
use broccoli_queue::queue::BroccoliQueue;
use tracing::{debug, error, info};

use crate::channel::{Channel, Delivery, Handler};
use crate::error::MqError;

/// Redis-backed channel built on `broccoli_queue`.
pub struct BroccoliChannel {
    queue: BroccoliQueue,
    closed: AtomicBool,
}

impl BroccoliChannel {
    pub async fn connect(url: &str, pool_size: u8) -> Result<Self, MqError> {
        let queue = BroccoliQueue::builder(url)
            .pool_connections(pool_size)
            .build()
            .await?;
        info!(pool_size, "Connected to Redis broker");
        Ok(Self {
            queue,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), MqError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MqError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for BroccoliChannel {
    async fn publish(
        &self,
        queue: &str,
        key: Option<String>,
        payload: serde_json::Value,
    ) -> Result<String, MqError> {
        self.ensure_open()?;
        // A disambiguator would land the message in a per-key fairness queue, which
        // consumers without fairness options never read.
        let message = self
            .queue
            .publish(queue, None, &payload, None)
            .await
            .map_err(|e| MqError::Publish(e.to_string()))?;
        debug!(queue, key = ?key, task_id = %message.task_id, "Published to Redis");
        Ok(message.task_id.to_string())
    }

    async fn subscribe(
        &self,
        queue: &str,
        concurrency: Option<usize>,
        handler: Handler,
    ) -> Result<(), MqError> {
        self.ensure_open()?;
        info!(queue, ?concurrency, "Subscribing to queue");

        self.queue
            .process_messages(
                queue,
                concurrency,
                None,
                move |message: BrokerMessage<serde_json::Value>| {
                    let handler = handler.clone();
                    async move {
                        let delivery = Delivery {
                            id: message.task_id.to_string(),
                            attempts: message.attempts.saturating_add(1),
                            payload: message.payload,
                        };
                        handler(delivery)
                            .await
                            .map_err(|e| BroccoliError::Job(e.to_string()))
                    }
                },
            )
            .await
            .map_err(|e| {
                error!(queue, error = %e, "Redis consumer stopped");
                MqError::Consume(e.to_string())
            })
    }

    /// Rejects further publishes and subscribes. A `process_messages` loop already running
    /// keeps polling until its task is aborted.
    async fn close(&self) -> Result<(), MqError> {
        self.closed.store(true, Ordering::Release);
        info!("Redis channel closed");
        Ok(())
    }
}
