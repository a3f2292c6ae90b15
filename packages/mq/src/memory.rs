use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{Channel, Delivery, Handler};
use crate::error::MqError;

/// Default number of times a message is handed out before it is dropped.
pub const DEFAULT_MAX_ATTEMPTS: u8 = 5;

#[derive(Clone)]
struct MemoryQueue {
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>>,
}

impl MemoryQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }
}

/// In-process channel. Subscribers on the same queue compete for deliveries.
///
/// Unacknowledged deliveries are requeued until `max_attempts` is reached.
pub struct MemoryChannel {
    queues: Mutex<HashMap<String, MemoryQueue>>,
    closed: AtomicBool,
    max_attempts: u8,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(max_attempts: u8) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            max_attempts: max_attempts.max(1),
        }
    }

    fn queue(&self, name: &str) -> Result<MemoryQueue, MqError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MqError::Closed);
        }
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(queues
            .entry(name.to_string())
            .or_insert_with(MemoryQueue::new)
            .clone())
    }

    fn redeliver(&self, queue: &str, delivery: Delivery, reason: &str) {
        if delivery.attempts >= self.max_attempts {
            warn!(
                queue,
                message_id = %delivery.id,
                attempts = delivery.attempts,
                error = reason,
                "Dropping message after max delivery attempts"
            );
            return;
        }

        let retry = Delivery {
            attempts: delivery.attempts + 1,
            ..delivery
        };
        let sent = self
            .queue(queue)
            .and_then(|q| q.tx.send(retry).map_err(|_| MqError::Closed));
        if let Err(e) = sent {
            warn!(queue, error = %e, "Could not requeue unacknowledged message");
        }
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn publish(
        &self,
        queue: &str,
        _key: Option<String>,
        payload: serde_json::Value,
    ) -> Result<String, MqError> {
        let id = Uuid::new_v4().to_string();
        self.queue(queue)?
            .tx
            .send(Delivery {
                id: id.clone(),
                attempts: 1,
                payload,
            })
            .map_err(|_| MqError::Closed)?;
        Ok(id)
    }

    async fn subscribe(
        &self,
        queue: &str,
        concurrency: Option<usize>,
        handler: Handler,
    ) -> Result<(), MqError> {
        // Only the receiver is kept so closing the channel ends the stream.
        let rx = self.queue(queue)?.rx;
        info!(queue, ?concurrency, "Subscribing to in-memory queue");

        let deliveries = futures::stream::unfold(rx, |rx| async move {
            let next = rx.lock().await.recv().await;
            next.map(|delivery| (delivery, rx))
        });

        let this = self;
        deliveries
            .for_each_concurrent(Some(concurrency.unwrap_or(1).max(1)), move |delivery| {
                let handler = handler.clone();
                async move {
                    debug!(
                        queue,
                        message_id = %delivery.id,
                        attempts = delivery.attempts,
                        "Delivering"
                    );
                    if let Err(e) = handler(delivery.clone()).await {
                        this.redeliver(queue, delivery, &e.to_string());
                    }
                }
            })
            .await;

        info!(queue, "In-memory subscription ended");
        Ok(())
    }

    async fn close(&self) -> Result<(), MqError> {
        self.closed.store(true, Ordering::Release);
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}
