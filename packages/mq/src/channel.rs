use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use common::mq::Message;
use futures::future::BoxFuture;
use tracing::debug;

use crate::error::{HandlerError, MqError};

/// A message handed to a subscriber.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Broker-assigned message id.
    pub id: String,
    /// How many times this message has been handed out, starting at 1.
    pub attempts: u8,
    /// Raw JSON payload. Decoding is the subscriber's job.
    pub payload: serde_json::Value,
}

/// Delivery callback. `Err` leaves the message unacknowledged so the broker redelivers it.
pub type Handler =
    Arc<dyn Fn(Delivery) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Wrap an async closure into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Delivery) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |delivery| Box::pin(f(delivery)))
}

/// Durable, at-least-once publish/subscribe transport between the server and judge workers.
///
/// Implementations are constructed once at startup (see [`crate::connect`]) and shared by
/// reference for the lifetime of the process.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publish a payload to `queue`. `key` names the entity the message is about and is only
    /// used for tracing; it never changes which consumers see the message.
    async fn publish(
        &self,
        queue: &str,
        key: Option<String>,
        payload: serde_json::Value,
    ) -> Result<String, MqError>;

    /// Consume `queue` until the channel is closed or the broker fails.
    ///
    /// `concurrency` of `None` handles one delivery at a time.
    async fn subscribe(
        &self,
        queue: &str,
        concurrency: Option<usize>,
        handler: Handler,
    ) -> Result<(), MqError>;

    /// Stop accepting publishes and new subscriptions.
    ///
    /// Whether a running [`Channel::subscribe`] returns is backend specific: the in-memory
    /// channel ends it, the Redis channel does not. Callers that need consumers stopped abort
    /// the task driving them.
    async fn close(&self) -> Result<(), MqError>;
}

impl dyn Channel {
    /// Serialize and publish a typed message, keyed by [`Message::message_key`].
    pub async fn publish_message<M: Message>(
        &self,
        queue: &str,
        message: &M,
    ) -> Result<String, MqError> {
        let key = message.message_key();
        let payload = serde_json::to_value(message)?;
        let id = self.publish(queue, Some(key.clone()), payload).await?;
        debug!(
            message_type = M::message_type(),
            message_key = %key,
            message_id = %id,
            queue,
            "Published message"
        );
        Ok(id)
    }
}
