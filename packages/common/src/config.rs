use serde::Deserialize;

use crate::retry::RetryPolicy;

/// Which broker implementation backs the grading channel.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MqBackend {
    /// Redis via broccoli_queue.
    #[default]
    Redis,
    /// In-process queues. Single-process deployments and tests only.
    Memory,
}

/// App-level MQ configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Broker backend. Default: redis.
    #[serde(default)]
    pub backend: MqBackend,
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Queue for grading requests (server publishes, workers consume). Default: "grading_requests".
    #[serde(default = "default_grading_queue")]
    pub grading_queue: String,
    /// Queue for verdicts (workers publish, server consumes). Default: "grading_verdicts".
    #[serde(default = "default_verdict_queue")]
    pub verdict_queue: String,
    /// Concurrent verdict handlers. None processes one message at a time.
    #[serde(default)]
    pub consumer_concurrency: Option<usize>,
    /// Backoff for publishes and verdict processing.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_grading_queue() -> String {
    "grading_requests".into()
}
fn default_verdict_queue() -> String {
    "grading_verdicts".into()
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            backend: MqBackend::default(),
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            grading_queue: default_grading_queue(),
            verdict_queue: default_verdict_queue(),
            consumer_concurrency: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl MqAppConfig {
    /// In-process channel with the default queue names.
    pub fn memory() -> Self {
        Self {
            backend: MqBackend::Memory,
            ..Self::default()
        }
    }
}
