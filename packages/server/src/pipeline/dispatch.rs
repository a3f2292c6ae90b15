use std::sync::Arc;

use chrono::Utc;
use common::{GradingRequest, RetryPolicy, retry_with_backoff};
use mq::{Channel, MqError};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::models::problem::Problem;
use crate::models::submission::Submission;
use crate::state::AppState;
use crate::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("publish failed: {0}")]
    Publish(#[from] MqError),

    #[error("could not record dispatch: {0}")]
    Storage(#[from] StorageError),
}

/// Grading request for `submission`, with the problem's limits as they are right now.
pub fn grading_request(submission: &Submission, problem: &Problem) -> GradingRequest {
    GradingRequest {
        submission_id: submission.id,
        source_code: submission.source_code.clone(),
        language: submission.language.clone(),
        time_limit_ms: problem.time_limit_ms,
        memory_limit_kb: problem.memory_limit_kb,
        test_case_count: problem.test_case_count,
    }
}

/// Publishes grading requests and stamps the submission with the dispatch time.
#[derive(Clone)]
pub struct GradingDispatcher {
    channel: Arc<dyn Channel>,
    storage: Arc<dyn Storage>,
    queue: String,
    retry: RetryPolicy,
}

impl GradingDispatcher {
    pub fn new(
        channel: Arc<dyn Channel>,
        storage: Arc<dyn Storage>,
        queue: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            channel,
            storage,
            queue: queue.into(),
            retry,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.channel.clone(),
            state.storage.clone(),
            state.config.mq.grading_queue.clone(),
            state.config.mq.retry,
        )
    }

    /// Publish with backoff. Returns the broker message id.
    #[instrument(skip_all, fields(submission_id = submission.id))]
    pub async fn dispatch(
        &self,
        submission: &Submission,
        problem: &Problem,
    ) -> Result<String, DispatchError> {
        let request = grading_request(submission, problem);
        let message_id = retry_with_backoff(&self.retry, "publish grading request", || {
            self.channel.publish_message(&self.queue, &request)
        })
        .await?;

        self.storage
            .record_dispatch(submission.id, Utc::now())
            .await?;
        debug!(message_id = %message_id, queue = %self.queue, "Dispatched grading request");
        Ok(message_id)
    }
}
