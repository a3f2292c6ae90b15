pub mod config;
pub mod grading;
pub mod mq;
pub mod retry;
pub mod submission_status;

pub use config::{MqAppConfig, MqBackend};
pub use grading::{GradingRequest, MalformedVerdict, VerdictMessage};
pub use retry::{RetryPolicy, calculate_backoff, retry_with_backoff};
pub use submission_status::SubmissionStatus;
