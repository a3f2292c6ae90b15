use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::SubmissionStatus;
use crate::mq::Message;

/// A grading request published to the judge workers.
///
/// Limits are a snapshot taken at dispatch time; later edits to the problem do not
/// affect a request already in flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingRequest {
    pub submission_id: i32,
    pub source_code: String,
    /// Language tag (e.g., "cpp", "java", "python")
    pub language: String,
    pub time_limit_ms: i32,
    pub memory_limit_kb: i32,
    pub test_case_count: i32,
}

impl Message for GradingRequest {
    fn message_type() -> &'static str {
        "grading_request"
    }

    fn message_key(&self) -> String {
        self.submission_id.to_string()
    }
}

/// Verdict reported by a judge worker for one submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictMessage {
    pub submission_id: i32,
    /// Raw verdict string. See [`SubmissionStatus::from_wire`].
    pub overall_verdict: String,
    /// Elapsed time in milliseconds.
    pub time_ms: i32,
    /// Peak memory in kilobytes.
    pub memory_kb: i32,
    /// Test cases passed.
    pub passed: i32,
    /// Test cases run.
    pub total: i32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedVerdict {
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: i32 },

    #[error("passed ({passed}) exceeds total ({total})")]
    PassedExceedsTotal { passed: i32, total: i32 },
}

impl VerdictMessage {
    /// Status this verdict maps onto.
    pub fn status(&self) -> SubmissionStatus {
        SubmissionStatus::from_wire(&self.overall_verdict)
    }

    /// Schema checks beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), MalformedVerdict> {
        for (field, value) in [
            ("timeMs", self.time_ms),
            ("memoryKb", self.memory_kb),
            ("passed", self.passed),
            ("total", self.total),
        ] {
            if value < 0 {
                return Err(MalformedVerdict::Negative { field, value });
            }
        }
        if self.passed > self.total {
            return Err(MalformedVerdict::PassedExceedsTotal {
                passed: self.passed,
                total: self.total,
            });
        }
        Ok(())
    }
}

impl Message for VerdictMessage {
    fn message_type() -> &'static str {
        "verdict"
    }

    fn message_key(&self) -> String {
        self.submission_id.to_string()
    }
}
