use chrono::{DateTime, Utc};
use common::SubmissionStatus;
use serde::{Deserialize, Serialize};

use super::contest::ContestMode;

/// What a submission is scored against.
///
/// Each variant carries exactly what scoring needs: a virtual submission pins the
/// participation record it was made under, an official one resolves the participant's
/// official record at verdict time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionKind {
    Regular,
    OfficialContest {
        contest_id: i32,
    },
    VirtualContest {
        contest_id: i32,
        participation_id: i32,
    },
}

impl SubmissionKind {
    pub fn contest_id(&self) -> Option<i32> {
        match self {
            Self::Regular => None,
            Self::OfficialContest { contest_id } | Self::VirtualContest { contest_id, .. } => {
                Some(*contest_id)
            }
        }
    }

    pub fn contest_mode(&self) -> Option<ContestMode> {
        match self {
            Self::Regular => None,
            Self::OfficialContest { .. } => Some(ContestMode::Official),
            Self::VirtualContest { .. } => Some(ContestMode::Virtual),
        }
    }

    pub fn participation_id(&self) -> Option<i32> {
        match self {
            Self::VirtualContest {
                participation_id, ..
            } => Some(*participation_id),
            _ => None,
        }
    }

    pub fn is_contest(&self) -> bool {
        !matches!(self, Self::Regular)
    }
}

/// Full submission document. This is also the `submission-update` push payload.
#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct Submission {
    #[schema(example = 1)]
    pub id: i32,
    /// Short human-readable id.
    #[schema(example = "x7Kp2QaZ")]
    pub short_id: String,
    #[schema(example = 1)]
    pub problem_id: i32,
    #[schema(example = 1)]
    pub user_id: i32,
    pub source_code: String,
    #[schema(example = "cpp")]
    pub language: String,
    #[serde(flatten)]
    pub kind: SubmissionKind,
    pub status: SubmissionStatus,
    /// Elapsed time in milliseconds. Null until a verdict arrives.
    pub time_ms: Option<i32>,
    /// Peak memory in kilobytes. Null until a verdict arrives.
    pub memory_kb: Option<i32>,
    pub passed: Option<i32>,
    pub total: Option<i32>,
    /// Contest score. Null for regular submissions.
    pub score: Option<f64>,
    #[schema(example = "2025-10-01T14:30:00Z")]
    pub created_at: DateTime<Utc>,
    pub judged_at: Option<DateTime<Utc>>,
    /// Last time a grading request was published.
    pub dispatched_at: Option<DateTime<Utc>>,
    /// Grading requests published so far, recovery re-dispatches included.
    pub dispatch_count: i32,
}

/// Insert payload for [`crate::storage::Storage::create_submission`].
#[derive(Clone, Debug)]
pub struct NewSubmission {
    pub short_id: String,
    pub problem_id: i32,
    pub user_id: i32,
    pub source_code: String,
    pub language: String,
    pub kind: SubmissionKind,
    pub created_at: DateTime<Utc>,
}

/// Everything a verdict writes. Applied in a single update.
#[derive(Clone, Debug, PartialEq)]
pub struct VerdictUpdate {
    pub status: SubmissionStatus,
    pub time_ms: i32,
    pub memory_kb: i32,
    pub passed: i32,
    pub total: i32,
    pub score: Option<f64>,
    pub judged_at: DateTime<Utc>,
}

impl VerdictUpdate {
    /// Terminal `InternalError` with no measurements.
    pub fn internal_error(judged_at: DateTime<Utc>) -> Self {
        Self {
            status: SubmissionStatus::InternalError,
            time_ms: 0,
            memory_kb: 0,
            passed: 0,
            total: 0,
            score: None,
            judged_at,
        }
    }
}

/// Result of [`crate::storage::Storage::apply_verdict`].
#[derive(Clone, Debug, PartialEq)]
pub enum ApplyOutcome {
    /// The verdict was written.
    Applied {
        previous: SubmissionStatus,
        submission: Submission,
        /// The problem's accepted counter was incremented by this update.
        first_accepted: bool,
    },
    /// The submission was already terminal. Nothing changed.
    AlreadyFinal(Submission),
    NotFound,
}

/// Request body for creating a submission.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSubmissionRequest {
    /// Source code. Leading and trailing whitespace is trimmed before storing.
    #[schema(example = "#include <iostream>\nint main() { return 0; }")]
    pub source: String,
    /// Programming language (e.g., "cpp", "java", "python").
    #[schema(example = "cpp")]
    pub language: String,
}
