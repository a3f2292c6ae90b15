#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a submission during the grading lifecycle.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "PascalCase")]
pub enum SubmissionStatus {
    /// Persisted, waiting for a judge worker.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Pending"))]
    Pending,
    /// A worker picked the job up. Advisory only.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Judging"))]
    Judging,
    /// All test cases passed.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Accepted"))]
    Accepted,
    /// Output did not match expected output.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "WrongAnswer"))]
    WrongAnswer,
    /// Exceeded time limit.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "TimeLimitExceeded"))]
    TimeLimitExceeded,
    /// Failed to compile.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "CompilationError"))]
    CompilationError,
    /// Program crashed or exited with non-zero code.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "RuntimeError"))]
    RuntimeError,
    /// Grading could not produce a meaningful verdict.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "InternalError"))]
    InternalError,
    /// Exceeded memory limit.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "MemoryLimitExceeded"))]
    MemoryLimitExceeded,
}

impl SubmissionStatus {
    /// Returns true if this is a final verdict (grading is complete).
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending | Self::Judging)
    }

    /// Returns true if this is a successful verdict.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Terminal states never move. `Judging` is optional on the way to a terminal state.
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        match self {
            Self::Pending => next != Self::Pending,
            Self::Judging => next.is_final(),
            _ => false,
        }
    }

    /// All possible status values.
    pub const ALL: &'static [SubmissionStatus] = &[
        Self::Pending,
        Self::Judging,
        Self::Accepted,
        Self::WrongAnswer,
        Self::TimeLimitExceeded,
        Self::CompilationError,
        Self::RuntimeError,
        Self::InternalError,
        Self::MemoryLimitExceeded,
    ];

    /// All final verdict statuses.
    pub const FINAL: &'static [SubmissionStatus] = &[
        Self::Accepted,
        Self::WrongAnswer,
        Self::TimeLimitExceeded,
        Self::CompilationError,
        Self::RuntimeError,
        Self::InternalError,
        Self::MemoryLimitExceeded,
    ];

    /// Statuses a submission can hold while grading is outstanding.
    pub const IN_FLIGHT: &'static [SubmissionStatus] = &[Self::Pending, Self::Judging];

    /// Returns the string representation (PascalCase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Judging => "Judging",
            Self::Accepted => "Accepted",
            Self::WrongAnswer => "WrongAnswer",
            Self::TimeLimitExceeded => "TimeLimitExceeded",
            Self::CompilationError => "CompilationError",
            Self::RuntimeError => "RuntimeError",
            Self::InternalError => "InternalError",
            Self::MemoryLimitExceeded => "MemoryLimitExceeded",
        }
    }

    /// Map a verdict string reported by a judge worker.
    ///
    /// Terminal names and `Judging` map exactly; anything else (including `Pending`)
    /// becomes `InternalError`.
    pub fn from_wire(s: &str) -> Self {
        match s.parse::<SubmissionStatus>() {
            Ok(Self::Pending) | Err(_) => Self::InternalError,
            Ok(status) => status,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for SubmissionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid status '{}'. Valid values: {}",
            self.invalid,
            SubmissionStatus::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for SubmissionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubmissionStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError {
                invalid: s.to_string(),
            })
    }
}
