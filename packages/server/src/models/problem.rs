use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct Problem {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "A + B")]
    pub title: String,
    #[schema(example = 1000)]
    pub time_limit_ms: i32,
    #[schema(example = 262144)]
    pub memory_limit_kb: i32,
    /// Supplied by test-case ingestion. Read-only here.
    #[schema(example = 10)]
    pub test_case_count: i32,
    pub submission_count: i64,
    pub accepted_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Problem {
    /// A problem without test cases cannot be graded.
    pub fn is_gradable(&self) -> bool {
        self.test_case_count > 0
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewProblem {
    pub title: String,
    pub time_limit_ms: i32,
    pub memory_limit_kb: i32,
    pub test_case_count: i32,
}
