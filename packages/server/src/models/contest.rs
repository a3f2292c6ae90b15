use chrono::{DateTime, Duration, Utc};
use sea_orm::prelude::StringLen;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    DeriveActiveEnum,
    EnumIter,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum ContestMode {
    /// Competing during the contest window.
    #[sea_orm(string_value = "official")]
    Official,
    /// Replaying an ended contest in a personal window.
    #[sea_orm(string_value = "virtual")]
    Virtual,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ContestProblem {
    pub problem_id: i32,
    #[schema(example = "A")]
    pub label: String,
    /// Points awarded for passing every test case.
    #[schema(example = 100.0)]
    pub points: f64,
    pub position: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct Contest {
    pub id: i32,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Ordered by position.
    pub problems: Vec<ContestProblem>,
    pub created_at: DateTime<Utc>,
}

impl Contest {
    /// Point value of `problem_id`, or `None` if it is not part of the contest.
    pub fn points_for(&self, problem_id: i32) -> Option<f64> {
        self.problems
            .iter()
            .find(|p| p.problem_id == problem_id)
            .map(|p| p.points)
    }

    pub fn contains_problem(&self, problem_id: i32) -> bool {
        self.problems.iter().any(|p| p.problem_id == problem_id)
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }
}

#[derive(Clone, Debug)]
pub struct NewContest {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub problems: Vec<ContestProblem>,
}

/// Best-score bookkeeping for one problem inside a participation record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProblemScore {
    pub problem_id: i32,
    /// Never decreases.
    pub best_score: f64,
    /// Earliest submission that reached `best_score`.
    pub best_submission_id: Option<i32>,
    /// Scored submissions counted for this problem.
    pub attempts: u32,
    pub last_submitted_at: Option<DateTime<Utc>>,
    /// Submissions already folded in. Re-offering one of these is a no-op.
    #[serde(default)]
    pub scored_submissions: Vec<i32>,
}

impl ProblemScore {
    pub fn new(problem_id: i32) -> Self {
        Self {
            problem_id,
            best_score: 0.0,
            best_submission_id: None,
            attempts: 0,
            last_submitted_at: None,
            scored_submissions: Vec::new(),
        }
    }
}

/// One registration of a user for a contest.
#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct Participation {
    pub id: i32,
    pub contest_id: i32,
    pub user_id: i32,
    pub mode: ContestMode,
    pub registered_at: DateTime<Utc>,
    /// Submissions count only inside `[starts_at, ends_at)`.
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub problems: Vec<ProblemScore>,
    /// Sum of `best_score` over `problems`.
    pub total_score: f64,
    /// Last time any best score improved. Breaks ties on the scoreboard.
    pub last_improved_at: Option<DateTime<Utc>>,
}

impl Participation {
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.ends_at
    }

    pub fn problem(&self, problem_id: i32) -> Option<&ProblemScore> {
        self.problems.iter().find(|p| p.problem_id == problem_id)
    }
}

#[derive(Clone, Debug)]
pub struct NewParticipation {
    pub contest_id: i32,
    pub user_id: i32,
    pub mode: ContestMode,
    pub registered_at: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub mode: ContestMode,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct ScoreboardQuery {
    /// Include virtual participants. Default: false.
    pub include_virtual: Option<bool>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ScoreboardRow {
    /// 1-based. Equal totals and improvement times share a rank.
    pub rank: u32,
    pub participation_id: i32,
    pub user_id: i32,
    pub mode: ContestMode,
    pub total_score: f64,
    pub last_improved_at: Option<DateTime<Utc>>,
    pub problems: Vec<ProblemScore>,
}
