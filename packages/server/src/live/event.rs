use serde::Serialize;

use crate::models::submission::Submission;

/// Frame pushed to connected clients, serialized as `{"event": ..., "data": ...}`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum PushEvent {
    /// Full submission document after a state change.
    #[serde(rename = "submission-update")]
    SubmissionUpdate(Submission),
    /// A participant's standing changed.
    #[serde(rename = "scoreboard-update")]
    ScoreboardUpdate(ScoreboardDelta),
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubmissionUpdate(_) => "submission-update",
            Self::ScoreboardUpdate(_) => "scoreboard-update",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreboardDelta {
    pub contest_id: i32,
    pub participation_id: i32,
    pub user_id: i32,
    pub problem_id: i32,
    pub best_score: f64,
    pub attempts: u32,
    pub total_score: f64,
}
