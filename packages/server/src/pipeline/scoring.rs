//! Contest Score Aggregator.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::contest::{ContestMode, Participation, ProblemScore, ScoreboardRow};
use crate::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("contest {0} not found")]
    ContestNotFound(i32),

    #[error("problem {0} not found")]
    ProblemNotFound(i32),

    #[error("problem {problem_id} is not part of contest {contest_id}")]
    ProblemNotInContest { contest_id: i32, problem_id: i32 },

    #[error("no participation record for user {user_id} in contest {contest_id}")]
    ParticipationNotFound { contest_id: i32, user_id: i32 },

    #[error("participation {0} not found")]
    UnknownParticipation(i32),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScoreChange {
    /// The submission was already counted. Nothing changed.
    Duplicate,
    Recorded {
        /// The problem's best score went up.
        improved: bool,
    },
}

/// `passed / total * points`, with `passed` clamped into `[0, total]`. Zero when `total` is 0.
pub fn contest_score(passed: i32, total: i32, points: f64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let passed = passed.clamp(0, total);
    f64::from(passed) * points / f64::from(total)
}

/// Fold one scored submission into a participation record.
///
/// Ties keep the earlier best submission. Re-offering a submission that was already
/// counted returns [`ScoreChange::Duplicate`] and leaves the record untouched.
pub fn record_score(
    participation: &mut Participation,
    problem_id: i32,
    submission_id: i32,
    score: f64,
    submitted_at: DateTime<Utc>,
) -> ScoreChange {
    let index = match participation
        .problems
        .iter()
        .position(|p| p.problem_id == problem_id)
    {
        Some(index) => index,
        None => {
            participation.problems.push(ProblemScore::new(problem_id));
            participation.problems.len() - 1
        }
    };
    let entry = &mut participation.problems[index];

    if entry.scored_submissions.contains(&submission_id) {
        return ScoreChange::Duplicate;
    }
    entry.scored_submissions.push(submission_id);
    entry.attempts += 1;
    entry.last_submitted_at = Some(
        entry
            .last_submitted_at
            .map_or(submitted_at, |last| last.max(submitted_at)),
    );

    let improved = score > entry.best_score;
    if improved || entry.best_submission_id.is_none() {
        entry.best_score = entry.best_score.max(score);
        entry.best_submission_id = Some(submission_id);
    }
    if improved {
        participation.last_improved_at = Some(submitted_at);
    }

    participation.total_score = participation.problems.iter().map(|p| p.best_score).sum();
    ScoreChange::Recorded { improved }
}

/// Applies [`record_score`] under the participation record's lock.
#[derive(Clone)]
pub struct ContestScoreAggregator {
    storage: Arc<dyn Storage>,
}

impl ContestScoreAggregator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn apply(
        &self,
        participation_id: i32,
        problem_id: i32,
        submission_id: i32,
        score: f64,
        submitted_at: DateTime<Utc>,
    ) -> Result<(Participation, ScoreChange), ScoringError> {
        let mut change = ScoreChange::Duplicate;
        let updated = self
            .storage
            .update_participation(
                participation_id,
                Box::new(|participation: &mut Participation| {
                    change = record_score(
                        participation,
                        problem_id,
                        submission_id,
                        score,
                        submitted_at,
                    );
                    change != ScoreChange::Duplicate
                }),
            )
            .await?;

        let participation = updated.ok_or(ScoringError::UnknownParticipation(participation_id))?;
        Ok((participation, change))
    }
}

/// Order participations for the scoreboard: total descending, then earliest last
/// improvement. Rows with equal total and improvement time share a rank.
pub fn rank_participations(mut participations: Vec<Participation>) -> Vec<ScoreboardRow> {
    participations.sort_by(|a, b| {
        b.total_score
            .total_cmp(&a.total_score)
            .then_with(|| compare_improvement(a.last_improved_at, b.last_improved_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut rows: Vec<ScoreboardRow> = Vec::with_capacity(participations.len());
    for (position, p) in participations.into_iter().enumerate() {
        let rank = match rows.last() {
            Some(prev)
                if prev.total_score == p.total_score
                    && prev.last_improved_at == p.last_improved_at =>
            {
                prev.rank
            }
            _ => position as u32 + 1,
        };
        rows.push(ScoreboardRow {
            rank,
            participation_id: p.id,
            user_id: p.user_id,
            mode: p.mode,
            total_score: p.total_score,
            last_improved_at: p.last_improved_at,
            problems: p.problems,
        });
    }
    rows
}

/// Earlier first. Never having improved sorts last.
fn compare_improvement(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Keep official rows unless virtual ones were asked for.
pub fn scoreboard_filter(include_virtual: bool) -> impl Fn(&Participation) -> bool {
    move |p| include_virtual || p.mode == ContestMode::Official
}
