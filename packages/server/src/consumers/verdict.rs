use std::sync::Arc;

use chrono::Utc;
use common::{SubmissionStatus, VerdictMessage, retry_with_backoff};
use mq::{Delivery, HandlerError};
use tracing::{debug, error, info, instrument, warn};

use crate::live::{NotificationHub, PushEvent, ScoreboardDelta};
use crate::models::contest::{ContestMode, Participation};
use crate::models::submission::{ApplyOutcome, Submission, SubmissionKind, VerdictUpdate};
use crate::pipeline::scoring::{ContestScoreAggregator, ScoreChange, ScoringError, contest_score};
use crate::state::AppState;
use crate::storage::{Storage, StorageError};

/// What happened to one verdict message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Failed schema checks. Dropped.
    Malformed,
    /// `Judging` progress report.
    Progress,
    /// References a submission that does not exist. Dropped.
    UnknownSubmission,
    /// The submission was already terminal. Nothing changed.
    Duplicate,
    Applied { first_accepted: bool },
}

struct ContestScoring {
    contest_id: i32,
    participation_id: i32,
    score: f64,
}

/// Applies verdict messages to the submission store and fans the result out.
pub struct VerdictProcessor {
    storage: Arc<dyn Storage>,
    hub: Arc<NotificationHub>,
    aggregator: ContestScoreAggregator,
}

impl VerdictProcessor {
    pub fn new(storage: Arc<dyn Storage>, hub: Arc<NotificationHub>) -> Self {
        Self {
            aggregator: ContestScoreAggregator::new(storage.clone()),
            storage,
            hub,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.storage.clone(), state.hub.clone())
    }

    /// Process one verdict payload.
    ///
    /// Only storage failures are returned; they are worth retrying. Every other problem is
    /// resolved here, so a bad message never blocks the ones behind it.
    pub async fn process(&self, payload: serde_json::Value) -> Result<Disposition, StorageError> {
        let message = match serde_json::from_value::<VerdictMessage>(payload) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Dropping undecodable verdict message");
                return Ok(Disposition::Malformed);
            }
        };
        if let Err(e) = message.validate() {
            error!(
                submission_id = message.submission_id,
                error = %e,
                "Dropping malformed verdict message"
            );
            return Ok(Disposition::Malformed);
        }

        self.process_message(message).await
    }

    #[instrument(skip_all, fields(submission_id = message.submission_id, verdict = %message.overall_verdict))]
    async fn process_message(&self, message: VerdictMessage) -> Result<Disposition, StorageError> {
        if message.status() == SubmissionStatus::Judging {
            return self.progress(message.submission_id).await;
        }

        let Some(submission) = self.storage.find_submission(message.submission_id).await? else {
            error!("Verdict references unknown submission");
            return Ok(Disposition::UnknownSubmission);
        };
        if submission.status.is_final() {
            return self.duplicate(submission).await;
        }

        let mut status = message.status();
        let scoring = match self.resolve_scoring(&submission, &message).await {
            Ok(scoring) => scoring,
            Err(ScoringError::Storage(e)) => return Err(e),
            Err(e) => {
                error!(error = %e, "Contest scoring failed, resolving as internal error");
                status = SubmissionStatus::InternalError;
                None
            }
        };

        let update = VerdictUpdate {
            status,
            time_ms: message.time_ms,
            memory_kb: message.memory_kb,
            passed: message.passed,
            total: message.total,
            score: scoring.as_ref().map(|s| s.score),
            judged_at: Utc::now(),
        };

        let (submission, first_accepted) =
            match self.storage.apply_verdict(submission.id, update).await? {
                ApplyOutcome::Applied {
                    submission,
                    first_accepted,
                    ..
                } => (submission, first_accepted),
                ApplyOutcome::AlreadyFinal(submission) => return self.duplicate(submission).await,
                ApplyOutcome::NotFound => {
                    error!("Submission disappeared before its verdict was written");
                    return Ok(Disposition::UnknownSubmission);
                }
            };

        if let Some(scoring) = scoring {
            self.record_score(&submission, &scoring).await?;
        }

        info!(
            status = %submission.status,
            score = ?submission.score,
            first_accepted,
            "Verdict applied"
        );
        self.push_submission(submission);

        Ok(Disposition::Applied { first_accepted })
    }

    /// `Pending -> Judging`. Late progress for a submission that has moved on is ignored.
    async fn progress(&self, submission_id: i32) -> Result<Disposition, StorageError> {
        if let Some(submission) = self.storage.mark_judging(submission_id).await? {
            self.push_submission(submission);
            return Ok(Disposition::Progress);
        }
        if self.storage.find_submission(submission_id).await?.is_none() {
            error!("Progress report references unknown submission");
            return Ok(Disposition::UnknownSubmission);
        }
        Ok(Disposition::Progress)
    }

    /// A repeated verdict for a terminal submission.
    ///
    /// The stored score is offered to the aggregator again. It ignores submissions it has
    /// already counted, so this only changes anything if an earlier run stopped between
    /// writing the verdict and scoring it.
    async fn duplicate(&self, submission: Submission) -> Result<Disposition, StorageError> {
        debug!(status = %submission.status, "Submission already final, skipping");

        let (Some(contest_id), Some(score)) = (submission.kind.contest_id(), submission.score)
        else {
            return Ok(Disposition::Duplicate);
        };

        let participation = match self.participation_for(&submission).await {
            Ok(Some(participation)) => participation,
            Ok(None) => return Ok(Disposition::Duplicate),
            Err(ScoringError::Storage(e)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Cannot re-check contest score");
                return Ok(Disposition::Duplicate);
            }
        };

        let scoring = ContestScoring {
            contest_id,
            participation_id: participation.id,
            score,
        };
        if self.record_score(&submission, &scoring).await? {
            info!("Recovered contest score for terminal submission");
            self.push_submission(submission);
        }

        Ok(Disposition::Duplicate)
    }

    /// Contest, point value, and participation for a contest submission. `None` for
    /// regular submissions.
    async fn resolve_scoring(
        &self,
        submission: &Submission,
        message: &VerdictMessage,
    ) -> Result<Option<ContestScoring>, ScoringError> {
        let Some(contest_id) = submission.kind.contest_id() else {
            return Ok(None);
        };

        let contest = self
            .storage
            .find_contest(contest_id)
            .await?
            .ok_or(ScoringError::ContestNotFound(contest_id))?;
        let points = contest
            .points_for(submission.problem_id)
            .ok_or(ScoringError::ProblemNotInContest {
                contest_id,
                problem_id: submission.problem_id,
            })?;
        let problem = self
            .storage
            .find_problem(submission.problem_id)
            .await?
            .ok_or(ScoringError::ProblemNotFound(submission.problem_id))?;
        let Some(participation) = self.participation_for(submission).await? else {
            return Ok(None);
        };

        let denominator = if problem.test_case_count > 0 {
            problem.test_case_count
        } else {
            message.total
        };

        Ok(Some(ContestScoring {
            contest_id,
            participation_id: participation.id,
            score: contest_score(message.passed, denominator, points),
        }))
    }

    /// The record a contest submission scores against. `None` for regular submissions.
    async fn participation_for(
        &self,
        submission: &Submission,
    ) -> Result<Option<Participation>, ScoringError> {
        let participation = match submission.kind {
            SubmissionKind::Regular => return Ok(None),
            SubmissionKind::OfficialContest { contest_id } => self
                .storage
                .find_latest_participation(
                    contest_id,
                    submission.user_id,
                    Some(ContestMode::Official),
                )
                .await?
                .ok_or(ScoringError::ParticipationNotFound {
                    contest_id,
                    user_id: submission.user_id,
                }),
            SubmissionKind::VirtualContest {
                contest_id,
                participation_id,
            } => self
                .storage
                .find_participation(participation_id)
                .await?
                .filter(|p| p.contest_id == contest_id && p.user_id == submission.user_id)
                .ok_or(ScoringError::UnknownParticipation(participation_id)),
        }?;
        Ok(Some(participation))
    }

    /// Fold the score into the participation record and broadcast the new standing.
    /// Returns whether the record changed.
    async fn record_score(
        &self,
        submission: &Submission,
        scoring: &ContestScoring,
    ) -> Result<bool, StorageError> {
        let result = self
            .aggregator
            .apply(
                scoring.participation_id,
                submission.problem_id,
                submission.id,
                scoring.score,
                submission.created_at,
            )
            .await;

        let participation = match result {
            Ok((_, ScoreChange::Duplicate)) => return Ok(false),
            Ok((participation, ScoreChange::Recorded { improved })) => {
                debug!(
                    participation_id = participation.id,
                    score = scoring.score,
                    improved,
                    "Contest score recorded"
                );
                participation
            }
            Err(ScoringError::Storage(e)) => return Err(e),
            Err(e) => {
                error!(error = %e, "Failed to record contest score");
                return Ok(false);
            }
        };

        if let Some(entry) = participation.problem(submission.problem_id) {
            let delta = ScoreboardDelta {
                contest_id: scoring.contest_id,
                participation_id: participation.id,
                user_id: participation.user_id,
                problem_id: entry.problem_id,
                best_score: entry.best_score,
                attempts: entry.attempts,
                total_score: participation.total_score,
            };
            self.hub
                .broadcast_to_room(scoring.contest_id, PushEvent::ScoreboardUpdate(delta));
        }
        Ok(true)
    }

    fn push_submission(&self, submission: Submission) {
        let user_id = submission.user_id;
        self.hub
            .push_to_user(user_id, PushEvent::SubmissionUpdate(submission));
    }
}

/// Consume verdicts from the verdict queue until the channel closes.
pub async fn consume_verdicts(state: AppState) {
    let queue = state.config.mq.verdict_queue.clone();
    let concurrency = state.config.mq.consumer_concurrency;
    let retry = state.config.mq.retry;
    let processor = Arc::new(VerdictProcessor::from_state(&state));

    info!(queue = %queue, ?concurrency, "Starting verdict consumer");

    let handler = mq::handler(move |delivery: Delivery| {
        let processor = processor.clone();
        async move {
            let result = retry_with_backoff(&retry, "process verdict", || {
                processor.process(delivery.payload.clone())
            })
            .await;

            match result {
                Ok(disposition) => {
                    debug!(
                        message_id = %delivery.id,
                        attempts = delivery.attempts,
                        ?disposition,
                        "Verdict message handled"
                    );
                    Ok(())
                }
                Err(e) => {
                    error!(
                        message_id = %delivery.id,
                        attempts = delivery.attempts,
                        error = %e,
                        "Failed to process verdict, leaving it for redelivery"
                    );
                    Err(HandlerError::new(e.to_string()))
                }
            }
        }
    });

    if let Err(e) = state.channel.subscribe(&queue, concurrency, handler).await {
        error!(error = %e, "Verdict consumer stopped unexpectedly");
    }
}
