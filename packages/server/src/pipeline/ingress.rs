//! Submission Ingress.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::contest::ContestMode;
use crate::models::submission::{NewSubmission, Submission, SubmissionKind};
use crate::state::AppState;
use crate::storage::{Storage, StorageError};

use super::dispatch::GradingDispatcher;

const SHORT_ID_LEN: usize = 8;

/// A submission as the caller handed it in.
#[derive(Clone, Debug)]
pub struct SubmitCommand {
    pub problem_id: i32,
    pub user_id: i32,
    pub source_code: String,
    pub language: String,
    pub contest_id: Option<i32>,
}

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<IngressError> for AppError {
    fn from(err: IngressError) -> Self {
        match err {
            IngressError::Validation(msg) => AppError::Validation(msg),
            IngressError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            IngressError::Storage(e) => e.into(),
        }
    }
}

pub struct SubmissionIngress {
    storage: Arc<dyn Storage>,
    dispatcher: GradingDispatcher,
    max_source_bytes: usize,
}

impl SubmissionIngress {
    pub fn new(
        storage: Arc<dyn Storage>,
        dispatcher: GradingDispatcher,
        max_source_bytes: usize,
    ) -> Self {
        Self {
            storage,
            dispatcher,
            max_source_bytes,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.storage.clone(),
            GradingDispatcher::from_state(state),
            state.config.submission.max_source_bytes,
        )
    }

    /// Validate, persist as `Pending`, and dispatch for grading.
    ///
    /// The persisted row is the source of truth: a failed dispatch is logged and left to
    /// the recovery sweep, and the created submission is still returned.
    #[instrument(skip_all, fields(problem_id = cmd.problem_id, user_id = cmd.user_id, contest_id = ?cmd.contest_id))]
    pub async fn submit(&self, cmd: SubmitCommand) -> Result<Submission, IngressError> {
        let source_code = cmd.source_code.trim();
        if source_code.is_empty() {
            return Err(IngressError::Validation(
                "Source code must not be empty".into(),
            ));
        }
        if source_code.len() > self.max_source_bytes {
            return Err(IngressError::Validation(format!(
                "Source code exceeds {} bytes",
                self.max_source_bytes
            )));
        }
        let language = cmd.language.trim();
        if language.is_empty() {
            return Err(IngressError::Validation("Language must not be empty".into()));
        }

        let problem = self
            .storage
            .find_problem(cmd.problem_id)
            .await?
            .ok_or(IngressError::NotFound("Problem"))?;
        if !problem.is_gradable() {
            return Err(IngressError::Validation("Problem has no test cases".into()));
        }

        let now = Utc::now();
        let kind = match cmd.contest_id {
            None => SubmissionKind::Regular,
            Some(contest_id) => {
                self.contest_kind(contest_id, cmd.problem_id, cmd.user_id, now)
                    .await?
            }
        };

        let submission = self
            .storage
            .create_submission(NewSubmission {
                short_id: short_id(),
                problem_id: problem.id,
                user_id: cmd.user_id,
                source_code: source_code.to_string(),
                language: language.to_string(),
                kind,
                created_at: now,
            })
            .await?;

        info!(submission_id = submission.id, "Submission created");

        if let Err(e) = self.dispatcher.dispatch(&submission, &problem).await {
            warn!(
                submission_id = submission.id,
                error = %e,
                "Dispatch failed, leaving submission pending for recovery"
            );
        }

        Ok(submission)
    }

    async fn contest_kind(
        &self,
        contest_id: i32,
        problem_id: i32,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> Result<SubmissionKind, IngressError> {
        let contest = self
            .storage
            .find_contest(contest_id)
            .await?
            .ok_or(IngressError::NotFound("Contest"))?;
        if !contest.contains_problem(problem_id) {
            return Err(IngressError::NotFound("Problem"));
        }

        let participation = self
            .storage
            .find_latest_participation(contest_id, user_id, None)
            .await?
            .ok_or_else(|| IngressError::Validation("Not registered for this contest".into()))?;
        if !participation.is_open_at(now) {
            return Err(IngressError::Validation(
                "Contest is not running for this participation".into(),
            ));
        }

        Ok(match participation.mode {
            ContestMode::Official => SubmissionKind::OfficialContest { contest_id },
            ContestMode::Virtual => SubmissionKind::VirtualContest {
                contest_id,
                participation_id: participation.id,
            },
        })
    }
}

pub fn short_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_ID_LEN)
        .map(char::from)
        .collect()
}
