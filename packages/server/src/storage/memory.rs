use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::SubmissionStatus;
use sea_orm::DbErr;

use super::{ParticipationUpdate, Storage, StorageError};
use crate::models::contest::{Contest, ContestMode, NewContest, NewParticipation, Participation};
use crate::models::problem::{NewProblem, Problem};
use crate::models::submission::{ApplyOutcome, NewSubmission, Submission, VerdictUpdate};

/// Process-local store. One mutex guards everything, so each operation is atomic.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    problems: BTreeMap<i32, Problem>,
    contests: BTreeMap<i32, Contest>,
    submissions: BTreeMap<i32, Submission>,
    participations: BTreeMap<i32, Participation>,
    last_id: i32,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn insert_problem(&self, new: NewProblem) -> Result<Problem, StorageError> {
        Ok(self.apply(|i| {
            let problem = Problem {
                id: i.next_id(),
                title: new.title,
                time_limit_ms: new.time_limit_ms,
                memory_limit_kb: new.memory_limit_kb,
                test_case_count: new.test_case_count,
                submission_count: 0,
                accepted_count: 0,
                created_at: Utc::now(),
            };
            i.problems.insert(problem.id, problem.clone());
            problem
        }))
    }

    async fn find_problem(&self, id: i32) -> Result<Option<Problem>, StorageError> {
        Ok(self.apply(|i| i.problems.get(&id).cloned()))
    }

    async fn insert_contest(&self, new: NewContest) -> Result<Contest, StorageError> {
        self.apply(|i| -> Result<Contest, StorageError> {
            if let Some(missing) = new
                .problems
                .iter()
                .find(|p| !i.problems.contains_key(&p.problem_id))
            {
                let missing = format!("problem {}", missing.problem_id);
                return Err(DbErr::RecordNotFound(missing).into());
            }
            let mut problems = new.problems;
            problems.sort_by_key(|p| p.position);
            let contest = Contest {
                id: i.next_id(),
                title: new.title,
                start_time: new.start_time,
                end_time: new.end_time,
                problems,
                created_at: Utc::now(),
            };
            i.contests.insert(contest.id, contest.clone());
            Ok(contest)
        })
    }

    async fn find_contest(&self, id: i32) -> Result<Option<Contest>, StorageError> {
        Ok(self.apply(|i| i.contests.get(&id).cloned()))
    }

    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, StorageError> {
        self.apply(|i| -> Result<Submission, StorageError> {
            let id = i.next_id();
            let problem = i
                .problems
                .get_mut(&new.problem_id)
                .ok_or_else(|| DbErr::RecordNotFound(format!("problem {}", new.problem_id)))?;
            problem.submission_count += 1;

            let submission = Submission {
                id,
                short_id: new.short_id,
                problem_id: new.problem_id,
                user_id: new.user_id,
                source_code: new.source_code,
                language: new.language,
                kind: new.kind,
                status: SubmissionStatus::Pending,
                time_ms: None,
                memory_kb: None,
                passed: None,
                total: None,
                score: None,
                created_at: new.created_at,
                judged_at: None,
                dispatched_at: None,
                dispatch_count: 0,
            };
            i.submissions.insert(id, submission.clone());
            Ok(submission)
        })
    }

    async fn find_submission(&self, id: i32) -> Result<Option<Submission>, StorageError> {
        Ok(self.apply(|i| i.submissions.get(&id).cloned()))
    }

    async fn mark_judging(&self, id: i32) -> Result<Option<Submission>, StorageError> {
        Ok(self.apply(|i| {
            let submission = i.submissions.get_mut(&id)?;
            if submission.status != SubmissionStatus::Pending {
                return None;
            }
            submission.status = SubmissionStatus::Judging;
            Some(submission.clone())
        }))
    }

    async fn apply_verdict(
        &self,
        id: i32,
        update: VerdictUpdate,
    ) -> Result<ApplyOutcome, StorageError> {
        self.apply(|i| -> Result<ApplyOutcome, StorageError> {
            let Some(submission) = i.submissions.get_mut(&id) else {
                return Ok(ApplyOutcome::NotFound);
            };

            let previous = submission.status;
            if previous.is_final() {
                return Ok(ApplyOutcome::AlreadyFinal(submission.clone()));
            }
            if !previous.can_transition_to(update.status) {
                return Err(StorageError::IllegalTransition {
                    from: previous,
                    to: update.status,
                });
            }

            submission.status = update.status;
            submission.time_ms = Some(update.time_ms);
            submission.memory_kb = Some(update.memory_kb);
            submission.passed = Some(update.passed);
            submission.total = Some(update.total);
            submission.score = update.score;
            submission.judged_at = Some(update.judged_at);
            let submission = submission.clone();

            let first_accepted = update.status.is_accepted() && !previous.is_accepted();
            if first_accepted && let Some(problem) = i.problems.get_mut(&submission.problem_id) {
                problem.accepted_count += 1;
            }

            Ok(ApplyOutcome::Applied {
                previous,
                submission,
                first_accepted,
            })
        })
    }

    async fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Submission>, StorageError> {
        Ok(self.apply(|i| {
            i.submissions
                .values()
                .filter(|s| s.status == SubmissionStatus::Pending)
                .filter(|s| s.dispatched_at.unwrap_or(s.created_at) < older_than)
                .take(limit as usize)
                .cloned()
                .collect()
        }))
    }

    async fn record_dispatch(&self, id: i32, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.apply(|i| {
            if let Some(submission) = i.submissions.get_mut(&id) {
                submission.dispatched_at = Some(at);
                submission.dispatch_count += 1;
            }
        });
        Ok(())
    }

    async fn create_participation(
        &self,
        new: NewParticipation,
    ) -> Result<Participation, StorageError> {
        self.apply(|i| -> Result<Participation, StorageError> {
            if !i.contests.contains_key(&new.contest_id) {
                let missing = DbErr::RecordNotFound(format!("contest {}", new.contest_id));
                return Err(missing.into());
            }
            if new.mode == ContestMode::Official
                && i.participations.values().any(|p| {
                    p.contest_id == new.contest_id
                        && p.user_id == new.user_id
                        && p.mode == ContestMode::Official
                })
            {
                return Err(StorageError::Conflict(
                    "Already registered for this contest".into(),
                ));
            }

            let participation = Participation {
                id: i.next_id(),
                contest_id: new.contest_id,
                user_id: new.user_id,
                mode: new.mode,
                registered_at: new.registered_at,
                starts_at: new.starts_at,
                ends_at: new.ends_at,
                problems: Vec::new(),
                total_score: 0.0,
                last_improved_at: None,
            };
            i.participations
                .insert(participation.id, participation.clone());
            Ok(participation)
        })
    }

    async fn find_participation(&self, id: i32) -> Result<Option<Participation>, StorageError> {
        Ok(self.apply(|i| i.participations.get(&id).cloned()))
    }

    async fn find_latest_participation(
        &self,
        contest_id: i32,
        user_id: i32,
        mode: Option<ContestMode>,
    ) -> Result<Option<Participation>, StorageError> {
        Ok(self.apply(|i| {
            i.participations
                .values()
                .rev()
                .find(|p| {
                    p.contest_id == contest_id
                        && p.user_id == user_id
                        && mode.is_none_or(|m| p.mode == m)
                })
                .cloned()
        }))
    }

    async fn list_participations(
        &self,
        contest_id: i32,
    ) -> Result<Vec<Participation>, StorageError> {
        Ok(self.apply(|i| {
            i.participations
                .values()
                .filter(|p| p.contest_id == contest_id)
                .cloned()
                .collect()
        }))
    }

    async fn update_participation(
        &self,
        id: i32,
        update: ParticipationUpdate<'_>,
    ) -> Result<Option<Participation>, StorageError> {
        Ok(self.apply(|i| {
            let stored = i.participations.get_mut(&id)?;
            let mut working = stored.clone();
            if update(&mut working) {
                *stored = working.clone();
            }
            Some(working)
        }))
    }
}
