use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::SubmissionStatus;
use sea_orm::sea_query::{Expr, ExprTrait, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use tracing::debug;

use super::{ParticipationUpdate, Storage, StorageError};
use crate::entity::submission::{KIND_CONTEST, KIND_REGULAR};
use crate::entity::{contest, contest_participation, contest_problem, problem, submission};
use crate::models::contest::{
    Contest, ContestMode, ContestProblem, NewContest, NewParticipation, Participation,
    ProblemScore,
};
use crate::models::problem::{NewProblem, Problem};
use crate::models::submission::{
    ApplyOutcome, NewSubmission, Submission, SubmissionKind, VerdictUpdate,
};

/// Postgres-backed store. Read-modify-write paths take `SELECT ... FOR UPDATE` row locks.
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
}

impl SeaOrmStorage {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn problem_from_model(model: problem::Model) -> Problem {
    Problem {
        id: model.id,
        title: model.title,
        time_limit_ms: model.time_limit,
        memory_limit_kb: model.memory_limit,
        test_case_count: model.test_case_count,
        submission_count: model.submission_count,
        accepted_count: model.accepted_count,
        created_at: model.created_at,
    }
}

fn contest_from_models(model: contest::Model, problems: Vec<contest_problem::Model>) -> Contest {
    Contest {
        id: model.id,
        title: model.title,
        start_time: model.start_time,
        end_time: model.end_time,
        problems: problems
            .into_iter()
            .map(|p| ContestProblem {
                problem_id: p.problem_id,
                label: p.label,
                points: p.points,
                position: p.position,
            })
            .collect(),
        created_at: model.created_at,
    }
}

fn kind_columns(
    kind: &SubmissionKind,
) -> (&'static str, Option<i32>, Option<ContestMode>, Option<i32>) {
    let tag = if kind.is_contest() {
        KIND_CONTEST
    } else {
        KIND_REGULAR
    };
    (tag, kind.contest_id(), kind.contest_mode(), kind.participation_id())
}

fn kind_from_columns(model: &submission::Model) -> Result<SubmissionKind, StorageError> {
    let kind = match (
        model.kind.as_str(),
        model.contest_id,
        model.contest_mode,
        model.participation_id,
    ) {
        (KIND_REGULAR, None, None, None) => SubmissionKind::Regular,
        (KIND_CONTEST, Some(contest_id), Some(ContestMode::Official), None) => {
            SubmissionKind::OfficialContest { contest_id }
        }
        (KIND_CONTEST, Some(contest_id), Some(ContestMode::Virtual), Some(participation_id)) => {
            SubmissionKind::VirtualContest {
                contest_id,
                participation_id,
            }
        }
        _ => {
            return Err(StorageError::Corrupt(format!(
                "submission {} has inconsistent kind columns",
                model.id
            )));
        }
    };
    Ok(kind)
}

fn submission_from_model(model: submission::Model) -> Result<Submission, StorageError> {
    let kind = kind_from_columns(&model)?;
    Ok(Submission {
        id: model.id,
        short_id: model.short_id,
        problem_id: model.problem_id,
        user_id: model.user_id,
        source_code: model.source_code,
        language: model.language,
        kind,
        status: model.status,
        time_ms: model.time_ms,
        memory_kb: model.memory_kb,
        passed: model.passed,
        total: model.total,
        score: model.score,
        created_at: model.created_at,
        judged_at: model.judged_at,
        dispatched_at: model.dispatched_at,
        dispatch_count: model.dispatch_count,
    })
}

fn participation_from_model(
    model: contest_participation::Model,
) -> Result<Participation, StorageError> {
    let problems: Vec<ProblemScore> = serde_json::from_value(model.problems)?;
    Ok(Participation {
        id: model.id,
        contest_id: model.contest_id,
        user_id: model.user_id,
        mode: model.mode,
        registered_at: model.registered_at,
        starts_at: model.starts_at,
        ends_at: model.ends_at,
        problems,
        total_score: model.total_score,
        last_improved_at: model.last_improved_at,
    })
}

#[async_trait]
impl Storage for SeaOrmStorage {
    async fn insert_problem(&self, new: NewProblem) -> Result<Problem, StorageError> {
        let model = problem::ActiveModel {
            title: Set(new.title),
            time_limit: Set(new.time_limit_ms),
            memory_limit: Set(new.memory_limit_kb),
            test_case_count: Set(new.test_case_count),
            submission_count: Set(0),
            accepted_count: Set(0),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(problem_from_model(model))
    }

    async fn find_problem(&self, id: i32) -> Result<Option<Problem>, StorageError> {
        let model = problem::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(problem_from_model))
    }

    async fn insert_contest(&self, new: NewContest) -> Result<Contest, StorageError> {
        let txn = self.db.begin().await?;

        let model = contest::ActiveModel {
            title: Set(new.title),
            start_time: Set(new.start_time),
            end_time: Set(new.end_time),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut problems = Vec::with_capacity(new.problems.len());
        for p in new.problems {
            let row = contest_problem::ActiveModel {
                contest_id: Set(model.id),
                problem_id: Set(p.problem_id),
                label: Set(p.label),
                points: Set(p.points),
                position: Set(p.position),
            }
            .insert(&txn)
            .await?;
            problems.push(row);
        }
        problems.sort_by_key(|p| p.position);

        txn.commit().await?;
        Ok(contest_from_models(model, problems))
    }

    async fn find_contest(&self, id: i32) -> Result<Option<Contest>, StorageError> {
        let Some(model) = contest::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        let problems = contest_problem::Entity::find()
            .filter(contest_problem::Column::ContestId.eq(id))
            .order_by_asc(contest_problem::Column::Position)
            .all(&self.db)
            .await?;
        Ok(Some(contest_from_models(model, problems)))
    }

    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, StorageError> {
        let txn = self.db.begin().await?;

        let (kind, contest_id, contest_mode, participation_id) = kind_columns(&new.kind);
        let model = submission::ActiveModel {
            short_id: Set(new.short_id),
            problem_id: Set(new.problem_id),
            user_id: Set(new.user_id),
            source_code: Set(new.source_code),
            language: Set(new.language),
            kind: Set(kind.to_string()),
            contest_id: Set(contest_id),
            contest_mode: Set(contest_mode),
            participation_id: Set(participation_id),
            status: Set(SubmissionStatus::Pending),
            time_ms: Set(None),
            memory_kb: Set(None),
            passed: Set(None),
            total: Set(None),
            score: Set(None),
            created_at: Set(new.created_at),
            judged_at: Set(None),
            dispatched_at: Set(None),
            dispatch_count: Set(0),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        problem::Entity::update_many()
            .col_expr(
                problem::Column::SubmissionCount,
                Expr::col(problem::Column::SubmissionCount).add(1),
            )
            .filter(problem::Column::Id.eq(new.problem_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        submission_from_model(model)
    }

    async fn find_submission(&self, id: i32) -> Result<Option<Submission>, StorageError> {
        submission::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(submission_from_model)
            .transpose()
    }

    async fn mark_judging(&self, id: i32) -> Result<Option<Submission>, StorageError> {
        let result = submission::Entity::update_many()
            .col_expr(
                submission::Column::Status,
                Expr::value(SubmissionStatus::Judging),
            )
            .filter(submission::Column::Id.eq(id))
            .filter(submission::Column::Status.eq(SubmissionStatus::Pending))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_submission(id).await
    }

    async fn apply_verdict(
        &self,
        id: i32,
        update: VerdictUpdate,
    ) -> Result<ApplyOutcome, StorageError> {
        let txn = self.db.begin().await?;

        let Some(current) = submission::Entity::find_by_id(id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Ok(ApplyOutcome::NotFound);
        };

        let previous = current.status;
        if previous.is_final() {
            txn.rollback().await?;
            return Ok(ApplyOutcome::AlreadyFinal(submission_from_model(current)?));
        }
        if !previous.can_transition_to(update.status) {
            txn.rollback().await?;
            return Err(StorageError::IllegalTransition {
                from: previous,
                to: update.status,
            });
        }

        let mut active = current.into_active_model();
        active.status = Set(update.status);
        active.time_ms = Set(Some(update.time_ms));
        active.memory_kb = Set(Some(update.memory_kb));
        active.passed = Set(Some(update.passed));
        active.total = Set(Some(update.total));
        active.score = Set(update.score);
        active.judged_at = Set(Some(update.judged_at));
        let updated = active.update(&txn).await?;

        let first_accepted = update.status.is_accepted() && !previous.is_accepted();
        if first_accepted {
            problem::Entity::update_many()
                .col_expr(
                    problem::Column::AcceptedCount,
                    Expr::col(problem::Column::AcceptedCount).add(1),
                )
                .filter(problem::Column::Id.eq(updated.problem_id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        debug!(submission_id = id, %previous, status = %update.status, "Verdict committed");

        Ok(ApplyOutcome::Applied {
            previous,
            submission: submission_from_model(updated)?,
            first_accepted,
        })
    }

    async fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Submission>, StorageError> {
        let stale = Condition::any()
            .add(submission::Column::DispatchedAt.lt(older_than))
            .add(
                Condition::all()
                    .add(submission::Column::DispatchedAt.is_null())
                    .add(submission::Column::CreatedAt.lt(older_than)),
            );

        submission::Entity::find()
            .filter(submission::Column::Status.eq(SubmissionStatus::Pending))
            .filter(stale)
            .order_by_asc(submission::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(submission_from_model)
            .collect()
    }

    async fn record_dispatch(&self, id: i32, at: DateTime<Utc>) -> Result<(), StorageError> {
        submission::Entity::update_many()
            .col_expr(submission::Column::DispatchedAt, Expr::value(at))
            .col_expr(
                submission::Column::DispatchCount,
                Expr::col(submission::Column::DispatchCount).add(1),
            )
            .filter(submission::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn create_participation(
        &self,
        new: NewParticipation,
    ) -> Result<Participation, StorageError> {
        let model = contest_participation::ActiveModel {
            contest_id: Set(new.contest_id),
            user_id: Set(new.user_id),
            mode: Set(new.mode),
            registered_at: Set(new.registered_at),
            starts_at: Set(new.starts_at),
            ends_at: Set(new.ends_at),
            problems: Set(serde_json::json!([])),
            total_score: Set(0.0),
            last_improved_at: Set(None),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| match e.sql_err() {
            // idx_participation_official: one official record per (contest, user)
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                StorageError::Conflict("Already registered for this contest".into())
            }
            _ => StorageError::Database(e),
        })?;
        participation_from_model(model)
    }

    async fn find_participation(&self, id: i32) -> Result<Option<Participation>, StorageError> {
        contest_participation::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(participation_from_model)
            .transpose()
    }

    async fn find_latest_participation(
        &self,
        contest_id: i32,
        user_id: i32,
        mode: Option<ContestMode>,
    ) -> Result<Option<Participation>, StorageError> {
        let mut query = contest_participation::Entity::find()
            .filter(contest_participation::Column::ContestId.eq(contest_id))
            .filter(contest_participation::Column::UserId.eq(user_id));
        if let Some(mode) = mode {
            query = query.filter(contest_participation::Column::Mode.eq(mode));
        }

        query
            .order_by_desc(contest_participation::Column::Id)
            .one(&self.db)
            .await?
            .map(participation_from_model)
            .transpose()
    }

    async fn list_participations(
        &self,
        contest_id: i32,
    ) -> Result<Vec<Participation>, StorageError> {
        contest_participation::Entity::find()
            .filter(contest_participation::Column::ContestId.eq(contest_id))
            .order_by_asc(contest_participation::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(participation_from_model)
            .collect()
    }

    async fn update_participation(
        &self,
        id: i32,
        update: ParticipationUpdate<'_>,
    ) -> Result<Option<Participation>, StorageError> {
        let txn = self.db.begin().await?;

        let Some(model) = contest_participation::Entity::find_by_id(id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Ok(None);
        };

        let mut participation = participation_from_model(model.clone())?;
        if !update(&mut participation) {
            txn.rollback().await?;
            return Ok(Some(participation));
        }

        let mut active = model.into_active_model();
        active.problems = Set(serde_json::to_value(&participation.problems)?);
        active.total_score = Set(participation.total_score);
        active.last_improved_at = Set(participation.last_improved_at);
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(Some(participation))
    }
}
