//! Submission Store and Contest Participation Ledger.
//!
//! [`Storage`] is the only way the pipeline touches persisted state. Every operation that
//! reads and then writes (verdict application, counter increments, participation folds)
//! is atomic inside the implementation, so callers never hold locks across awaits.

pub mod memory;
pub mod sea;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::SubmissionStatus;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::info;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::models::contest::{Contest, ContestMode, NewContest, NewParticipation, Participation};
use crate::models::problem::{NewProblem, Problem};
use crate::models::submission::{ApplyOutcome, NewSubmission, Submission, VerdictUpdate};

pub use memory::MemoryStorage;
pub use sea::SeaOrmStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Illegal status transition {from} -> {to}")]
    IllegalTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },
}

/// Read-modify-write step for one participation record. Returning `false` skips the write.
pub type ParticipationUpdate<'a> = Box<dyn FnOnce(&mut Participation) -> bool + Send + 'a>;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn insert_problem(&self, problem: NewProblem) -> Result<Problem, StorageError>;

    async fn find_problem(&self, id: i32) -> Result<Option<Problem>, StorageError>;

    async fn insert_contest(&self, contest: NewContest) -> Result<Contest, StorageError>;

    async fn find_contest(&self, id: i32) -> Result<Option<Contest>, StorageError>;

    /// Persist a `Pending` submission and bump the problem's submission counter in the
    /// same transaction.
    async fn create_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<Submission, StorageError>;

    async fn find_submission(&self, id: i32) -> Result<Option<Submission>, StorageError>;

    /// `Pending -> Judging`. Returns the updated submission, or `None` if it was not `Pending`.
    async fn mark_judging(&self, id: i32) -> Result<Option<Submission>, StorageError>;

    /// Write a terminal verdict under a per-submission lock.
    ///
    /// The accepted counter is incremented in the same transaction when the stored status
    /// was not `Accepted` and the new one is. A submission that is already terminal is
    /// returned untouched as [`ApplyOutcome::AlreadyFinal`].
    async fn apply_verdict(
        &self,
        id: i32,
        update: VerdictUpdate,
    ) -> Result<ApplyOutcome, StorageError>;

    /// `Pending` submissions last dispatched (or created, if never dispatched) before
    /// `older_than`, oldest first.
    async fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Submission>, StorageError>;

    /// Stamp `dispatched_at` and bump `dispatch_count`.
    async fn record_dispatch(&self, id: i32, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Fails with [`StorageError::Conflict`] for a second official record of the same user.
    async fn create_participation(
        &self,
        participation: NewParticipation,
    ) -> Result<Participation, StorageError>;

    async fn find_participation(&self, id: i32) -> Result<Option<Participation>, StorageError>;

    /// Most recent registration of `user_id`, optionally restricted to one mode.
    async fn find_latest_participation(
        &self,
        contest_id: i32,
        user_id: i32,
        mode: Option<ContestMode>,
    ) -> Result<Option<Participation>, StorageError>;

    async fn list_participations(
        &self,
        contest_id: i32,
    ) -> Result<Vec<Participation>, StorageError>;

    /// Apply `update` to one record while holding that record's lock.
    ///
    /// Returns the record as it stands afterwards, or `None` if it does not exist.
    async fn update_participation(
        &self,
        id: i32,
        update: ParticipationUpdate<'_>,
    ) -> Result<Option<Participation>, StorageError>;
}

/// Build the storage backend selected by `config.backend`.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Storage>, StorageError> {
    match config.backend {
        DatabaseBackend::Postgres => {
            let db = crate::database::init_db(&config.url).await?;
            crate::database::ensure_indexes(&db).await?;
            Ok(Arc::new(SeaOrmStorage::new(db)))
        }
        DatabaseBackend::Memory => {
            info!("Using in-memory storage");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}
