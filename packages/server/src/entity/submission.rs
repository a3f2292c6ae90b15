use common::SubmissionStatus;
use sea_orm::entity::prelude::*;

use crate::models::contest::ContestMode;

/// `kind` column values.
pub const KIND_REGULAR: &str = "regular";
pub const KIND_CONTEST: &str = "contest";

/// The submission kind is flattened into `kind`, `contest_id`, `contest_mode` and
/// `participation_id`. See [`crate::models::submission::SubmissionKind`].
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub short_id: String,

    pub problem_id: i32,
    #[sea_orm(belongs_to, from = "problem_id", to = "id")]
    pub problem: HasOne<super::problem::Entity>,

    pub user_id: i32,
    #[sea_orm(column_type = "Text")]
    pub source_code: String,
    pub language: String,

    /// "regular" or "contest".
    pub kind: String,
    pub contest_id: Option<i32>,
    #[sea_orm(belongs_to, from = "contest_id", to = "id")]
    pub contest: BelongsTo<Option<super::contest::Entity>>,
    pub contest_mode: Option<ContestMode>,
    /// Set for virtual contest submissions only.
    pub participation_id: Option<i32>,

    pub status: SubmissionStatus,
    pub time_ms: Option<i32>,
    pub memory_kb: Option<i32>,
    pub passed: Option<i32>,
    pub total: Option<i32>,
    pub score: Option<f64>,

    pub created_at: DateTimeUtc,
    pub judged_at: Option<DateTimeUtc>,
    pub dispatched_at: Option<DateTimeUtc>,
    #[sea_orm(default_value = 0)]
    pub dispatch_count: i32,
}

impl ActiveModelBehavior for ActiveModel {}
