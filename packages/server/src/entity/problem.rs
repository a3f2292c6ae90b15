use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "problem")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    pub time_limit: i32,   // in milliseconds
    pub memory_limit: i32, // in kilobytes
    /// Owned by test-case ingestion.
    #[sea_orm(default_value = 0)]
    pub test_case_count: i32,

    /// Only ever changed with `SET col = col + 1`.
    #[sea_orm(default_value = 0)]
    pub submission_count: i64,
    #[sea_orm(default_value = 0)]
    pub accepted_count: i64,

    #[sea_orm(has_many)]
    pub submissions: HasMany<super::submission::Entity>,

    #[sea_orm(has_many, via = "contest_problem")]
    pub contests: HasMany<super::contest::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
