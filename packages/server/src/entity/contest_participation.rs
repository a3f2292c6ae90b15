use sea_orm::entity::prelude::*;

use crate::models::contest::ContestMode;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "contest_participation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub contest_id: i32,
    #[sea_orm(belongs_to, from = "contest_id", to = "id")]
    pub contest: HasOne<super::contest::Entity>,
    pub user_id: i32,
    pub mode: ContestMode,

    pub registered_at: DateTimeUtc,
    pub starts_at: DateTimeUtc,
    pub ends_at: DateTimeUtc,

    /// Array of `ProblemScore`.
    #[sea_orm(column_type = "JsonBinary")]
    pub problems: Json,
    pub total_score: f64,
    pub last_improved_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
