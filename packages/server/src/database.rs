use std::time::Duration;

use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::entity::{contest_participation, submission};

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("judge_server::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}

/// Create secondary indexes that schema sync does not derive from the entities.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Recovery sweep:
    // SELECT ... FROM submission WHERE status = 'Pending' AND dispatched_at < ?
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_submission_status_dispatched")
        .table(submission::Entity)
        .col(submission::Column::Status)
        .col(submission::Column::DispatchedAt)
        .to_string(PostgresQueryBuilder);
    create_index(db, "idx_submission_status_dispatched", &stmt).await;

    // Participation lookups by (contest, user), newest first
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_participation_contest_user")
        .table(contest_participation::Entity)
        .col(contest_participation::Column::ContestId)
        .col(contest_participation::Column::UserId)
        .to_string(PostgresQueryBuilder);
    create_index(db, "idx_participation_contest_user", &stmt).await;

    // One official registration per (contest, user). Registration relies on this for 409s.
    db.execute_unprepared(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_participation_official \
         ON contest_participation (contest_id, user_id) WHERE mode = 'official'",
    )
    .await?;
    info!("Ensured index idx_participation_official exists");

    Ok(())
}

async fn create_index(db: &DatabaseConnection, name: &str, stmt: &str) {
    match db.execute_unprepared(stmt).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => warn!("Failed to create index {}: {}", name, e),
    }
}
