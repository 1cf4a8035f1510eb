use db::{DbConfig, DbError, repositories::JobRepository};

/// Fresh in-memory store for a single test.
pub async fn setup_repo() -> Result<JobRepository, DbError> {
    db::init(DbConfig::memory()).await
}
