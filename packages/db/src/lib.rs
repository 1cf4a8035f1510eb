//! SurrealDB integration for the job system.
//!
//! This crate provides database connectivity, the job repository, and a
//! monitoring interface over the pending pools.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod monitoring;
mod schema;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, connect};
pub use monitoring::StorageMonitoringApi;
pub use schema::init_schema;

use repositories::JobRepository;

/// Connect with the given configuration and prepare the schema.
pub async fn init(config: DbConfig) -> Result<JobRepository, DbError> {
    let db = connect(&config).await?;
    init_schema(&db).await?;
    Ok(JobRepository::new(db))
}
