//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates the job table and the indexes used by the pending pools.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(JOB_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Job table schema.
///
/// The table is schemaless: descriptors carry arbitrary JSON arguments and
/// states are tagged objects.
const JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job SCHEMALESS;

-- Pool lookups: state + queue, oldest first
DEFINE INDEX IF NOT EXISTS job_id ON job FIELDS job_id UNIQUE;
DEFINE INDEX IF NOT EXISTS job_state ON job FIELDS state_name;
DEFINE INDEX IF NOT EXISTS job_state_queue ON job FIELDS state_name, queue;
DEFINE INDEX IF NOT EXISTS job_seq ON job FIELDS seq;

-- Promotion of due scheduled jobs
DEFINE INDEX IF NOT EXISTS job_due ON job FIELDS state_name, due_ms;
"#;
