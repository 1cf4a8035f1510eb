//! Job repository: persistence plus the pending-pool queries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use job_core::{Job, JobDescriptor, JobId, JobState, PendingJobRecord};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use crate::{Database, DbError};

/// A pending pool, as stored in `state_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    Enqueued,
    Scheduled,
    Processing,
}

impl Pool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pool::Enqueued => "enqueued",
            Pool::Scheduled => "scheduled",
            Pool::Processing => "processing",
        }
    }

    fn order_clause(&self) -> &'static str {
        match self {
            Pool::Scheduled => "ORDER BY due_ms ASC, seq ASC",
            _ => "ORDER BY seq ASC",
        }
    }
}

/// Repository for job persistence operations.
#[derive(Clone)]
pub struct JobRepository {
    db: Database,
}

/// Descriptors are stored as JSON text. Native SurrealDB objects drop
/// `null` members and cannot hold integers above `i64::MAX`, and stored
/// arguments must compare equal to the caller's.
fn encode_descriptor(descriptor: &JobDescriptor) -> Result<serde_json::Value, DbError> {
    serde_json::to_string(descriptor)
        .map(serde_json::Value::String)
        .map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode_descriptor(value: serde_json::Value) -> Result<JobDescriptor, String> {
    match value {
        serde_json::Value::String(text) => {
            serde_json::from_str(&text).map_err(|e| e.to_string())
        }
        other => Err(format!("expected encoded descriptor, found {}", other)),
    }
}

/// Internal record type for SurrealDB.
#[derive(Debug, Serialize, Deserialize)]
struct JobRecord {
    job_id: String,
    queue: String,
    /// Encoded with [`encode_descriptor`].
    #[serde(default)]
    descriptor: Option<serde_json::Value>,
    state: JobState,
    state_name: String,
    #[serde(default)]
    attempts: u32,
    /// Creation order, microseconds since the epoch.
    seq: i64,
    /// Activation time of scheduled jobs, milliseconds since the epoch.
    #[serde(default)]
    due_ms: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRecord {
    fn from_job(job: &Job) -> Result<Self, DbError> {
        Ok(Self {
            job_id: job.id.to_string(),
            queue: job.queue.clone(),
            descriptor: Some(encode_descriptor(&job.descriptor)?),
            state: job.state.clone(),
            state_name: job.state.as_str().to_string(),
            attempts: job.attempts,
            seq: job.created_at.timestamp_micros(),
            due_ms: job.state.enqueue_at().map(|at| at.timestamp_millis()),
            created_at: job.created_at,
            updated_at: job.updated_at,
        })
    }

    fn into_job(self) -> Result<Job, DbError> {
        let id = JobId::parse(&self.job_id)
            .map_err(|e| DbError::Serialization(format!("job id {}: {}", self.job_id, e)))?;
        let descriptor = self
            .descriptor
            .ok_or_else(|| DbError::Serialization(format!("job {} has no descriptor", id)))?;
        let descriptor = decode_descriptor(descriptor)
            .map_err(|e| DbError::Serialization(format!("job {}: {}", id, e)))?;

        Ok(Job {
            id,
            descriptor,
            queue: self.queue,
            state: self.state,
            attempts: self.attempts,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Minimal projection used for pool scans; tolerant of broken records.
#[derive(Debug, Deserialize)]
struct PoolRecord {
    #[serde(default)]
    id: Option<Thing>,
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    descriptor: Option<serde_json::Value>,
}

impl PoolRecord {
    fn into_pending(self) -> PendingJobRecord {
        let record_id = self
            .job_id
            .or_else(|| self.id.map(|thing| thing.id.to_raw()))
            .unwrap_or_default();

        let job = match self.descriptor {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => match decode_descriptor(value) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    tracing::warn!("Unreadable descriptor on job {}: {}", record_id, e);
                    None
                }
            },
        };

        PendingJobRecord::new(record_id, job)
    }
}

impl JobRepository {
    /// Wrap an open connection.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying connection.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Create a new job in the database.
    pub async fn create(&self, job: &Job) -> Result<Job, DbError> {
        let record = JobRecord::from_job(job)?;

        let created: Option<JobRecord> = self
            .db
            .create(("job", job.id.to_string()))
            .content(record)
            .await?;

        created
            .ok_or_else(|| DbError::Query("Failed to create job".into()))?
            .into_job()
    }

    /// Get a job by ID.
    pub async fn get(&self, id: JobId) -> Result<Job, DbError> {
        let record: Option<JobRecord> = self.db.select(("job", id.to_string())).await?;

        record
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))?
            .into_job()
    }

    /// Move a job to a new state.
    pub async fn set_state(&self, id: JobId, state: &JobState) -> Result<Job, DbError> {
        let mut result = self
            .db
            .query(
                "UPDATE type::thing('job', $id) SET state = $state, state_name = $state_name, due_ms = $due_ms, updated_at = $now RETURN AFTER",
            )
            .bind(("id", id.to_string()))
            .bind(("state", state.clone()))
            .bind(("state_name", state.as_str()))
            .bind(("due_ms", state.enqueue_at().map(|at| at.timestamp_millis())))
            .bind(("now", Utc::now()))
            .await?;

        let records: Vec<JobRecord> = result.take(0)?;

        records
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))?
            .into_job()
    }

    /// Claim the oldest enqueued job of `queue` for `worker_id`.
    ///
    /// The claim only succeeds if the job is still enqueued, so two
    /// claimers never receive the same job.
    pub async fn claim_next(&self, queue: &str, worker_id: &str) -> Result<Option<Job>, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                SELECT * FROM job
                WHERE state_name = "enqueued" AND queue = $queue
                ORDER BY seq ASC
                LIMIT 1
                "#,
            )
            .bind(("queue", queue.to_string()))
            .await?;

        let candidates: Vec<PoolRecord> = result.take(0)?;
        let Some(candidate) = candidates.into_iter().next() else {
            return Ok(None);
        };
        let record_id = candidate.into_pending().record_id;

        let state = JobState::Processing {
            started_at: Utc::now(),
            worker_id: worker_id.to_string(),
        };

        let mut result = self
            .db
            .query(
                r#"
                UPDATE type::thing('job', $id)
                SET state = $state, state_name = "processing", attempts += 1, updated_at = $now
                WHERE state_name = "enqueued"
                RETURN AFTER
                "#,
            )
            .bind(("id", record_id.clone()))
            .bind(("state", state))
            .bind(("now", Utc::now()))
            .await?;

        let records: Vec<JobRecord> = result.take(0)?;
        let Some(record) = records.into_iter().next() else {
            return Ok(None);
        };
        let attempts = record.attempts;

        match record.into_job() {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                // Nothing can run it; take it out of the claimed pool.
                let marked = self
                    .db
                    .query(
                        "UPDATE type::thing('job', $id) SET state = $state, state_name = \"failed\", updated_at = $now",
                    )
                    .bind(("id", record_id.clone()))
                    .bind((
                        "state",
                        JobState::Failed {
                            failed_at: Utc::now(),
                            error: e.to_string(),
                            attempts,
                        },
                    ))
                    .bind(("now", Utc::now()))
                    .await
                    .and_then(|response| response.check());
                if let Err(mark_err) = marked {
                    tracing::warn!(
                        "Unreadable job {} left in processing: {}",
                        record_id,
                        mark_err
                    );
                }
                Err(e)
            }
        }
    }

    /// List one pending pool, oldest first.
    ///
    /// `queue` narrows the pool to a single queue when given.
    pub async fn list_pool(
        &self,
        pool: Pool,
        queue: Option<&str>,
        offset: usize,
        count: usize,
    ) -> Result<Vec<PendingJobRecord>, DbError> {
        let queue_clause = if queue.is_some() {
            "AND queue = $queue"
        } else {
            ""
        };

        let query = format!(
            "SELECT * FROM job WHERE state_name = $state {} {} LIMIT $limit START $start",
            queue_clause,
            pool.order_clause()
        );

        let mut request = self
            .db
            .query(query)
            .bind(("state", pool.as_str()))
            .bind(("limit", i64::try_from(count).unwrap_or(i64::MAX)))
            .bind(("start", i64::try_from(offset).unwrap_or(i64::MAX)));

        if let Some(queue) = queue {
            request = request.bind(("queue", queue.to_string()));
        }

        let mut response = request.await?;
        let records: Vec<PoolRecord> = response.take(0)?;

        Ok(records.into_iter().map(PoolRecord::into_pending).collect())
    }

    /// Move every scheduled job that is due at `now` back to its queue.
    pub async fn promote_due(&self, now: DateTime<Utc>) -> Result<Vec<Job>, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                UPDATE job
                SET state = $state, state_name = "enqueued", due_ms = NONE, updated_at = $now
                WHERE state_name = "scheduled" AND due_ms <= $now_ms
                RETURN AFTER
                "#,
            )
            .bind(("state", JobState::Enqueued { enqueued_at: now }))
            .bind(("now", now))
            .bind(("now_ms", now.timestamp_millis()))
            .await?;

        let records: Vec<JobRecord> = result.take(0)?;

        Ok(records
            .into_iter()
            .filter_map(|record| match record.into_job() {
                Ok(job) => Some(job),
                Err(e) => {
                    tracing::warn!("Promoted unreadable job: {}", e);
                    None
                }
            })
            .collect())
    }

    /// Delete a job.
    pub async fn delete(&self, id: JobId) -> Result<(), DbError> {
        let _: Option<PoolRecord> = self.db.delete(("job", id.to_string())).await?;

        Ok(())
    }

    /// Count jobs by state name, optionally for a single queue.
    pub async fn count_by_state(&self, queue: Option<&str>) -> Result<HashMap<String, u64>, DbError> {
        let query = if queue.is_some() {
            "SELECT state_name, count() AS count FROM job WHERE queue = $queue GROUP BY state_name"
        } else {
            "SELECT state_name, count() AS count FROM job GROUP BY state_name"
        };

        let mut request = self.db.query(query);
        if let Some(queue) = queue {
            request = request.bind(("queue", queue.to_string()));
        }
        let mut result = request.await?;

        #[derive(Deserialize)]
        struct StateCount {
            state_name: Option<String>,
            count: i64,
        }

        let counts: Vec<StateCount> = result.take(0)?;

        let mut map = HashMap::new();
        for count in counts {
            if let Some(state) = count.state_name {
                map.insert(state, count.count as u64);
            }
        }

        Ok(map)
    }
}
