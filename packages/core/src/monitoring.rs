//! Read-only query surface over the job system's in-flight jobs.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::JobDescriptor;

/// One entry of a pending pool.
///
/// `job` is `None` when the stored payload is missing or unreadable.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJobRecord {
    pub record_id: String,
    pub job: Option<JobDescriptor>,
}

impl PendingJobRecord {
    pub fn new(record_id: impl Into<String>, job: Option<JobDescriptor>) -> Self {
        Self {
            record_id: record_id.into(),
            job,
        }
    }
}

/// Monitoring errors.
#[derive(Debug, Error)]
pub enum MonitoringError {
    #[error("Monitoring query failed: {0}")]
    Query(String),
    #[error("Monitoring unavailable: {0}")]
    Unavailable(String),
}

/// Future type for monitoring queries.
pub type MonitoringFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<PendingJobRecord>, MonitoringError>> + Send + 'a>>;

/// Pending pools exposed by the job store.
///
/// Queued and fetched (claimed) jobs are partitioned by queue; scheduled
/// jobs are not.
pub trait MonitoringApi: Send + Sync + 'static {
    /// Jobs waiting in `queue`, oldest first.
    fn enqueued_jobs<'a>(&'a self, queue: &'a str, offset: usize, count: usize)
    -> MonitoringFuture<'a>;

    /// Jobs deferred to a future time, across all queues.
    fn scheduled_jobs(&self, offset: usize, count: usize) -> MonitoringFuture<'_>;

    /// Jobs claimed by a worker from `queue`.
    fn fetched_jobs<'a>(&'a self, queue: &'a str, offset: usize, count: usize)
    -> MonitoringFuture<'a>;
}

/// Per-method metadata supplied by whoever registers job methods.
pub trait JobMetadata: Send + Sync + 'static {
    /// Whether the method `job` invokes must not be created twice while pending.
    fn is_idempotent(&self, job: &JobDescriptor) -> bool;
}
