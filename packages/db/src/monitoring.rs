//! Monitoring interface backed by the job table.

use job_core::{MonitoringApi, MonitoringError, MonitoringFuture};

use crate::DbError;
use crate::repositories::{JobRepository, Pool};

/// Serves the pending pools straight from `JobRepository`.
#[derive(Clone)]
pub struct StorageMonitoringApi {
    repo: JobRepository,
}

impl StorageMonitoringApi {
    pub fn new(repo: JobRepository) -> Self {
        Self { repo }
    }
}

fn to_monitoring(e: DbError) -> MonitoringError {
    match e {
        DbError::Connection(e) => MonitoringError::Unavailable(e.to_string()),
        other => MonitoringError::Query(other.to_string()),
    }
}

impl MonitoringApi for StorageMonitoringApi {
    fn enqueued_jobs<'a>(
        &'a self,
        queue: &'a str,
        offset: usize,
        count: usize,
    ) -> MonitoringFuture<'a> {
        Box::pin(async move {
            self.repo
                .list_pool(Pool::Enqueued, Some(queue), offset, count)
                .await
                .map_err(to_monitoring)
        })
    }

    fn scheduled_jobs(&self, offset: usize, count: usize) -> MonitoringFuture<'_> {
        Box::pin(async move {
            self.repo
                .list_pool(Pool::Scheduled, None, offset, count)
                .await
                .map_err(to_monitoring)
        })
    }

    fn fetched_jobs<'a>(
        &'a self,
        queue: &'a str,
        offset: usize,
        count: usize,
    ) -> MonitoringFuture<'a> {
        Box::pin(async move {
            self.repo
                .list_pool(Pool::Processing, Some(queue), offset, count)
                .await
                .map_err(to_monitoring)
        })
    }
}
