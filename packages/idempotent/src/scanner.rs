//! Bounded reads of the three pending pools.

use std::fmt;
use std::sync::Arc;

use job_core::{JobDescriptor, MonitoringApi, PendingJobRecord};

use crate::comparator::jobs_equal;
use crate::{IdempotencyError, IdempotentConfig};

/// A pending pool, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingPool {
    /// Waiting in a queue.
    Queued,
    /// Deferred to a future time.
    Scheduled,
    /// Claimed by a worker.
    Claimed,
}

impl PendingPool {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingPool::Queued => "queued",
            PendingPool::Scheduled => "scheduled",
            PendingPool::Claimed => "claimed",
        }
    }
}

impl fmt::Display for PendingPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidates read for one target, one bounded batch per pool.
#[derive(Debug, Clone, Default)]
pub struct ScanSnapshot {
    pub queued: Vec<PendingJobRecord>,
    pub scheduled: Vec<PendingJobRecord>,
    pub claimed: Vec<PendingJobRecord>,
}

impl ScanSnapshot {
    /// Pools with their candidates, in scan order.
    pub fn pools(&self) -> [(PendingPool, &[PendingJobRecord]); 3] {
        [
            (PendingPool::Queued, self.queued.as_slice()),
            (PendingPool::Scheduled, self.scheduled.as_slice()),
            (PendingPool::Claimed, self.claimed.as_slice()),
        ]
    }

    /// First candidate equal to `target`. Records without a readable job
    /// never match.
    pub fn find_match(&self, target: &JobDescriptor) -> Option<(PendingPool, &PendingJobRecord)> {
        self.pools().into_iter().find_map(|(pool, records)| {
            records
                .iter()
                .find(|record| record.job.as_ref().is_some_and(|job| jobs_equal(job, target)))
                .map(|record| (pool, record))
        })
    }

    /// Total number of candidates read.
    pub fn len(&self) -> usize {
        self.queued.len() + self.scheduled.len() + self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads candidate duplicates through the monitoring interface.
///
/// Queued and claimed jobs are read from the target's queue only. Scheduled
/// jobs are read across every queue, so a job scheduled on one queue blocks
/// an equivalent job submitted to another.
#[derive(Clone)]
pub struct PendingJobScanner {
    monitoring: Arc<dyn MonitoringApi>,
    config: Arc<IdempotentConfig>,
}

impl PendingJobScanner {
    pub fn new(monitoring: Arc<dyn MonitoringApi>, config: Arc<IdempotentConfig>) -> Self {
        Self { monitoring, config }
    }

    pub fn config(&self) -> &IdempotentConfig {
        &self.config
    }

    /// Read up to `max_retrievals` records from each pool, starting at offset 0.
    pub async fn scan(&self, target: &JobDescriptor) -> Result<ScanSnapshot, IdempotencyError> {
        let queue = target.queue_or(&self.config.default_queue);
        let count = self.config.max_retrievals;

        let queued = self.monitoring.enqueued_jobs(queue, 0, count).await?;
        let scheduled = self.monitoring.scheduled_jobs(0, count).await?;
        let claimed = self.monitoring.fetched_jobs(queue, 0, count).await?;

        let snapshot = ScanSnapshot {
            queued,
            scheduled,
            claimed,
        };

        tracing::debug!(
            "Scanned {} pending candidates for {} on queue {} ({} queued, {} scheduled, {} claimed)",
            snapshot.len(),
            target,
            queue,
            snapshot.queued.len(),
            snapshot.scheduled.len(),
            snapshot.claimed.len()
        );

        Ok(snapshot)
    }
}
