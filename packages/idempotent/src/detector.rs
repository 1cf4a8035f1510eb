//! Duplicate detection over the pending pools.

use std::sync::{Arc, LazyLock};

use job_core::{JobDescriptor, MonitoringApi};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::scanner::{PendingJobScanner, PendingPool};
use crate::{IdempotencyError, IdempotentConfig};

/// Serializes pool scans across every detector in the process.
static SCAN_LOCK: LazyLock<Arc<Mutex<()>>> = LazyLock::new(|| Arc::new(Mutex::new(())));

/// Held scan lock. No other scan in the process starts while it is alive.
pub type ScanGuard = OwnedMutexGuard<()>;

/// Where an equivalent pending job was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateMatch {
    pub pool: PendingPool,
    pub record_id: String,
}

/// Decides whether an equivalent job is already pending.
#[derive(Clone)]
pub struct DuplicateJobDetector {
    scanner: PendingJobScanner,
}

impl DuplicateJobDetector {
    pub fn builder() -> DuplicateJobDetectorBuilder {
        DuplicateJobDetectorBuilder::default()
    }

    pub fn config(&self) -> &IdempotentConfig {
        self.scanner.config()
    }

    /// Whether a job equal to `target` is queued, scheduled or claimed.
    pub async fn is_duplicate(&self, target: &JobDescriptor) -> Result<bool, IdempotencyError> {
        Ok(self.find_duplicate(target).await?.is_some())
    }

    /// The first pending job equal to `target`, searching queued, then
    /// scheduled, then claimed jobs.
    pub async fn find_duplicate(
        &self,
        target: &JobDescriptor,
    ) -> Result<Option<DuplicateMatch>, IdempotencyError> {
        let (found, _guard) = self.check_and_hold(target).await?;
        Ok(found)
    }

    /// Like [`find_duplicate`](Self::find_duplicate), but hands back the scan
    /// lock. Holding it until the accepted job is persisted keeps any other
    /// scan from missing that job.
    pub async fn check_and_hold(
        &self,
        target: &JobDescriptor,
    ) -> Result<(Option<DuplicateMatch>, ScanGuard), IdempotencyError> {
        let guard = SCAN_LOCK.clone().lock_owned().await;
        let snapshot = self.scanner.scan(target).await?;

        let found = snapshot
            .find_match(target)
            .map(|(pool, record)| DuplicateMatch {
                pool,
                record_id: record.record_id.clone(),
            });

        Ok((found, guard))
    }
}

/// Builder for [`DuplicateJobDetector`].
#[derive(Default)]
pub struct DuplicateJobDetectorBuilder {
    monitoring: Option<Arc<dyn MonitoringApi>>,
    config: Option<IdempotentConfig>,
}

impl DuplicateJobDetectorBuilder {
    pub fn monitoring(mut self, monitoring: Arc<dyn MonitoringApi>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    pub fn config(mut self, config: IdempotentConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<DuplicateJobDetector, IdempotencyError> {
        let monitoring = self
            .monitoring
            .ok_or(IdempotencyError::MissingCollaborator("monitoring"))?;
        let config = self
            .config
            .ok_or(IdempotencyError::MissingCollaborator("config"))?;
        config.validate()?;

        Ok(DuplicateJobDetector {
            scanner: PendingJobScanner::new(monitoring, Arc::new(config)),
        })
    }
}
