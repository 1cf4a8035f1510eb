//! Client filter that cancels duplicate creations.

use std::sync::Arc;

use job_core::{
    ClientFilter, CreatingContext, FilterFuture, JobDescriptor, JobId, JobMetadata, MonitoringApi,
};

use crate::detector::{DuplicateJobDetector, DuplicateMatch};
use crate::{IdempotencyError, IdempotentConfig};

/// Cancels the creation of an idempotent job while an equal job is pending.
///
/// Jobs whose method is not flagged idempotent pass through untouched.
pub struct IdempotentJobFilter {
    detector: DuplicateJobDetector,
    metadata: Arc<dyn JobMetadata>,
}

impl IdempotentJobFilter {
    pub fn builder() -> IdempotentJobFilterBuilder {
        IdempotentJobFilterBuilder::default()
    }

    pub fn detector(&self) -> &DuplicateJobDetector {
        &self.detector
    }

    pub fn config(&self) -> &IdempotentConfig {
        self.detector.config()
    }

    async fn check(&self, context: &mut CreatingContext) -> Result<(), IdempotencyError> {
        if !self.metadata.is_idempotent(context.descriptor()) {
            tracing::trace!("{} is not idempotent, skipping", context.descriptor());
            return Ok(());
        }

        // Stored under the same queue the scan looks in.
        context.resolve_queue(&self.config().default_queue);

        let found = if self.config().serialize_creation {
            let (found, guard) = self.detector.check_and_hold(context.descriptor()).await?;
            if found.is_none() {
                context.hold_until_created(guard);
            }
            found
        } else {
            self.detector.find_duplicate(context.descriptor()).await?
        };

        if let Some(DuplicateMatch { pool, record_id }) = found {
            tracing::info!(
                "Duplicate of {} is already {} as job {}, cancelling creation",
                context.descriptor(),
                pool,
                record_id
            );
            context.cancel();
        }

        Ok(())
    }
}

impl ClientFilter for IdempotentJobFilter {
    fn on_creating<'a>(&'a self, context: &'a mut CreatingContext) -> FilterFuture<'a> {
        Box::pin(async move { Ok(self.check(context).await?) })
    }

    fn on_created(&self, job_id: JobId, descriptor: &JobDescriptor) {
        tracing::trace!("Created job {} for {}", job_id, descriptor);
    }
}

/// Builder for [`IdempotentJobFilter`].
#[derive(Default)]
pub struct IdempotentJobFilterBuilder {
    monitoring: Option<Arc<dyn MonitoringApi>>,
    metadata: Option<Arc<dyn JobMetadata>>,
    config: Option<IdempotentConfig>,
}

impl IdempotentJobFilterBuilder {
    pub fn monitoring(mut self, monitoring: Arc<dyn MonitoringApi>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    pub fn metadata(mut self, metadata: Arc<dyn JobMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn config(mut self, config: IdempotentConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<IdempotentJobFilter, IdempotencyError> {
        let metadata = self
            .metadata
            .ok_or(IdempotencyError::MissingCollaborator("metadata"))?;

        let mut detector = DuplicateJobDetector::builder();
        if let Some(monitoring) = self.monitoring {
            detector = detector.monitoring(monitoring);
        }
        if let Some(config) = self.config {
            detector = detector.config(config);
        }

        Ok(IdempotentJobFilter {
            detector: detector.build()?,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use job_core::{JobState, MonitoringFuture, PendingJobRecord};

    use super::*;
    use crate::IdempotentMethods;

    /// Every pool holds one copy of `job`.
    struct Everywhere {
        job: JobDescriptor,
    }

    impl MonitoringApi for Everywhere {
        fn enqueued_jobs<'a>(&'a self, _: &'a str, _: usize, _: usize) -> MonitoringFuture<'a> {
            Box::pin(async move { Ok(vec![PendingJobRecord::new("q-1", Some(self.job.clone()))]) })
        }

        fn scheduled_jobs(&self, _: usize, _: usize) -> MonitoringFuture<'_> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn fetched_jobs<'a>(&'a self, _: &'a str, _: usize, _: usize) -> MonitoringFuture<'a> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn filter(job: JobDescriptor, methods: IdempotentMethods) -> IdempotentJobFilter {
        IdempotentJobFilter::builder()
            .monitoring(Arc::new(Everywhere { job }))
            .metadata(Arc::new(methods))
            .config(IdempotentConfig::default())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn cancels_pending_duplicate() {
        let job = JobDescriptor::new("T", "Run");
        let filter = filter(job.clone(), IdempotentMethods::new().with("T", "Run"));

        let mut context = CreatingContext::new(job, JobState::enqueued_now());
        filter.on_creating(&mut context).await.unwrap();
        assert!(context.is_canceled());
    }

    #[tokio::test]
    async fn holds_scan_lock_when_accepted() {
        let filter = filter(
            JobDescriptor::new("T", "Run"),
            IdempotentMethods::new().with("T", "Run"),
        );

        let mut context =
            CreatingContext::new(JobDescriptor::new("T", "Run").with_arg(2), JobState::enqueued_now());
        filter.on_creating(&mut context).await.unwrap();
        assert!(!context.is_canceled());

        let (descriptor, _, held) = context.into_parts();
        assert_eq!(descriptor.queue.as_deref(), Some("default"));
        assert_eq!(held.len(), 1);
    }

    #[tokio::test]
    async fn unflagged_methods_pass_through() {
        let job = JobDescriptor::new("T", "Run");
        let filter = filter(job.clone(), IdempotentMethods::new());

        let mut context = CreatingContext::new(job, JobState::enqueued_now());
        filter.on_creating(&mut context).await.unwrap();
        assert!(!context.is_canceled());
    }

    #[tokio::test]
    async fn unserialized_mode_releases_lock() {
        let filter = IdempotentJobFilter::builder()
            .monitoring(Arc::new(Everywhere {
                job: JobDescriptor::new("T", "Run"),
            }))
            .metadata(Arc::new(IdempotentMethods::new().with("T", "Run")))
            .config(IdempotentConfig::default().with_serialize_creation(false))
            .build()
            .unwrap();

        let mut context =
            CreatingContext::new(JobDescriptor::new("T", "Run").with_arg(2), JobState::enqueued_now());
        filter.on_creating(&mut context).await.unwrap();

        let (_, _, held) = context.into_parts();
        assert!(held.is_empty());
    }

    #[test]
    fn builder_requires_collaborators() {
        let monitoring = || -> Arc<dyn MonitoringApi> {
            Arc::new(Everywhere {
                job: JobDescriptor::new("T", "Run"),
            })
        };

        let missing_metadata = IdempotentJobFilter::builder()
            .monitoring(monitoring())
            .config(IdempotentConfig::default())
            .build();
        assert!(matches!(
            missing_metadata,
            Err(IdempotencyError::MissingCollaborator("metadata"))
        ));

        let missing_monitoring = IdempotentJobFilter::builder()
            .metadata(Arc::new(IdempotentMethods::new()))
            .config(IdempotentConfig::default())
            .build();
        assert!(matches!(
            missing_monitoring,
            Err(IdempotencyError::MissingCollaborator("monitoring"))
        ));

        let missing_config = IdempotentJobFilter::builder()
            .monitoring(monitoring())
            .metadata(Arc::new(IdempotentMethods::new()))
            .build();
        assert!(matches!(
            missing_config,
            Err(IdempotencyError::MissingCollaborator("config"))
        ));
    }
}
