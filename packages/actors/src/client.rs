//! Job client: creates jobs through the client filter pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use db::DbError;
use db::repositories::JobRepository;
use job_core::{CreatingContext, FilterError, FilterPipeline, Job, JobDescriptor, JobId, JobState};
use thiserror::Error;

/// Client errors. A cancelled creation is not an error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Job creation aborted: {0}")]
    Filter(#[from] FilterError),
    #[error("Failed to persist job: {0}")]
    Storage(#[from] DbError),
}

/// State a new job is created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialState {
    /// Ready for a worker right away.
    Enqueued,
    /// Deferred until the given time.
    Scheduled { enqueue_at: DateTime<Utc> },
}

impl InitialState {
    fn into_state(self) -> JobState {
        let now = Utc::now();
        match self {
            InitialState::Enqueued => JobState::Enqueued { enqueued_at: now },
            InitialState::Scheduled { enqueue_at } => JobState::Scheduled {
                enqueue_at,
                scheduled_at: now,
                reason: None,
            },
        }
    }
}

/// Creates background jobs.
///
/// Every creation runs the installed client filters first; a filter may
/// cancel it, in which case no job is stored and `Ok(None)` is returned.
#[derive(Clone)]
pub struct BackgroundJobClient {
    repo: JobRepository,
    filters: Arc<FilterPipeline>,
    default_queue: String,
}

impl BackgroundJobClient {
    /// Create a client storing jobs in `repo`.
    pub fn new(repo: JobRepository, filters: Arc<FilterPipeline>) -> Self {
        Self {
            repo,
            filters,
            default_queue: "default".to_string(),
        }
    }

    /// Set the queue used for descriptors without an explicit queue.
    pub fn with_default_queue(mut self, queue: impl Into<String>) -> Self {
        self.default_queue = queue.into();
        self
    }

    /// The filter pipeline run on every creation.
    pub fn filters(&self) -> &Arc<FilterPipeline> {
        &self.filters
    }

    /// Enqueue a job for immediate execution.
    pub async fn enqueue(&self, descriptor: JobDescriptor) -> Result<Option<JobId>, ClientError> {
        self.create(descriptor, InitialState::Enqueued).await
    }

    /// Schedule a job to be enqueued after `delay`.
    pub async fn schedule(
        &self,
        descriptor: JobDescriptor,
        delay: Duration,
    ) -> Result<Option<JobId>, ClientError> {
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        let enqueue_at = Utc::now()
            .checked_add_signed(delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.create(descriptor, InitialState::Scheduled { enqueue_at })
            .await
    }

    /// Create a job in the given initial state.
    ///
    /// Returns `Ok(None)` when a filter cancelled the creation.
    pub async fn create(
        &self,
        descriptor: JobDescriptor,
        initial: InitialState,
    ) -> Result<Option<JobId>, ClientError> {
        let mut context = CreatingContext::new(descriptor, initial.into_state());
        let filters = self.filters.snapshot();

        for (name, filter) in &filters {
            filter.on_creating(&mut context).await?;
            if context.is_canceled() {
                tracing::info!(
                    "Creation of {} cancelled by filter '{}'",
                    context.descriptor(),
                    name
                );
                return Ok(None);
            }
        }

        let (descriptor, state, held) = context.into_parts();
        let queue = descriptor.queue_or(&self.default_queue).to_string();
        let job = Job::new(descriptor, queue, state);
        let created = self.repo.create(&job).await?;

        // Released only once the job is visible in its pool.
        drop(held);

        for (_, filter) in &filters {
            filter.on_created(created.id, &created.descriptor);
        }

        tracing::debug!(
            "Created job {} ({}) on queue {} as {}",
            created.id,
            created.descriptor,
            created.queue,
            created.state
        );

        Ok(Some(created.id))
    }
}
