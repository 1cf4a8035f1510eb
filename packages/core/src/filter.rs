//! Client-side filter pipeline run on every job creation attempt.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::{JobDescriptor, JobId, JobState};

/// Filter errors. Any error aborts the creation attempt.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Filter '{filter}' failed: {source}")]
    Failed {
        filter: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Future type for async filter hooks.
pub type FilterFuture<'a> = Pin<Box<dyn Future<Output = Result<(), FilterError>> + Send + 'a>>;

/// State of a single creation attempt as seen by filters.
pub struct CreatingContext {
    descriptor: JobDescriptor,
    initial_state: JobState,
    canceled: bool,
    held: Vec<Box<dyn Any + Send + Sync>>,
}

impl CreatingContext {
    pub fn new(descriptor: JobDescriptor, initial_state: JobState) -> Self {
        Self {
            descriptor,
            initial_state,
            canceled: false,
            held: Vec::new(),
        }
    }

    /// The job about to be created.
    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    /// Route a descriptor without an explicit queue to `queue`.
    pub fn resolve_queue(&mut self, queue: &str) {
        if self.descriptor.queue.is_none() {
            self.descriptor.queue = Some(queue.to_string());
        }
    }

    /// The state the job will be created in.
    pub fn initial_state(&self) -> &JobState {
        &self.initial_state
    }

    /// Cancel the creation. No job is persisted and no ID is returned.
    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// Keep `resource` alive until the creation attempt has finished,
    /// i.e. after the job was persisted or the attempt was abandoned.
    pub fn hold_until_created(&mut self, resource: impl Any + Send + Sync) {
        self.held.push(Box::new(resource));
    }

    /// Split the context into its descriptor, initial state and held resources.
    pub fn into_parts(self) -> (JobDescriptor, JobState, Vec<Box<dyn Any + Send + Sync>>) {
        (self.descriptor, self.initial_state, self.held)
    }
}

impl std::fmt::Debug for CreatingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatingContext")
            .field("descriptor", &self.descriptor)
            .field("initial_state", &self.initial_state)
            .field("canceled", &self.canceled)
            .field("held", &self.held.len())
            .finish()
    }
}

/// Trait for client filters.
pub trait ClientFilter: Send + Sync + 'static {
    /// Called right before a job is persisted. May cancel the creation.
    fn on_creating<'a>(&'a self, context: &'a mut CreatingContext) -> FilterFuture<'a>;

    /// Called after a job was persisted.
    fn on_created(&self, _job_id: JobId, _descriptor: &JobDescriptor) {}
}

/// Ordered set of named client filters.
///
/// Installing a filter under an existing name replaces it in place.
#[derive(Default)]
pub struct FilterPipeline {
    filters: RwLock<Vec<(String, Arc<dyn ClientFilter>)>>,
}

impl FilterPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `filter` under `name`, replacing any filter of that name.
    pub fn install(&self, name: impl Into<String>, filter: Arc<dyn ClientFilter>) {
        let name = name.into();
        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        match filters.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = filter,
            None => filters.push((name, filter)),
        }
    }

    /// Remove the filter installed under `name`. Returns whether one was found.
    pub fn remove(&self, name: &str) -> bool {
        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        let before = filters.len();
        filters.retain(|(existing, _)| existing != name);
        filters.len() != before
    }

    /// Check if a filter is installed under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(existing, _)| existing == name)
    }

    /// Names of the installed filters, in execution order.
    pub fn names(&self) -> Vec<String> {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.filters.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the installed filters, so hooks run without holding the lock.
    pub fn snapshot(&self) -> Vec<(String, Arc<dyn ClientFilter>)> {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    struct CancelAll;

    impl ClientFilter for CancelAll {
        fn on_creating<'a>(&'a self, context: &'a mut CreatingContext) -> FilterFuture<'a> {
            Box::pin(async move {
                context.cancel();
                Ok(())
            })
        }
    }

    struct Noop;

    impl ClientFilter for Noop {
        fn on_creating<'a>(&'a self, _context: &'a mut CreatingContext) -> FilterFuture<'a> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn install_replaces_by_name() {
        let pipeline = FilterPipeline::new();
        pipeline.install("audit", Arc::new(Noop));
        pipeline.install("guard", Arc::new(Noop));
        pipeline.install("audit", Arc::new(CancelAll));

        assert_eq!(pipeline.names(), vec!["audit".to_string(), "guard".to_string()]);
        assert!(pipeline.remove("guard"));
        assert!(!pipeline.remove("guard"));
        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn resolve_queue_keeps_explicit_queue() {
        let mut implicit =
            CreatingContext::new(JobDescriptor::new("T", "Run"), JobState::enqueued_now());
        implicit.resolve_queue("main");
        assert_eq!(implicit.descriptor().queue.as_deref(), Some("main"));

        let mut explicit = CreatingContext::new(
            JobDescriptor::new("T", "Run").on_queue("critical"),
            JobState::enqueued_now(),
        );
        explicit.resolve_queue("main");
        assert_eq!(explicit.descriptor().queue.as_deref(), Some("critical"));
    }

    #[tokio::test]
    async fn filter_can_cancel_and_hold() {
        let pipeline = FilterPipeline::new();
        pipeline.install("cancel", Arc::new(CancelAll));

        let mut context =
            CreatingContext::new(JobDescriptor::new("T", "Run"), JobState::enqueued_now());
        context.hold_until_created(42u8);
        for (_, filter) in pipeline.snapshot() {
            filter.on_creating(&mut context).await.unwrap();
        }

        assert!(context.is_canceled());
        let (_, _, held) = context.into_parts();
        assert_eq!(held.len(), 1);
    }
}
