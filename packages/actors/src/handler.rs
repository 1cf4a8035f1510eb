//! Job handler trait and registry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use job_core::{Job, JobDescriptor, JobMetadata, MethodKey};

/// Result type for job handlers: optional structured output on success.
pub type HandlerResult = Result<Option<serde_json::Value>, String>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Automatic retry settings for a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the first failed execution.
    pub attempts: u32,
    /// Delay before each retry; the last entry repeats.
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(10),
                Duration::from_secs(60),
            ],
        }
    }
}

impl RetryPolicy {
    /// Retry up to `attempts` times with a one second delay.
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts,
            delays: vec![Duration::from_secs(1)],
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Set the retry delays.
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    /// Delay before retrying a job whose `attempt`-th execution just failed,
    /// or `None` if no retries are left.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.attempts {
            return None;
        }
        let index = (attempt - 1) as usize;
        let delay = self
            .delays
            .get(index)
            .or(self.delays.last())
            .copied()
            .unwrap_or(Duration::from_secs(1));
        Some(delay)
    }
}

/// Trait for job handlers.
///
/// Implement this trait to define how jobs for one method are processed.
pub trait JobHandler: Send + Sync + 'static {
    /// The method this handler processes.
    fn method_key(&self) -> &MethodKey;

    /// Whether equivalent pending jobs for this method must not be created twice.
    fn idempotent(&self) -> bool {
        false
    }

    /// How failures are retried.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Maximum execution time for a single attempt.
    fn timeout(&self) -> Duration {
        Duration::from_secs(300)
    }

    /// Process a job and return the result.
    fn handle(&self, job: &Job) -> HandlerFuture;
}

/// Registry for job handlers.
///
/// Maps method identities to their handlers for dynamic dispatch.
#[derive(Default)]
pub struct JobHandlerRegistry {
    handlers: HashMap<MethodKey, Arc<dyn JobHandler>>,
}

impl JobHandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for its method.
    pub fn register<H: JobHandler>(&mut self, handler: H) {
        let key = handler.method_key().clone();
        self.handlers.insert(key, Arc::new(handler));
    }

    /// Get the handler for a method.
    pub fn get(&self, key: &MethodKey) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(key).cloned()
    }

    /// Check if a handler exists for a method.
    pub fn has_handler(&self, key: &MethodKey) -> bool {
        self.handlers.contains_key(key)
    }

    /// List all registered methods.
    pub fn methods(&self) -> Vec<&MethodKey> {
        self.handlers.keys().collect()
    }
}

impl JobMetadata for JobHandlerRegistry {
    fn is_idempotent(&self, job: &JobDescriptor) -> bool {
        self.handlers
            .get(&job.method_key())
            .is_some_and(|handler| handler.idempotent())
    }
}

/// A simple function-based job handler.
pub struct FnHandler<F>
where
    F: Fn(&Job) -> HandlerFuture + Send + Sync + 'static,
{
    key: MethodKey,
    idempotent: bool,
    retry: RetryPolicy,
    timeout: Duration,
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Job) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a new function-based handler for `type_name.method`.
    pub fn new(type_name: impl Into<String>, method: impl Into<String>, handler: F) -> Self {
        Self {
            key: MethodKey::new(type_name, method),
            idempotent: false,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(300),
            handler,
        }
    }

    /// Mark the method idempotent.
    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&Job) -> HandlerFuture + Send + Sync + 'static,
{
    fn method_key(&self) -> &MethodKey {
        &self.key
    }

    fn idempotent(&self) -> bool {
        self.idempotent
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn handle(&self, job: &Job) -> HandlerFuture {
        (self.handler)(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_job: &Job) -> HandlerFuture {
        Box::pin(async { Ok(None) })
    }

    #[test]
    fn retry_policy_delays() {
        let policy = RetryPolicy::new(2).with_delays(vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
        ]);
        assert_eq!(policy.delay_for(0), None);
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(20)));
        assert_eq!(policy.delay_for(3), None);

        let repeating = RetryPolicy::new(5).with_delays(vec![Duration::from_millis(7)]);
        assert_eq!(repeating.delay_for(4), Some(Duration::from_millis(7)));

        assert_eq!(RetryPolicy::none().delay_for(1), None);
    }

    #[test]
    fn registry_reports_idempotent_methods() {
        let mut registry = JobHandlerRegistry::new();
        registry.register(FnHandler::new("Reports", "Generate", noop).idempotent());
        registry.register(FnHandler::new("Reports", "Archive", noop));

        assert!(registry.is_idempotent(&JobDescriptor::new("Reports", "Generate")));
        assert!(!registry.is_idempotent(&JobDescriptor::new("Reports", "Archive")));
        assert!(!registry.is_idempotent(&JobDescriptor::new("Reports", "Unknown")));
        assert!(registry.has_handler(&MethodKey::new("Reports", "Archive")));
        assert_eq!(registry.methods().len(), 2);
    }
}
