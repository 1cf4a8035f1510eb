//! Job domain types for work items in the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an invocable method: declaring type plus method name.
///
/// Overloads are not distinguished; two methods with the same name on the
/// same type share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodKey {
    pub type_name: String,
    pub method: String,
}

impl MethodKey {
    pub fn new(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            method: method.into(),
        }
    }
}

impl std::fmt::Display for MethodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.type_name, self.method)
    }
}

/// Canonical description of a unit of work: what to call, with which
/// arguments, on which queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Declaring type of the work item.
    pub type_name: String,
    /// Method to invoke (name only).
    pub method: String,
    /// Ordered, type-erased arguments. `Null` stands for an absent value.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    /// Target queue; `None` means the default queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
}

impl JobDescriptor {
    /// Create a descriptor with no arguments on the default queue.
    pub fn new(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            method: method.into(),
            args: Vec::new(),
            queue: None,
        }
    }

    /// Replace the argument list.
    pub fn with_args(mut self, args: Vec<serde_json::Value>) -> Self {
        self.args = args;
        self
    }

    /// Append a single argument.
    pub fn with_arg(mut self, arg: impl Into<serde_json::Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Target an explicit queue.
    pub fn on_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// The method identity this descriptor invokes.
    pub fn method_key(&self) -> MethodKey {
        MethodKey::new(&self.type_name, &self.method)
    }

    /// The explicit queue, or `default` when none was given.
    pub fn queue_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.queue.as_deref().unwrap_or(default)
    }
}

impl std::fmt::Display for JobDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}({} args)", self.type_name, self.method, self.args.len())
    }
}

/// Current state of a job in its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in its queue for a worker.
    Enqueued { enqueued_at: DateTime<Utc> },
    /// Deferred until `enqueue_at`, then promoted to enqueued.
    Scheduled {
        enqueue_at: DateTime<Utc>,
        scheduled_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Claimed by a worker and executing.
    Processing {
        started_at: DateTime<Utc>,
        worker_id: String,
    },
    /// Finished successfully.
    Succeeded {
        started_at: DateTime<Utc>,
        succeeded_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<serde_json::Value>,
    },
    /// Failed with no retries left.
    Failed {
        failed_at: DateTime<Utc>,
        error: String,
        attempts: u32,
    },
    /// Removed before completion.
    Deleted {
        deleted_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl JobState {
    /// Enqueued as of now.
    pub fn enqueued_now() -> Self {
        JobState::Enqueued {
            enqueued_at: Utc::now(),
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded { .. } | JobState::Failed { .. } | JobState::Deleted { .. }
        )
    }

    /// Check if the job is still in flight (enqueued, scheduled or processing).
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Get a simple state string, also used as the stored state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Enqueued { .. } => "enqueued",
            JobState::Scheduled { .. } => "scheduled",
            JobState::Processing { .. } => "processing",
            JobState::Succeeded { .. } => "succeeded",
            JobState::Failed { .. } => "failed",
            JobState::Deleted { .. } => "deleted",
        }
    }

    /// Activation time for scheduled jobs.
    pub fn enqueue_at(&self) -> Option<DateTime<Utc>> {
        match self {
            JobState::Scheduled { enqueue_at, .. } => Some(*enqueue_at),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// What to run.
    pub descriptor: JobDescriptor,
    /// The resolved queue name (explicit or default).
    pub queue: String,
    /// Current state.
    pub state: JobState,
    /// Number of executions started so far.
    #[serde(default)]
    pub attempts: u32,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in the given initial state.
    pub fn new(descriptor: JobDescriptor, queue: impl Into<String>, state: JobState) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            descriptor,
            queue: queue.into(),
            state,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_resolves_default_queue() {
        let job = JobDescriptor::new("Reports", "Generate");
        assert_eq!(job.queue_or("default"), "default");

        let job = job.on_queue("critical");
        assert_eq!(job.queue_or("default"), "critical");
    }

    #[test]
    fn state_serializes_with_tag() {
        let state = JobState::enqueued_now();
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["state"], json!("enqueued"));
        assert_eq!(state.as_str(), "enqueued");
        assert!(state.is_pending());
    }

    #[test]
    fn terminal_states_are_not_pending() {
        let failed = JobState::Failed {
            failed_at: Utc::now(),
            error: "boom".into(),
            attempts: 2,
        };
        assert!(failed.is_terminal());
        assert!(!failed.is_pending());
        assert_eq!(failed.enqueue_at(), None);
    }

    #[test]
    fn descriptor_without_args_deserializes() {
        let descriptor: JobDescriptor =
            serde_json::from_value(json!({"type_name": "T", "method": "Run"})).unwrap();
        assert!(descriptor.args.is_empty());
        assert_eq!(descriptor.queue, None);
        assert_eq!(descriptor.method_key(), MethodKey::new("T", "Run"));
    }
}
