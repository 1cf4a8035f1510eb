//! Message types for actor communication.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use job_core::{Job, JobId};
use ractor::RpcReplyPort;

/// Messages for the QueueActor.
#[derive(Debug)]
pub enum QueueMessage {
    /// Claim the next job for a worker.
    RequestJob {
        worker_id: String,
        reply: RpcReplyPort<Option<Job>>,
    },

    /// Report job completion.
    JobCompleted {
        job_id: JobId,
        worker_id: String,
        started_at: DateTime<Utc>,
        output: Option<serde_json::Value>,
    },

    /// Report job failure. `retry_in` is set when the job should run again.
    JobFailed {
        job_id: JobId,
        worker_id: String,
        error: String,
        attempts: u32,
        retry_in: Option<Duration>,
    },

    /// Count this queue's jobs by state.
    GetStats {
        reply: RpcReplyPort<HashMap<String, u64>>,
    },

    /// Shutdown the queue gracefully.
    Shutdown,
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Start working on a job.
    ProcessJob { job: Box<Job> },

    /// Check if worker is idle.
    IsIdle { reply: RpcReplyPort<bool> },

    /// Shutdown the worker.
    Shutdown,

    /// Poll tick: request work when idle.
    Heartbeat,
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// List the served queue names.
    ListQueues { reply: RpcReplyPort<Vec<String>> },

    /// Count one queue's jobs by state; `None` if the queue is not served.
    QueueStats {
        queue: String,
        reply: RpcReplyPort<Option<HashMap<String, u64>>>,
    },

    /// Shutdown all queues and workers.
    Shutdown,

    /// Periodic tick: promote due scheduled jobs.
    Tick,
}
