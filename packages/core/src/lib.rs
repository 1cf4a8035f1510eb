//! Core domain types for the job system.
//!
//! This crate contains shared types used across all packages:
//! - JobDescriptor, Job and JobState for work items
//! - Events for lifecycle updates
//! - The seams between crates: the client filter pipeline, the
//!   monitoring interface over pending jobs, and job metadata lookup

mod events;
mod filter;
mod job;
mod monitoring;

pub use events::JobEvent;
pub use filter::{ClientFilter, CreatingContext, FilterError, FilterFuture, FilterPipeline};
pub use job::{Job, JobDescriptor, JobId, JobState, MethodKey};
pub use monitoring::{
    JobMetadata, MonitoringApi, MonitoringError, MonitoringFuture, PendingJobRecord,
};
