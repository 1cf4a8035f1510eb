//! Idempotent job creation.
//!
//! Installs a client filter that cancels the creation of a job when an
//! equal job is already queued, scheduled or being processed.
//!
//! # Usage
//!
//! ```ignore
//! use idempotent::{IdempotentConfig, IdempotentMethods, use_idempotent};
//!
//! let methods = IdempotentMethods::new().with("Reports", "Generate");
//! use_idempotent(&pipeline, monitoring, Arc::new(methods), IdempotentConfig::default())?;
//! ```
//!
//! Two jobs are equal when their declaring type, method name and arguments
//! match. Queued and processing jobs are only searched on the target's queue;
//! scheduled jobs are searched across all queues.

mod comparator;
mod config;
mod detector;
mod error;
mod interceptor;
mod methods;
mod registration;
mod scanner;

pub use comparator::jobs_equal;
pub use config::IdempotentConfig;
pub use detector::{DuplicateJobDetector, DuplicateJobDetectorBuilder, DuplicateMatch, ScanGuard};
pub use error::IdempotencyError;
pub use interceptor::{IdempotentJobFilter, IdempotentJobFilterBuilder};
pub use methods::IdempotentMethods;
pub use registration::use_idempotent;
pub use scanner::{PendingJobScanner, PendingPool, ScanSnapshot};

/// Name the filter is installed under.
pub const FILTER_NAME: &str = "idempotent";
