//! Error types for the idempotency guard.

use job_core::{FilterError, MonitoringError};
use thiserror::Error;

/// Idempotency errors.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Pending job scan failed: {0}")]
    Monitoring(#[from] MonitoringError),
}

impl From<IdempotencyError> for FilterError {
    fn from(error: IdempotencyError) -> Self {
        FilterError::Failed {
            filter: crate::FILTER_NAME.to_string(),
            source: Box::new(error),
        }
    }
}
