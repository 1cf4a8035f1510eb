use std::sync::Arc;

use job_core::{FilterPipeline, JobMetadata, MonitoringApi};

use crate::{FILTER_NAME, IdempotencyError, IdempotentConfig, IdempotentJobFilter};

/// Install the idempotency filter into `pipeline`.
///
/// Calling this again replaces the previously installed filter and its
/// configuration.
pub fn use_idempotent(
    pipeline: &FilterPipeline,
    monitoring: Arc<dyn MonitoringApi>,
    metadata: Arc<dyn JobMetadata>,
    config: IdempotentConfig,
) -> Result<(), IdempotencyError> {
    let filter = IdempotentJobFilter::builder()
        .monitoring(monitoring)
        .metadata(metadata)
        .config(config)
        .build()?;

    tracing::info!(
        "Installing idempotency filter (max_retrievals={}, default_queue={})",
        filter.config().max_retrievals,
        filter.config().default_queue
    );

    pipeline.install(FILTER_NAME, Arc::new(filter));
    Ok(())
}
