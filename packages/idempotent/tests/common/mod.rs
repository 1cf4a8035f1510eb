#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use actors::BackgroundJobClient;
use db::{DbConfig, StorageMonitoringApi, repositories::JobRepository};
use idempotent::{IdempotentConfig, use_idempotent};
use job_core::{FilterPipeline, JobEvent, JobMetadata};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Store, pipeline and client wired together for one test.
pub struct Harness {
    pub repo: JobRepository,
    pub pipeline: Arc<FilterPipeline>,
    pub client: BackgroundJobClient,
}

/// Fresh in-memory store with the idempotency filter installed.
pub async fn setup(
    metadata: Arc<dyn JobMetadata>,
    config: IdempotentConfig,
) -> Result<Harness, Box<dyn Error>> {
    let repo = db::init(DbConfig::memory()).await?;
    let pipeline = Arc::new(FilterPipeline::new());
    let monitoring = Arc::new(StorageMonitoringApi::new(repo.clone()));

    let default_queue = config.default_queue.clone();
    use_idempotent(&pipeline, monitoring, metadata, config)?;

    let client =
        BackgroundJobClient::new(repo.clone(), pipeline.clone()).with_default_queue(default_queue);

    Ok(Harness {
        repo,
        pipeline,
        client,
    })
}

/// Wait for the first event matching `pred`.
pub async fn wait_for<F>(
    events: &mut broadcast::Receiver<JobEvent>,
    mut pred: F,
) -> Result<JobEvent, Box<dyn Error>>
where
    F: FnMut(&JobEvent) -> bool,
{
    let event = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return Ok(event),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    })
    .await??;

    Ok(event)
}
