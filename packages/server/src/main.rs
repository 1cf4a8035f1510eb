//! Demo job server with idempotent job creation.

use std::sync::Arc;
use std::time::Duration;

use actors::{BackgroundJobClient, FnHandler, JobHandlerRegistry, ServerOptions, start_server};
use db::{DbConfig, StorageMonitoringApi};
use idempotent::{IdempotentConfig, use_idempotent};
use job_core::{FilterPipeline, Job, JobDescriptor, JobEvent};

fn demo_handlers() -> JobHandlerRegistry {
    let mut handlers = JobHandlerRegistry::new();

    // Demo: report generation, safe to deduplicate
    handlers.register(
        FnHandler::new("Reports", "Generate", |job: &Job| {
            let month = job.descriptor.args.first().cloned();
            Box::pin(async move {
                tracing::info!("Generating report for {:?}", month);
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(Some(serde_json::json!({ "month": month, "rows": 42 })))
            })
        })
        .idempotent(),
    );

    // Demo: notification, every request is sent
    handlers.register(FnHandler::new("Mail", "Send", |job: &Job| {
        let to = job
            .descriptor
            .args
            .first()
            .and_then(|v| v.as_str())
            .unwrap_or("nobody")
            .to_string();
        Box::pin(async move {
            tracing::info!("Sending mail to {}", to);
            Ok(None)
        })
    }));

    handlers
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let repo = db::init(DbConfig::from_env()).await?;

    let config = IdempotentConfig::from_env()?;
    let handlers = Arc::new(demo_handlers());

    let filters = Arc::new(FilterPipeline::new());
    use_idempotent(
        &filters,
        Arc::new(StorageMonitoringApi::new(repo.clone())),
        handlers.clone(),
        config.clone(),
    )?;

    let server = start_server(
        ServerOptions::default().with_queues([config.default_queue.as_str()]),
        repo.clone(),
        handlers,
    )
    .await?;
    let mut events = server.subscribe();

    let client = BackgroundJobClient::new(repo, filters).with_default_queue(config.default_queue);

    let report = JobDescriptor::new("Reports", "Generate").with_arg("2026-09");
    for attempt in 1..=2 {
        match client.enqueue(report.clone()).await? {
            Some(id) => tracing::info!("Report request {} accepted as job {}", attempt, id),
            None => tracing::info!("Report request {} skipped: already pending", attempt),
        }
    }

    let mail = JobDescriptor::new("Mail", "Send").with_arg("ops@example.com");
    for attempt in 1..=2 {
        match client.enqueue(mail.clone()).await? {
            Some(id) => tracing::info!("Mail request {} accepted as job {}", attempt, id),
            None => tracing::info!("Mail request {} skipped: already pending", attempt),
        }
    }

    let mut remaining = 3;
    let drained = tokio::time::timeout(Duration::from_secs(10), async {
        while remaining > 0 {
            match events.recv().await {
                Ok(event @ (JobEvent::JobSucceeded { .. } | JobEvent::JobFailed { .. })) => {
                    tracing::info!("{}", event.description());
                    remaining -= 1;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Timed out waiting for demo jobs");
    }

    server.shutdown().await?;
    tracing::info!("Job server stopped");
    Ok(())
}
