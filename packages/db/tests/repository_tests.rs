#![allow(clippy::disallowed_methods)]

mod common;

use chrono::{Duration, Utc};
use job_core::{Job, JobDescriptor, JobState, MonitoringApi};
use serde_json::json;
use std::error::Error;

use db::{DbError, StorageMonitoringApi, repositories::Pool};

fn report_job(queue: &str, n: i64) -> Job {
    let descriptor = JobDescriptor::new("Reports", "Generate")
        .with_arg(n)
        .on_queue(queue);
    Job::new(descriptor, queue, JobState::enqueued_now())
}

#[tokio::test]
async fn create_get_and_update_state() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;

    let job = report_job("default", 1);
    let created = repo.create(&job).await?;
    assert_eq!(created.id, job.id);
    assert_eq!(created.descriptor, job.descriptor);

    let loaded = repo.get(job.id).await?;
    assert_eq!(loaded.queue, "default");
    assert_eq!(loaded.state.as_str(), "enqueued");

    let succeeded = JobState::Succeeded {
        started_at: Utc::now(),
        succeeded_at: Utc::now(),
        output: Some(json!({"rows": 3})),
    };
    let updated = repo.set_state(job.id, &succeeded).await?;
    assert_eq!(updated.state.as_str(), "succeeded");

    repo.delete(job.id).await?;
    let missing = repo.get(job.id).await;
    assert!(matches!(missing, Err(DbError::NotFound(_))));

    let missing_update = repo.set_state(job.id, &succeeded).await;
    assert!(matches!(missing_update, Err(DbError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn pools_are_scoped_and_ordered() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;

    let first = report_job("default", 1);
    repo.create(&first).await?;
    let second = report_job("default", 2);
    repo.create(&second).await?;
    repo.create(&report_job("critical", 3)).await?;

    let later = Job::new(
        JobDescriptor::new("Reports", "Generate").on_queue("critical"),
        "critical",
        JobState::Scheduled {
            enqueue_at: Utc::now() + Duration::hours(1),
            scheduled_at: Utc::now(),
            reason: None,
        },
    );
    repo.create(&later).await?;

    let default_pool = repo.list_pool(Pool::Enqueued, Some("default"), 0, 10).await?;
    assert_eq!(default_pool.len(), 2);
    assert_eq!(default_pool[0].record_id, first.id.to_string());
    assert_eq!(default_pool[1].record_id, second.id.to_string());

    let bounded = repo.list_pool(Pool::Enqueued, Some("default"), 0, 1).await?;
    assert_eq!(bounded.len(), 1);

    let offset = repo.list_pool(Pool::Enqueued, Some("default"), 1, 10).await?;
    assert_eq!(offset.len(), 1);
    assert_eq!(offset[0].record_id, second.id.to_string());

    let scheduled = repo.list_pool(Pool::Scheduled, None, 0, 10).await?;
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].job.as_ref(), Some(&later.descriptor));

    let counts = repo.count_by_state(None).await?;
    assert_eq!(counts.get("enqueued").copied().unwrap_or(0), 3);
    assert_eq!(counts.get("scheduled").copied().unwrap_or(0), 1);

    let critical = repo.count_by_state(Some("critical")).await?;
    assert_eq!(critical.get("enqueued").copied().unwrap_or(0), 1);

    Ok(())
}

#[tokio::test]
async fn claim_moves_job_to_processing_once() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;

    let job = report_job("default", 1);
    repo.create(&job).await?;

    let claimed = repo.claim_next("default", "worker-1").await?;
    let claimed = claimed.ok_or("expected a claimed job")?;
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.attempts, 1);
    assert!(matches!(claimed.state, JobState::Processing { .. }));

    assert!(repo.claim_next("default", "worker-2").await?.is_none());

    let processing = repo.list_pool(Pool::Processing, Some("default"), 0, 10).await?;
    assert_eq!(processing.len(), 1);
    assert!(repo.list_pool(Pool::Enqueued, Some("default"), 0, 10).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn promote_due_moves_only_due_jobs() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;

    let due = Job::new(
        JobDescriptor::new("Reports", "Generate"),
        "default",
        JobState::Scheduled {
            enqueue_at: Utc::now() - Duration::seconds(1),
            scheduled_at: Utc::now(),
            reason: Some("retry".into()),
        },
    );
    let future = Job::new(
        JobDescriptor::new("Reports", "Archive"),
        "default",
        JobState::Scheduled {
            enqueue_at: Utc::now() + Duration::hours(1),
            scheduled_at: Utc::now(),
            reason: None,
        },
    );
    repo.create(&due).await?;
    repo.create(&future).await?;

    let promoted = repo.promote_due(Utc::now()).await?;
    assert_eq!(promoted.len(), 1);
    assert_eq!(promoted[0].id, due.id);
    assert_eq!(repo.get(due.id).await?.state.as_str(), "enqueued");
    assert_eq!(repo.get(future.id).await?.state.as_str(), "scheduled");

    Ok(())
}

#[tokio::test]
async fn monitoring_tolerates_broken_records() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;

    repo.database()
        .query(
            r#"
            CREATE job SET queue = "default", state_name = "enqueued", seq = 0;
            CREATE job SET job_id = "broken", queue = "default", state_name = "enqueued", seq = 1, descriptor = { method: 42 };
            "#,
        )
        .await?
        .check()?;
    let job = report_job("default", 7);
    repo.create(&job).await?;

    let monitoring = StorageMonitoringApi::new(repo.clone());
    let records = monitoring.enqueued_jobs("default", 0, 10).await?;

    assert_eq!(records.len(), 3);
    assert!(records[0].job.is_none());
    assert_eq!(records[1].record_id, "broken");
    assert!(records[1].job.is_none());
    assert_eq!(records[2].job.as_ref(), Some(&job.descriptor));

    assert!(monitoring.scheduled_jobs(0, 10).await?.is_empty());
    assert!(monitoring.fetched_jobs("default", 0, 10).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn descriptor_arguments_round_trip_exactly() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;

    let descriptor = JobDescriptor::new("Reports", "Generate").with_args(vec![
        json!({"region": null, "filters": [null, {"since": null}]}),
        json!(u64::MAX),
        json!(i64::MAX as u64 + 1),
        json!(2.5e-8),
        json!(null),
    ]);
    let job = Job::new(descriptor.clone(), "default", JobState::enqueued_now());
    repo.create(&job).await?;

    assert_eq!(repo.get(job.id).await?.descriptor, descriptor);

    let pool = repo.list_pool(Pool::Enqueued, Some("default"), 0, usize::MAX).await?;
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].job.as_ref(), Some(&descriptor));

    let claimed = repo.claim_next("default", "worker-1").await?;
    assert_eq!(claimed.map(|job| job.descriptor), Some(descriptor));

    Ok(())
}

#[tokio::test]
async fn unreadable_claimed_job_is_marked_failed() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;

    let job = report_job("default", 1);
    repo.create(&job).await?;
    repo.database()
        .query("UPDATE type::thing('job', $id) SET descriptor = 'not json'")
        .bind(("id", job.id.to_string()))
        .await?
        .check()?;

    let claimed = repo.claim_next("default", "worker-1").await;
    assert!(matches!(claimed, Err(DbError::Serialization(_))));

    let counts = repo.count_by_state(Some("default")).await?;
    assert_eq!(counts.get("failed"), Some(&1));
    assert!(!counts.contains_key("processing"));
    assert!(repo.claim_next("default", "worker-2").await?.is_none());

    Ok(())
}
