//! Queue actor: serializes claims and state transitions for one queue.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use db::repositories::JobRepository;
use job_core::{JobEvent, JobState};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::messages::QueueMessage;

/// When a retry after `delay` is due, saturating at the latest representable time.
fn retry_at(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// State for the queue actor.
pub struct QueueActorState {
    /// Queue name.
    pub queue: String,
    /// Job store.
    repo: JobRepository,
    /// Event broadcaster.
    event_tx: Option<broadcast::Sender<JobEvent>>,
}

impl QueueActorState {
    /// Create a new queue actor state.
    pub fn new(queue: impl Into<String>, repo: JobRepository) -> Self {
        Self {
            queue: queue.into(),
            repo,
            event_tx: None,
        }
    }

    /// Set the event broadcaster.
    pub fn with_event_tx(mut self, tx: broadcast::Sender<JobEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Broadcast an event.
    fn broadcast(&self, event: JobEvent) {
        tracing::debug!("{}", event.description());
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }
}

/// Queue actor that manages a single queue.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = QueueActorState;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting queue actor: {}", args.queue);
        Ok(args)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::RequestJob { worker_id, reply } => {
                match state.repo.claim_next(&state.queue, &worker_id).await {
                    Ok(Some(job)) => {
                        state.broadcast(JobEvent::JobStarted {
                            job_id: job.id,
                            queue: state.queue.clone(),
                            worker_id,
                            timestamp: Utc::now(),
                        });
                        let _ = reply.send(Some(job));
                    }
                    Ok(None) => {
                        let _ = reply.send(None);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to claim job on {}: {}", state.queue, e);
                        let _ = reply.send(None);
                    }
                }
            }

            QueueMessage::JobCompleted {
                job_id,
                worker_id: _,
                started_at,
                output,
            } => {
                let now = Utc::now();
                let duration_ms = (now - started_at).num_milliseconds().max(0) as u64;
                let status = JobState::Succeeded {
                    started_at,
                    succeeded_at: now,
                    output,
                };

                if let Err(e) = state.repo.set_state(job_id, &status).await {
                    tracing::warn!("Failed to update job {} status: {}", job_id, e);
                }

                state.broadcast(JobEvent::JobSucceeded {
                    job_id,
                    queue: state.queue.clone(),
                    duration_ms,
                    timestamp: now,
                });
            }

            QueueMessage::JobFailed {
                job_id,
                worker_id: _,
                error,
                attempts,
                retry_in,
            } => {
                let now = Utc::now();

                let next = match retry_in {
                    Some(delay) => JobState::Scheduled {
                        enqueue_at: retry_at(now, delay),
                        scheduled_at: now,
                        reason: Some(format!("Retry attempt {}: {}", attempts, error)),
                    },
                    None => JobState::Failed {
                        failed_at: now,
                        error: error.clone(),
                        attempts,
                    },
                };

                if let Err(e) = state.repo.set_state(job_id, &next).await {
                    tracing::warn!("Failed to update job {} status: {}", job_id, e);
                }

                state.broadcast(JobEvent::JobFailed {
                    job_id,
                    queue: state.queue.clone(),
                    error,
                    attempts,
                    will_retry: retry_in.is_some(),
                    timestamp: now,
                });
            }

            QueueMessage::GetStats { reply } => {
                let counts = state
                    .repo
                    .count_by_state(Some(&state.queue))
                    .await
                    .unwrap_or_default();
                let _ = reply.send(counts);
            }

            QueueMessage::Shutdown => {
                tracing::info!("Shutting down queue: {}", state.queue);
                myself.stop(None);
                return Ok(());
            }
        }

        Ok(())
    }
}
