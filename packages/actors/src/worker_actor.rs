//! Worker actor for executing jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use job_core::Job;
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::handler::JobHandlerRegistry;
use crate::messages::{QueueMessage, WorkerMessage};

/// State for the worker actor.
pub struct WorkerActorState {
    /// Unique worker ID.
    pub worker_id: String,
    /// Current job being processed.
    pub current_job: Option<Job>,
    /// Queue actor reference.
    pub queue: ActorRef<QueueMessage>,
    /// Handler registry.
    pub handlers: Arc<JobHandlerRegistry>,
    /// Whether the worker should continue running.
    pub running: bool,
}

impl WorkerActorState {
    /// Create a new worker actor state.
    pub fn new(
        worker_id: impl Into<String>,
        queue: ActorRef<QueueMessage>,
        handlers: Arc<JobHandlerRegistry>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            current_job: None,
            queue,
            handlers,
            running: true,
        }
    }

    /// Check if the worker is idle.
    pub fn is_idle(&self) -> bool {
        self.current_job.is_none()
    }

    fn report_failure(
        &self,
        job: &Job,
        error: String,
        retry_in: Option<Duration>,
    ) -> Result<(), ActorProcessingErr> {
        self.queue.send_message(QueueMessage::JobFailed {
            job_id: job.id,
            worker_id: self.worker_id.clone(),
            error,
            attempts: job.attempts,
            retry_in,
        })?;
        Ok(())
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue: ActorRef<QueueMessage>,
    pub handlers: Arc<JobHandlerRegistry>,
    pub poll_interval: Duration,
}

/// Worker actor that executes jobs.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        let state = WorkerActorState::new(args.worker_id, args.queue, args.handlers);

        // Start the work loop
        let myself_clone = myself.clone();
        let poll_interval = args.poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                if myself_clone.send_message(WorkerMessage::Heartbeat).is_err() {
                    break;
                }
            }
        });

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::ProcessJob { job } => {
                let job = *job;
                state.current_job = Some(job.clone());
                let key = job.descriptor.method_key();

                // Find handler for this method
                if let Some(handler) = state.handlers.get(&key) {
                    let started_at = Utc::now();

                    // Execute with timeout
                    let result = tokio::time::timeout(handler.timeout(), handler.handle(&job)).await;

                    match result {
                        Ok(Ok(output)) => {
                            state.queue.send_message(QueueMessage::JobCompleted {
                                job_id: job.id,
                                worker_id: state.worker_id.clone(),
                                started_at,
                                output,
                            })?;
                        }
                        Ok(Err(error)) => {
                            let retry_in = handler.retry_policy().delay_for(job.attempts);
                            state.report_failure(&job, error, retry_in)?;
                        }
                        Err(_) => {
                            let retry_in = handler.retry_policy().delay_for(job.attempts);
                            state.report_failure(&job, "Job timed out".into(), retry_in)?;
                        }
                    }
                } else {
                    // No handler for this method
                    state.report_failure(&job, format!("No handler for {}", key), None)?;
                }

                state.current_job = None;
            }

            WorkerMessage::IsIdle { reply } => {
                let _ = reply.send(state.is_idle());
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                state.running = false;
                myself.stop(None);
                return Ok(());
            }

            WorkerMessage::Heartbeat => {
                if !state.running {
                    myself.stop(None);
                    return Ok(());
                }

                // If idle, request a job
                if state.is_idle() {
                    let timeout = Duration::from_secs(5);
                    let result = ractor::rpc::call(
                        &state.queue,
                        |reply| QueueMessage::RequestJob {
                            worker_id: state.worker_id.clone(),
                            reply,
                        },
                        Some(timeout),
                    )
                    .await;
                    if let Ok(ractor::rpc::CallResult::Success(Some(job))) = result {
                        // Busy until ProcessJob runs, so later heartbeats don't claim more.
                        state.current_job = Some(job.clone());
                        myself.send_message(WorkerMessage::ProcessJob { job: Box::new(job) })?;
                    }
                }
            }
        }

        Ok(())
    }
}
