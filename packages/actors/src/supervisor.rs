//! Supervisor actor for managing all queues and workers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use db::repositories::JobRepository;
use job_core::JobEvent;
use ractor::{Actor, ActorProcessingErr, ActorRef, SupervisionEvent};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::handler::JobHandlerRegistry;
use crate::messages::{QueueMessage, SupervisorMessage, WorkerMessage};
use crate::queue_actor::{QueueActor, QueueActorState};
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Worker runtime errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to spawn actor: {0}")]
    Spawn(#[from] ractor::SpawnErr),
    #[error("Messaging error: {0}")]
    Messaging(String),
    #[error("Invalid server options: {0}")]
    InvalidOptions(String),
}

/// Worker runtime options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Optional name for the supervisor actor.
    pub name: Option<String>,
    /// Queues to serve.
    pub queues: Vec<String>,
    /// Workers spawned for each queue.
    pub workers_per_queue: usize,
    /// How often an idle worker asks for a job.
    pub poll_interval: Duration,
    /// How often due scheduled jobs are promoted.
    pub schedule_poll_interval: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            name: None,
            queues: vec!["default".to_string()],
            workers_per_queue: 2,
            poll_interval: Duration::from_millis(100),
            schedule_poll_interval: Duration::from_secs(1),
        }
    }
}

impl ServerOptions {
    /// Register the supervisor under `name`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Serve exactly these queues.
    pub fn with_queues<I, S>(mut self, queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queues = queues.into_iter().map(Into::into).collect();
        self
    }

    /// Set the number of workers spawned for each queue.
    pub fn with_workers_per_queue(mut self, workers: usize) -> Self {
        self.workers_per_queue = workers;
        self
    }

    /// Set how often an idle worker asks for a job.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how often due scheduled jobs are promoted. Must be non-zero.
    pub fn with_schedule_poll_interval(mut self, interval: Duration) -> Self {
        self.schedule_poll_interval = interval;
        self
    }

    /// Reject zero polling intervals.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.poll_interval.is_zero() {
            return Err(ServerError::InvalidOptions(
                "poll_interval must be non-zero".into(),
            ));
        }
        if self.schedule_poll_interval.is_zero() {
            return Err(ServerError::InvalidOptions(
                "schedule_poll_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Supervisor arguments.
pub struct SupervisorArgs {
    pub options: ServerOptions,
    pub repo: JobRepository,
    pub handlers: Arc<JobHandlerRegistry>,
    pub event_tx: broadcast::Sender<JobEvent>,
}

/// State for the supervisor actor.
pub struct SupervisorState {
    /// Queue actors by queue name.
    pub queues: HashMap<String, ActorRef<QueueMessage>>,
    /// Worker actors across all queues.
    pub workers: Vec<ActorRef<WorkerMessage>>,
    /// Job store, used for promotion.
    repo: JobRepository,
    /// Event broadcaster.
    event_tx: broadcast::Sender<JobEvent>,
    /// Worker counter for unique IDs.
    worker_counter: u64,
}

impl SupervisorState {
    /// Generate a unique worker ID.
    fn next_worker_id(&mut self, queue: &str) -> String {
        self.worker_counter += 1;
        format!("{}-worker-{}", queue, self.worker_counter)
    }
}

async fn spawn_queue(
    myself: &ActorRef<SupervisorMessage>,
    state: &mut SupervisorState,
    queue: &str,
    options: &ServerOptions,
    handlers: &Arc<JobHandlerRegistry>,
) -> Result<(), ActorProcessingErr> {
    let queue_state =
        QueueActorState::new(queue, state.repo.clone()).with_event_tx(state.event_tx.clone());

    let (actor, _handle) = Actor::spawn_linked(None, QueueActor, queue_state, myself.get_cell())
        .await
        .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn queue: {}", e)))?;

    for _ in 0..options.workers_per_queue {
        let args = WorkerArgs {
            worker_id: state.next_worker_id(queue),
            queue: actor.clone(),
            handlers: handlers.clone(),
            poll_interval: options.poll_interval,
        };

        match Actor::spawn_linked(None, WorkerActor, args, myself.get_cell()).await {
            Ok((worker, _)) => state.workers.push(worker),
            Err(e) => tracing::warn!("Failed to spawn worker for {}: {}", queue, e),
        }
    }

    state.queues.insert(queue.to_string(), actor);
    Ok(())
}

/// Supervisor actor that manages all queues.
pub struct Supervisor;

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = SupervisorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting job supervisor for queues {:?}", args.options.queues);

        let mut state = SupervisorState {
            queues: HashMap::new(),
            workers: Vec::new(),
            repo: args.repo,
            event_tx: args.event_tx,
            worker_counter: 0,
        };

        for queue in &args.options.queues {
            if state.queues.contains_key(queue) {
                continue;
            }
            spawn_queue(&myself, &mut state, queue, &args.options, &args.handlers).await?;
        }

        // Start periodic tick
        let myself_clone = myself.clone();
        let period = args.options.schedule_poll_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if myself_clone.send_message(SupervisorMessage::Tick).is_err() {
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
            SupervisorMessage::ListQueues { reply } => {
                let mut names: Vec<String> = state.queues.keys().cloned().collect();
                names.sort();
                let _ = reply.send(names);
            }

            SupervisorMessage::QueueStats { queue, reply } => {
                let Some(queue_ref) = state.queues.get(&queue) else {
                    let _ = reply.send(None);
                    return Ok(());
                };

                let (tx, rx) = ractor::concurrency::oneshot();
                if queue_ref
                    .send_message(QueueMessage::GetStats { reply: tx.into() })
                    .is_ok()
                    && let Ok(counts) = rx.await
                {
                    let _ = reply.send(Some(counts));
                    return Ok(());
                }
                let _ = reply.send(None);
            }

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down supervisor");
                for worker in &state.workers {
                    let _ = worker.send_message(WorkerMessage::Shutdown);
                }
                for queue_ref in state.queues.values() {
                    let _ = queue_ref.send_message(QueueMessage::Shutdown);
                }
                myself.stop(None);
                return Ok(());
            }

            SupervisorMessage::Tick => match state.repo.promote_due(Utc::now()).await {
                Ok(promoted) => {
                    for job in promoted {
                        tracing::debug!("Promoted scheduled job {} to {}", job.id, job.queue);
                        let _ = state.event_tx.send(JobEvent::JobPromoted {
                            job_id: job.id,
                            queue: job.queue,
                            timestamp: Utc::now(),
                        });
                    }
                }
                Err(e) => tracing::warn!("Failed to promote scheduled jobs: {}", e),
            },
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        _state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                tracing::debug!("Child actor {} terminated: {:?}", cell.get_id(), reason);
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                tracing::warn!("Child actor {} failed: {}", cell.get_id(), error);
            }
            _ => {}
        }
        Ok(())
    }
}

/// Handle to a running worker runtime.
pub struct JobServer {
    supervisor: ActorRef<SupervisorMessage>,
    handle: JoinHandle<()>,
    event_tx: broadcast::Sender<JobEvent>,
}

impl JobServer {
    /// Subscribe to job lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    pub fn supervisor(&self) -> &ActorRef<SupervisorMessage> {
        &self.supervisor
    }

    /// Names of the served queues.
    pub async fn list_queues(&self) -> Result<Vec<String>, ServerError> {
        self.call(|reply| SupervisorMessage::ListQueues { reply }).await
    }

    /// Job counts by state for one served queue.
    pub async fn queue_stats(&self, queue: &str) -> Result<Option<HashMap<String, u64>>, ServerError> {
        let queue = queue.to_string();
        self.call(|reply| SupervisorMessage::QueueStats { queue, reply })
            .await
    }

    async fn call<T, F>(&self, msg_builder: F) -> Result<T, ServerError>
    where
        F: FnOnce(ractor::RpcReplyPort<T>) -> SupervisorMessage,
        T: Send + 'static,
    {
        match self
            .supervisor
            .call(msg_builder, Some(Duration::from_secs(5)))
            .await
        {
            Ok(ractor::rpc::CallResult::Success(value)) => Ok(value),
            Ok(ractor::rpc::CallResult::Timeout) => {
                Err(ServerError::Messaging("Supervisor call timed out".into()))
            }
            Ok(ractor::rpc::CallResult::SenderError) => {
                Err(ServerError::Messaging("Supervisor dropped the reply".into()))
            }
            Err(e) => Err(ServerError::Messaging(e.to_string())),
        }
    }

    /// Stop all workers and queues and wait for the supervisor to exit.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        self.supervisor
            .send_message(SupervisorMessage::Shutdown)
            .map_err(|e| ServerError::Messaging(e.to_string()))?;
        self.handle
            .await
            .map_err(|e| ServerError::Messaging(e.to_string()))
    }
}

/// Start the worker runtime over `repo`.
///
/// The registry is shared so the same handlers can also answer job
/// metadata lookups.
pub async fn start_server(
    options: ServerOptions,
    repo: JobRepository,
    handlers: Arc<JobHandlerRegistry>,
) -> Result<JobServer, ServerError> {
    options.validate()?;

    let (event_tx, _) = broadcast::channel(1024);
    let args = SupervisorArgs {
        options: options.clone(),
        repo,
        handlers,
        event_tx: event_tx.clone(),
    };

    let (supervisor, handle) = Actor::spawn(options.name, Supervisor, args).await?;

    Ok(JobServer {
        supervisor,
        handle,
        event_tx,
    })
}
