//! Job client and actor runtime.
//!
//! This crate provides the `BackgroundJobClient` that creates jobs through
//! the client filter pipeline, and the Ractor-based runtime that executes
//! them.
//!
//! # Architecture
//!
//! - `Supervisor` - Top-level actor; spawns queue actors and workers and
//!   promotes due scheduled jobs
//! - `QueueActor` - Serializes claims and state changes for a single queue
//! - `WorkerActor` - Executes jobs from a queue
//!
//! # Usage
//!
//! ```ignore
//! use actors::{BackgroundJobClient, JobHandlerRegistry, ServerOptions, start_server};
//!
//! let server = start_server(ServerOptions::default(), repo.clone(), handlers).await?;
//! let client = BackgroundJobClient::new(repo, filters);
//! client.enqueue(JobDescriptor::new("Reports", "Generate")).await?;
//! ```

mod client;
mod handler;
mod messages;
mod queue_actor;
mod supervisor;
mod worker_actor;

pub use client::{BackgroundJobClient, ClientError, InitialState};
pub use handler::{FnHandler, HandlerFuture, HandlerResult, JobHandler, JobHandlerRegistry, RetryPolicy};
pub use messages::{QueueMessage, SupervisorMessage, WorkerMessage};
pub use queue_actor::{QueueActor, QueueActorState};
pub use supervisor::{JobServer, ServerError, ServerOptions, Supervisor, SupervisorArgs, start_server};
pub use worker_actor::{WorkerActor, WorkerArgs};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
