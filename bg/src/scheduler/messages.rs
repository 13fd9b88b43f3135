//! Message types for the Scheduler actor

use thiserror::Error;
use tokio::sync::{broadcast, oneshot};

use crate::domain::{Artifact, GenerationRequest, ValidationError, WorkItem, WorkItemId, WorkStatus};

use super::config::ConfigurationError;
use super::queue::{QueueState, SchedulerEvent};
use super::runner::ExecutionError;

/// Errors from scheduler operations
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid submission: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Work item not found: {0}")]
    NotFound(WorkItemId),

    #[error("Cannot change capacity while {running} item(s) are running")]
    CapacityLocked { running: usize },

    #[error("Scheduler channel closed")]
    ChannelClosed,
}

/// Response from scheduler operations
pub type SchedulerResponse<T> = Result<T, SchedulerError>;

/// Commands processed by the Scheduler task
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Add a validated request as a new Queued item
    Enqueue {
        request: GenerationRequest,
        reply: oneshot::Sender<WorkItemId>,
    },

    /// Add several validated requests, in order
    EnqueueBatch {
        requests: Vec<GenerationRequest>,
        reply: oneshot::Sender<Vec<WorkItemId>>,
    },

    /// Reset a Failed item to Queued
    Retry {
        id: WorkItemId,
        reply: oneshot::Sender<SchedulerResponse<bool>>,
    },

    /// Snapshot of every item in insertion order
    ListAll { reply: oneshot::Sender<Vec<WorkItem>> },

    /// Snapshot of items with one status
    ListByStatus {
        status: WorkStatus,
        reply: oneshot::Sender<Vec<WorkItem>>,
    },

    /// Snapshot of one item
    Get {
        id: WorkItemId,
        reply: oneshot::Sender<Option<WorkItem>>,
    },

    /// Change capacity (only while nothing is running)
    SetMaxConcurrent {
        max_concurrent: usize,
        reply: oneshot::Sender<SchedulerResponse<()>>,
    },

    /// Counters and cycle status
    GetState { reply: oneshot::Sender<QueueState> },

    /// Receiver for lifecycle events
    Subscribe {
        reply: oneshot::Sender<broadcast::Receiver<SchedulerEvent>>,
    },

    /// Execution outcome reported by a runner task (internal)
    Settled {
        id: WorkItemId,
        outcome: Result<Artifact, ExecutionError>,
    },

    /// Stop the scheduler task
    Shutdown,
}
