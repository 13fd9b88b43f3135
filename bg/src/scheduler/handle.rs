//! SchedulerHandle - client interface to the scheduler task
//!
//! The handle is cloneable and can be shared between the CLI, exporters,
//! and tests. Every call is a message to the scheduler task, so reads
//! always reflect the latest committed state.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::domain::{GenerationRequest, WorkItem, WorkItemId, WorkStatus};

use super::messages::{SchedulerCommand, SchedulerError, SchedulerResponse};
use super::queue::{QueueState, SchedulerEvent};

#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub(crate) fn new(tx: mpsc::Sender<SchedulerCommand>) -> Self {
        Self { tx }
    }

    /// Send a command and wait for its reply
    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> SchedulerCommand) -> SchedulerResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SchedulerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }

    /// Validate a request and add it to the queue
    pub async fn enqueue(&self, request: GenerationRequest) -> SchedulerResponse<WorkItemId> {
        debug!(prompt_len = request.prompt.len(), "SchedulerHandle::enqueue: called");
        request.validate()?;
        self.call(|reply| SchedulerCommand::Enqueue { request, reply }).await
    }

    /// Validate every request, then add them all in order
    ///
    /// Nothing is enqueued if any request is invalid.
    pub async fn enqueue_batch(&self, requests: Vec<GenerationRequest>) -> SchedulerResponse<Vec<WorkItemId>> {
        debug!(count = requests.len(), "SchedulerHandle::enqueue_batch: called");
        for request in &requests {
            request.validate()?;
        }
        self.call(|reply| SchedulerCommand::EnqueueBatch { requests, reply })
            .await
    }

    /// Reset a Failed item to Queued
    ///
    /// Returns false (and changes nothing) when the item is not Failed.
    pub async fn retry(&self, id: WorkItemId) -> SchedulerResponse<bool> {
        debug!(%id, "SchedulerHandle::retry: called");
        self.call(|reply| SchedulerCommand::Retry { id, reply }).await?
    }

    /// All items in insertion order
    pub async fn list_all(&self) -> SchedulerResponse<Vec<WorkItem>> {
        debug!("SchedulerHandle::list_all: called");
        self.call(|reply| SchedulerCommand::ListAll { reply }).await
    }

    /// Items with the given status in insertion order
    pub async fn list_by_status(&self, status: WorkStatus) -> SchedulerResponse<Vec<WorkItem>> {
        debug!(%status, "SchedulerHandle::list_by_status: called");
        self.call(|reply| SchedulerCommand::ListByStatus { status, reply })
            .await
    }

    pub async fn get(&self, id: WorkItemId) -> SchedulerResponse<Option<WorkItem>> {
        debug!(%id, "SchedulerHandle::get: called");
        self.call(|reply| SchedulerCommand::Get { id, reply }).await
    }

    /// Change capacity; rejected while any item is running
    pub async fn set_max_concurrent(&self, max_concurrent: usize) -> SchedulerResponse<()> {
        debug!(max_concurrent, "SchedulerHandle::set_max_concurrent: called");
        self.call(|reply| SchedulerCommand::SetMaxConcurrent { max_concurrent, reply })
            .await?
    }

    pub async fn state(&self) -> SchedulerResponse<QueueState> {
        self.call(|reply| SchedulerCommand::GetState { reply }).await
    }

    /// Subscribe to lifecycle events
    pub async fn subscribe(&self) -> SchedulerResponse<broadcast::Receiver<SchedulerEvent>> {
        debug!("SchedulerHandle::subscribe: called");
        self.call(|reply| SchedulerCommand::Subscribe { reply }).await
    }

    /// Wait until nothing is queued or running
    pub async fn wait_idle(&self) -> SchedulerResponse<QueueState> {
        debug!("SchedulerHandle::wait_idle: called");
        let mut events = self.subscribe().await?;
        loop {
            let state = self.state().await?;
            if state.is_idle() {
                return Ok(state);
            }
            match events.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err(SchedulerError::ChannelClosed),
            }
        }
    }

    /// Ask the scheduler task to stop
    ///
    /// In-flight executions keep running but their outcomes are dropped.
    pub async fn shutdown(&self) -> SchedulerResponse<()> {
        debug!("SchedulerHandle::shutdown: called");
        self.tx
            .send(SchedulerCommand::Shutdown)
            .await
            .map_err(|_| SchedulerError::ChannelClosed)
    }
}
