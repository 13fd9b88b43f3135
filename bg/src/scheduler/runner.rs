//! Execution runner - one task per admitted item
//!
//! The runner invokes the external generation operation and reports the
//! outcome back to the scheduler over its command channel. The scheduler
//! never awaits these tasks.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::{Artifact, GenerationRequest, WorkItemId};

use super::messages::SchedulerCommand;

/// Failure of the external operation for one item
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The external generation operation
///
/// Latency is unbounded. Each call settles exactly once, with an artifact
/// or an error.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: &GenerationRequest) -> Result<Artifact, ExecutionError>;
}

/// Spawn the execution of one admitted item
pub(crate) fn spawn(
    executor: Arc<dyn Executor>,
    id: WorkItemId,
    request: GenerationRequest,
    tx: mpsc::Sender<SchedulerCommand>,
) {
    debug!(%id, "runner::spawn: called");
    tokio::spawn(async move {
        // Inner task so a panicking executor still settles the item
        let call = tokio::spawn(async move { executor.execute(&request).await });
        let outcome = match call.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%id, error = %e, "runner: execution task panicked");
                Err(ExecutionError::new("execution task panicked"))
            }
        };

        if let Err(e) = &outcome {
            debug!(%id, error = %e, "runner: execution failed");
        } else {
            debug!(%id, "runner: execution succeeded");
        }

        if tx.send(SchedulerCommand::Settled { id, outcome }).await.is_err() {
            warn!(%id, "runner: scheduler gone, dropping outcome");
        }
    });
}


#[cfg(test)]
mod tests {
    use super::*;

    struct Panicking;

    #[async_trait]
    impl Executor for Panicking {
        async fn execute(&self, _request: &GenerationRequest) -> Result<Artifact, ExecutionError> {
            panic!("executor blew up");
        }
    }

    #[tokio::test]
    async fn test_runner_reports_success() {
        let executor = mock::ManualExecutor::new();
        let (tx, mut rx) = mpsc::channel(4);
        let id = WorkItemId::new();

        spawn(executor.clone(), id, GenerationRequest::new("sunrise"), tx);

        while executor.started().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(executor.succeed("sunrise"));

        match rx.recv().await {
            Some(SchedulerCommand::Settled { id: got, outcome }) => {
                assert_eq!(got, id);
                assert_eq!(outcome.unwrap().uri, "mem://sunrise");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_runner_reports_panic_as_failure() {
        let (tx, mut rx) = mpsc::channel(4);
        let id = WorkItemId::new();

        spawn(Arc::new(Panicking), id, GenerationRequest::new("doomed"), tx);

        match rx.recv().await {
            Some(SchedulerCommand::Settled { outcome, .. }) => {
                assert_eq!(outcome.unwrap_err().message, "execution task panicked");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
