//! Queue state and events published by the scheduler

use std::time::Duration;

use serde::Serialize;

use crate::domain::WorkItemId;

/// Lifetime counters for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub total_enqueued: u64,
    pub total_admitted: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_retried: u64,
    pub peak_running: usize,
    pub cycles: u64,
}

/// Queue state snapshot for display and tests
#[derive(Debug, Clone, Serialize)]
pub struct QueueState {
    pub queued: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub max_concurrent: usize,
    /// Admissions inside the current rate window
    pub admissions_in_window: usize,
    /// Time until the rate window frees a slot, when it is full
    pub rate_limited_for: Option<Duration>,
    /// Whether the periodic admission cycle is running
    pub cycle_active: bool,
    pub stats: SchedulerStats,
}

impl QueueState {
    /// Nothing queued and nothing in flight
    pub fn is_idle(&self) -> bool {
        self.queued == 0 && self.running == 0
    }

    pub fn total(&self) -> usize {
        self.queued + self.running + self.succeeded + self.failed
    }
}

/// Lifecycle events broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    Enqueued { id: WorkItemId },
    Admitted { id: WorkItemId },
    Succeeded { id: WorkItemId },
    Failed { id: WorkItemId, error: String },
    Retried { id: WorkItemId },
    CycleStarted,
    /// The admission cycle went idle: nothing queued or running
    CycleStopped,
}
