//! Admission scheduler for generation work
//!
//! Items wait in insertion order and are admitted into execution on a fixed
//! cycle, bounded by:
//! - **Capacity:** at most `max-concurrent` items running
//! - **Rate window:** at most `rate-limit` admissions per rolling window
//!
//! The scheduler runs as a single task; `SchedulerHandle` talks to it over a
//! channel and each admitted item executes in its own spawned task.

mod config;
mod core;
mod handle;
mod messages;
mod queue;
mod runner;
mod store;
mod window;

pub use config::{ConfigurationError, SchedulerConfig};
pub use core::Scheduler;
pub use handle::SchedulerHandle;
pub use messages::{SchedulerCommand, SchedulerError, SchedulerResponse};
pub use queue::{QueueState, SchedulerEvent, SchedulerStats};
pub use runner::{ExecutionError, Executor};
pub use store::WorkItemStore;
pub use window::RateWindow;
