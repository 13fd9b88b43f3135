//! Bulkgen - rate-limited bulk video generation
//!
//! Bulkgen accepts many generation requests at once and feeds them to a
//! provider without exceeding two limits: how many requests may run at the
//! same time, and how many may start within a rolling time window.
//!
//! # Core Concepts
//!
//! - **Work items**: every request becomes an item that moves
//!   Queued -> Running -> Succeeded | Failed, and Failed items can be retried
//! - **Admission cycle**: a periodic pass admits queued items in submission
//!   order while both limits have room, then stops once everything settles
//! - **Providers**: Gemini for real generation, a mock for offline runs
//!
//! # Modules
//!
//! - [`domain`] - Requests, work items and their lifecycle
//! - [`scheduler`] - Store, rate window and the admission scheduler
//! - [`genai`] - Gemini and mock providers
//! - [`storyboard`] - Topic to scene prompts
//! - [`export`] - Downloading finished videos
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod export;
pub mod genai;
pub mod scheduler;
pub mod storyboard;

pub use config::Config;
pub use domain::{Artifact, GenerationRequest, WorkItem, WorkItemId, WorkStatus};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerHandle};
