//! Domain types for bulkgen
//!
//! WorkItem tracks one generation request through its lifecycle;
//! GenerationRequest holds the immutable parameters submitted by the user.

mod item;
mod request;

pub use item::{Artifact, WorkItem, WorkItemId, WorkState, WorkStatus};
pub use request::{AspectRatio, DEFAULT_MODEL, GenerationRequest, InputType, ValidationError};
