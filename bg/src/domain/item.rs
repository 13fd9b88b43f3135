//! WorkItem domain type
//!
//! Tracks one generation request through Queued -> Running -> Succeeded/Failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::GenerationRequest;

/// Unique, never-reused identifier of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(Uuid);

impl WorkItemId {
    /// Generate a fresh time-ordered id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Short form for display (first 8 hex chars)
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for WorkItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WorkItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Output of a successful generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Where the generated video can be fetched from
    pub uri: String,

    #[serde(rename = "mime-type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Artifact {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: None,
        }
    }
}

/// Lifecycle status without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl WorkStatus {
    pub const ALL: [WorkStatus; 4] = [Self::Queued, Self::Running, Self::Succeeded, Self::Failed];

    /// Succeeded and Failed are terminal (Failed only leaves via retry)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Lifecycle state with its payload
///
/// The artifact exists only in `Succeeded` and the error only in `Failed`,
/// so an item can never carry both or carry either while pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkState {
    Queued,
    Running,
    Succeeded { artifact: Artifact },
    Failed { error: String },
}

impl WorkState {
    pub fn status(&self) -> WorkStatus {
        match self {
            Self::Queued => WorkStatus::Queued,
            Self::Running => WorkStatus::Running,
            Self::Succeeded { .. } => WorkStatus::Succeeded,
            Self::Failed { .. } => WorkStatus::Failed,
        }
    }
}

/// One unit of requested work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,

    pub request: GenerationRequest,

    #[serde(flatten)]
    pub state: WorkState,

    /// Number of times the item was admitted into Running
    pub attempts: u32,

    #[serde(rename = "submitted-at")]
    pub submitted_at: DateTime<Utc>,

    #[serde(rename = "started-at", default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(rename = "finished-at", default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// Create a new Queued item
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            id: WorkItemId::new(),
            request,
            state: WorkState::Queued,
            attempts: 0,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn status(&self) -> WorkStatus {
        self.state.status()
    }

    /// The artifact, present only when Succeeded
    pub fn result(&self) -> Option<&Artifact> {
        match &self.state {
            WorkState::Succeeded { artifact } => Some(artifact),
            _ => None,
        }
    }

    /// The failure message, present only when Failed
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            WorkState::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Apply a new state, updating bookkeeping timestamps
    pub(crate) fn apply(&mut self, state: WorkState) {
        let now = Utc::now();
        match &state {
            WorkState::Queued => {
                self.started_at = None;
                self.finished_at = None;
            }
            WorkState::Running => {
                self.attempts += 1;
                self.started_at = Some(now);
                self.finished_at = None;
            }
            WorkState::Succeeded { .. } | WorkState::Failed { .. } => {
                self.finished_at = Some(now);
            }
        }
        self.state = state;
    }
}
