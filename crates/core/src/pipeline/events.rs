//! # Pipeline Events
//!
//! Notifications the orchestrator broadcasts as the session changes, for
//! live views of a running stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::Stage;

/// Kind of pipeline event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    /// The active stage changed
    StageSelected,
    /// A stage run passed its preconditions and called the collaborator
    StageStarted,
    /// The progress label of the running stage advanced
    ProgressAdvanced,
    /// A stage result was committed
    StageCompleted,
    /// A stage run failed
    StageFailed,
    /// A run was refused before any call was made
    PreconditionFailed,
    /// A run finished after a reset; its result was dropped
    StaleResultDiscarded,
    /// The session was cleared
    PipelineReset,
}

/// An event in the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Unique event ID
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: PipelineEventKind,
    /// Stage the event concerns
    #[serde(default)]
    pub stage: Option<Stage>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl PipelineEvent {
    /// Create a new event
    pub fn new(kind: PipelineEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            stage: None,
            data: None,
        }
    }

    pub fn for_stage(kind: PipelineEventKind, stage: Stage) -> Self {
        Self::new(kind).with_stage(stage)
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
