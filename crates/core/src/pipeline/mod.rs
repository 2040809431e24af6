//! # VentureLab Pipeline
//!
//! The five-stage research pipeline and the state machine that drives it.

pub mod events;
pub mod orchestrator;
pub mod stage;
pub mod state;

pub use events::{PipelineEvent, PipelineEventKind};
pub use orchestrator::{Orchestrator, OrchestratorConfig, DEFAULT_PROGRESS_INTERVAL_MS};
pub use stage::{Stage, STAGE_COUNT};
pub use state::{
    CompetitorPrefill, PipelineState, ProgressPhase, RunStatus, StageOutput, StageRequest,
    StageResult, StageResults,
};
