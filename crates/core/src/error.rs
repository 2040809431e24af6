//! # Errors
//!
//! Typed failures for each layer of the pipeline. Only `PipelineError`
//! crosses into the presentation layer; it knows how to phrase itself for
//! the user via [`PipelineError::user_message`].

use thiserror::Error;

use crate::pipeline::Stage;
use crate::skills::shape::FieldKind;

/// Startup configuration failures. These are fatal: the process should not
/// begin serving a session without a usable collaborator.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API key for {provider}: set one of {}", .vars.join(", "))]
    MissingApiKey {
        provider: &'static str,
        vars: &'static [&'static str],
    },

    #[error("unknown LLM provider `{0}` (expected `gemini` or `openai`)")]
    UnknownProvider(String),

    #[error("invalid value `{value}` for {var}")]
    InvalidValue { var: &'static str, value: String },
}

/// Failure of the AI collaborator call itself (network, auth, quota).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("request to {provider} failed: {message}")]
    Request {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned no usable answer: {reason}")]
    EmptyAnswer {
        provider: &'static str,
        reason: String,
    },

    #[error("no scripted reply left for prompt")]
    Exhausted,
}

/// Outcome of checking a raw collaborator answer against a shape.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid JSON: {0}")]
    Malformed(String),

    #[error("missing required field `{field}`")]
    IncompleteShape { field: String },

    #[error("field `{field}` is not {expected}")]
    WrongKind { field: String, expected: FieldKind },
}

/// Classified failure of one stage execution. Terminal for the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("AI service call failed: {0}")]
    Transport(String),

    #[error("AI returned invalid structured data: {0}")]
    MalformedResponse(String),

    #[error("AI response is incomplete: {0}")]
    IncompleteResponse(String),
}

impl From<CollaboratorError> for StageError {
    fn from(e: CollaboratorError) -> Self {
        StageError::Transport(e.to_string())
    }
}

impl From<ValidationError> for StageError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::Malformed(_) => StageError::MalformedResponse(e.to_string()),
            ValidationError::IncompleteShape { .. } | ValidationError::WrongKind { .. } => {
                StageError::IncompleteResponse(e.to_string())
            }
        }
    }
}

impl StageError {
    /// Short machine-readable class name
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Transport(_) => "transport",
            StageError::MalformedResponse(_) => "malformed_response",
            StageError::IncompleteResponse(_) => "incomplete_response",
        }
    }

    /// One message per failure class, phrased for the person driving the session
    pub fn user_message(&self, stage: Stage) -> String {
        let activity = stage.activity();
        match self {
            StageError::Transport(_) => format!(
                "An error occurred while {activity}. The AI service could not be reached; please try again."
            ),
            StageError::MalformedResponse(_) => format!(
                "An error occurred while {activity}. The AI returned data that could not be read; please try again."
            ),
            StageError::IncompleteResponse(_) => format!(
                "An error occurred while {activity}. The AI's answer was missing required information; please try again."
            ),
        }
    }
}

/// Everything `run_stage` can refuse or fail with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("{stage} needs results from {}", join_titles(.missing))]
    MissingDependency { stage: Stage, missing: Vec<Stage> },

    #[error("{stage} requires {field}")]
    EmptyInput { stage: Stage, field: &'static str },

    #[error("{running} is still running")]
    Busy { running: Stage },

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },

    #[error("{stage} finished after a reset; its result was discarded")]
    Superseded { stage: Stage },
}

impl PipelineError {
    /// True for the refusals that happen before any collaborator call
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingDependency { .. }
                | PipelineError::EmptyInput { .. }
                | PipelineError::Busy { .. }
        )
    }

    /// The underlying stage failure, if the collaborator was called
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            PipelineError::Stage { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Message suitable for `PipelineState::last_error`
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::MissingDependency { stage, missing } => {
                format!("Run {} first to unlock {}.", join_titles(missing), stage)
            }
            PipelineError::EmptyInput { field, .. } => format!("Please enter {field}."),
            PipelineError::Busy { running } => {
                format!("Please wait for {running} to finish before starting another stage.")
            }
            PipelineError::Stage { stage, source } => source.user_message(*stage),
            PipelineError::Superseded { stage } => {
                format!("The pipeline was reset before {stage} finished.")
            }
        }
    }
}

fn join_titles(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(|s| s.title())
        .collect::<Vec<_>>()
        .join(" and ")
}
