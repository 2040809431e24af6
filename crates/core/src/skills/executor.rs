//! # Stage Executor
//!
//! Makes exactly one collaborator call for a composed prompt and validates
//! the answer against the stage's shape. No retries: every failure is
//! terminal for the run and comes back classified.

use std::sync::Arc;

use serde_json::Value;

use super::composer::ComposedPrompt;
use super::response;
use crate::error::StageError;
use crate::llm::{AiCollaborator, CollaboratorRequest, GroundingReference};

/// Validated answer of one stage call
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub value: Value,
    pub citations: Vec<GroundingReference>,
}

#[derive(Clone)]
pub struct StageExecutor {
    collaborator: Arc<dyn AiCollaborator>,
}

impl StageExecutor {
    pub fn new(collaborator: Arc<dyn AiCollaborator>) -> Self {
        Self { collaborator }
    }

    #[tracing::instrument(
        skip(self, composed),
        fields(stage = %composed.stage, provider = self.collaborator.name(), web_research = composed.web_research)
    )]
    pub async fn run(&self, composed: &ComposedPrompt) -> Result<StageOutcome, StageError> {
        let request = CollaboratorRequest {
            system_instruction: composed.system_instruction.to_string(),
            prompt: composed.prompt.clone(),
            shape: composed.shape.clone(),
            web_research: composed.web_research,
        };

        let answer = self.collaborator.generate(request).await.map_err(|e| {
            tracing::error!(error = %e, "Collaborator call failed");
            StageError::from(e)
        })?;

        let value = response::validate(&answer.text, composed.shape).map_err(|e| {
            tracing::error!(
                error = %e,
                raw = %crate::llm::truncate(&answer.text, 2000),
                "Collaborator answer rejected"
            );
            StageError::from(e)
        })?;

        Ok(StageOutcome {
            value,
            citations: answer.citations,
        })
    }
}
