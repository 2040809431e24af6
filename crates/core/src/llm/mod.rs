//! # AI Collaborator
//!
//! The single seam between the pipeline and a generative-AI service. A
//! collaborator receives a system instruction, a prompt, the expected
//! response shape, and whether it may search the web; it answers with raw
//! text plus any grounding citations, or fails.
//!
//! ## Implementations
//!
//! - [`GeminiCollaborator`] - Google Generative Language REST API, with
//!   Google Search grounding
//! - [`OpenAiCollaborator`] - OpenAI-compatible chat completions
//! - [`ScriptedCollaborator`] - canned replies for tests and demos

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;
use crate::skills::shape::ShapeDescriptor;

pub mod gemini;
pub mod openai;
pub mod scripted;

pub use gemini::GeminiCollaborator;
pub use openai::OpenAiCollaborator;
pub use scripted::{ScriptedCollaborator, ScriptedReply};

/// One call to the collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct CollaboratorRequest {
    pub system_instruction: String,
    pub prompt: String,
    pub shape: ShapeDescriptor,
    pub web_research: bool,
}

/// Raw answer of the collaborator, not yet validated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollaboratorResponse {
    pub text: String,
    pub citations: Vec<GroundingReference>,
}

impl CollaboratorResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }
}

/// A web source the collaborator consulted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingReference {
    pub uri: String,
    pub title: String,
}

impl GroundingReference {
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
        }
    }

    /// Title to show, falling back to the URI
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.uri
        } else {
            &self.title
        }
    }
}

/// Citations worth showing: non-empty URI, title defaulted to the URI
pub fn display_citations(citations: &[GroundingReference]) -> Vec<GroundingReference> {
    citations
        .iter()
        .filter(|c| !c.uri.trim().is_empty())
        .map(|c| GroundingReference::new(c.uri.clone(), c.display_title()))
        .collect()
}

/// A generative-AI service the pipeline can call
#[async_trait]
pub trait AiCollaborator: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Perform exactly one call
    async fn generate(
        &self,
        request: CollaboratorRequest,
    ) -> Result<CollaboratorResponse, CollaboratorError>;
}

/// Shorten an error body for logs and messages
pub(crate) fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}
