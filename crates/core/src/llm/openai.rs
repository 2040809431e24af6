//! OpenAI-compatible chat completions collaborator.
//!
//! Uses `response_format: json_schema` for every call. The API has no
//! search grounding, so web-research requests run as plain calls.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{truncate, AiCollaborator, CollaboratorRequest, CollaboratorResponse};
use crate::error::CollaboratorError;
use crate::models::ModelConfig;

const PROVIDER: &str = "OpenAI";

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Collaborator backed by `{base}/chat/completions`
pub struct OpenAiCollaborator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiCollaborator {
    pub fn new(config: &ModelConfig, api_key: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client for OpenAI")?;
        Ok(Self {
            client,
            endpoint: config.endpoint().to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn url(&self) -> String {
        if self.endpoint.ends_with("/chat/completions") {
            self.endpoint.clone()
        } else {
            format!("{}/chat/completions", self.endpoint)
        }
    }

    fn payload(&self, request: &CollaboratorRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_instruction },
                { "role": "user", "content": request.prompt },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.shape.name,
                    "schema": request.shape.schema,
                },
            },
        })
    }
}

#[async_trait]
impl AiCollaborator for OpenAiCollaborator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    #[tracing::instrument(skip(self, request), fields(model = %self.model, web_research = request.web_research))]
    async fn generate(
        &self,
        request: CollaboratorRequest,
    ) -> Result<CollaboratorResponse, CollaboratorError> {
        if request.web_research {
            tracing::warn!("OpenAI has no web research; answering from model knowledge only");
        }

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&self.payload(&request))
            .send()
            .await
            .map_err(|e| CollaboratorError::Request {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body: truncate(&body, 320),
            });
        }

        let body: ChatResponse = response.json().await.map_err(|e| CollaboratorError::Request {
            provider: PROVIDER,
            message: format!("invalid response body: {}", e),
        })?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CollaboratorError::EmptyAnswer {
                provider: PROVIDER,
                reason: "no choices".into(),
            })?;

        match choice.message.content.filter(|c| !c.trim().is_empty()) {
            Some(text) => Ok(CollaboratorResponse::text(text)),
            None => Err(CollaboratorError::EmptyAnswer {
                provider: PROVIDER,
                reason: choice
                    .message
                    .refusal
                    .or(choice.finish_reason)
                    .unwrap_or_else(|| "empty content".into()),
            }),
        }
    }
}
