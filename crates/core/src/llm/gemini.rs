//! Google Generative Language API collaborator.
//!
//! Structured calls send the stage's shape as `responseSchema` so the model
//! answers with bare JSON. Web-research calls enable the `googleSearch` tool
//! instead (the API refuses JSON mode together with tools) and rely on the
//! shape description embedded in the prompt.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use super::{truncate, AiCollaborator, CollaboratorRequest, CollaboratorResponse, GroundingReference};
use crate::error::CollaboratorError;
use crate::models::ModelConfig;

const PROVIDER: &str = "Gemini";

/// Collaborator backed by `models/{model}:generateContent`
pub struct GeminiCollaborator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiCollaborator {
    pub fn new(config: &ModelConfig, api_key: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client for Gemini")?;
        Ok(Self {
            client,
            endpoint: config.endpoint().to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        )
    }

    fn payload(request: &CollaboratorRequest) -> Value {
        let mut payload = json!({
            "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
        });
        if request.web_research {
            payload["tools"] = json!([{ "googleSearch": {} }]);
        } else {
            payload["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": response_schema(&request.shape.schema),
            });
        }
        payload
    }
}

#[async_trait]
impl AiCollaborator for GeminiCollaborator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    #[tracing::instrument(skip(self, request), fields(model = %self.model, web_research = request.web_research))]
    async fn generate(
        &self,
        request: CollaboratorRequest,
    ) -> Result<CollaboratorResponse, CollaboratorError> {
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::payload(&request))
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

        let body: Value = response.json().await.map_err(|e| CollaboratorError::Request {
            provider: PROVIDER,
            message: format!("invalid response body: {}", e),
        })?;

        let parsed = parse_answer(&body)?;
        tracing::debug!(
            chars = parsed.text.len(),
            citations = parsed.citations.len(),
            "Gemini answered"
        );
        Ok(parsed)
    }
}

/// Pull the text and grounding citations out of a `generateContent` reply
fn parse_answer(body: &Value) -> Result<CollaboratorResponse, CollaboratorError> {
    let Some(candidate) = body["candidates"].as_array().and_then(|c| c.first()) else {
        let reason = body["promptFeedback"]["blockReason"]
            .as_str()
            .map(|r| format!("prompt blocked ({})", r))
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(CollaboratorError::EmptyAnswer {
            provider: PROVIDER,
            reason,
        });
    };

    let text = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate["finishReason"]
            .as_str()
            .map(|r| format!("empty text (finish reason {})", r))
            .unwrap_or_else(|| "empty text".to_string());
        return Err(CollaboratorError::EmptyAnswer {
            provider: PROVIDER,
            reason,
        });
    }

    let mut citations: Vec<GroundingReference> = Vec::new();
    if let Some(chunks) = candidate["groundingMetadata"]["groundingChunks"].as_array() {
        for web in chunks.iter().map(|chunk| &chunk["web"]) {
            let Some(uri) = web["uri"].as_str().filter(|u| !u.is_empty()) else {
                continue;
            };
            if citations.iter().any(|c| c.uri == uri) {
                continue;
            }
            let title = web["title"]
                .as_str()
                .filter(|t| !t.is_empty())
                .unwrap_or(uri);
            citations.push(GroundingReference::new(uri, title));
        }
    }

    Ok(CollaboratorResponse { text, citations })
}

/// Translate a JSON Schema into the OpenAPI subset `responseSchema` accepts:
/// uppercase type names, nullable instead of type unions, and only the
/// keywords the API understands.
fn response_schema(schema: &Value) -> Value {
    let Some(node) = schema.as_object() else {
        return schema.clone();
    };
    let mut out = Map::new();

    let (ty, nullable) = match node.get("type") {
        Some(Value::String(t)) => (Some(t.as_str()), false),
        Some(Value::Array(types)) => (
            types.iter().filter_map(Value::as_str).find(|t| *t != "null"),
            types.iter().any(|t| t == "null"),
        ),
        _ => (None, false),
    };
    if let Some(ty) = ty {
        out.insert("type".into(), Value::String(ty.to_ascii_uppercase()));
    }
    if nullable {
        out.insert("nullable".into(), Value::Bool(true));
    }
    for key in ["description", "enum", "required"] {
        if let Some(v) = node.get(key) {
            out.insert(key.into(), v.clone());
        }
    }
    if let Some(props) = node.get("properties").and_then(Value::as_object) {
        let converted: Map<String, Value> = props
            .iter()
            .map(|(k, v)| (k.clone(), response_schema(v)))
            .collect();
        out.insert("properties".into(), Value::Object(converted));
    }
    if let Some(items) = node.get("items") {
        out.insert("items".into(), response_schema(items));
    }
    Value::Object(out)
}
