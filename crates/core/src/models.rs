//! # VentureLab Models
//!
//! Centralized LLM configuration types for the VentureLab pipeline.
//! Every stage talks to the same collaborator, so one `ModelConfig`
//! is resolved at startup and handed to [`create_collaborator`].
//!
//! ## Environment
//!
//! | Variable                  | Meaning                                   |
//! |---------------------------|-------------------------------------------|
//! | `VENTURELAB_PROVIDER`     | `gemini` (default) or `openai`            |
//! | `VENTURELAB_MODEL`        | Model name, provider default if unset     |
//! | `VENTURELAB_BASE_URL`     | Endpoint override (proxies, test servers) |
//! | `VENTURELAB_TIMEOUT_SECS` | Per-call HTTP timeout                     |

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::llm::{AiCollaborator, GeminiCollaborator, OpenAiCollaborator};

/// Default per-call timeout. Web-research calls routinely take tens of seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Supported LLM providers
///
/// - Gemini (Google) - `GEMINI_API_KEY`, `GOOGLE_API_KEY` or `API_KEY`
/// - OpenAI (GPT) - `OPENAI_API_KEY`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    #[serde(rename = "openai")]
    OpenAI,
}

impl LlmProvider {
    /// Get all available providers
    pub fn all() -> Vec<LlmProvider> {
        vec![LlmProvider::Gemini, LlmProvider::OpenAI]
    }

    /// Display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenAI => "OpenAI",
        }
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-2.5-flash",
            LlmProvider::OpenAI => "gpt-4o",
        }
    }

    /// Public API endpoint
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com",
            LlmProvider::OpenAI => "https://api.openai.com/v1",
        }
    }

    /// Environment variables searched for the API key, in priority order
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            LlmProvider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"],
            LlmProvider::OpenAI => &["OPENAI_API_KEY"],
        }
    }

    /// Whether the provider can browse the web and return grounding citations
    pub fn supports_web_research(&self) -> bool {
        matches!(self, LlmProvider::Gemini)
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            "openai" => Ok(LlmProvider::OpenAI),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Configuration for LLM model selection
///
/// ## Example
/// ```rust,ignore
/// use venturelab_core::models::{ModelConfig, LlmProvider};
///
/// // Default Gemini
/// let config = ModelConfig::default();
///
/// // Specific provider and model
/// let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
///
/// // Create the collaborator (fails fast if no API key is present)
/// let collaborator = create_collaborator(&config)?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "gemini-2.5-flash", "gpt-4o")
    pub model: String,
    /// Optional base URL override
    #[serde(default)]
    pub base_url: Option<String>,
    /// HTTP timeout per collaborator call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::with_provider(LlmProvider::Gemini, LlmProvider::Gemini.default_model())
    }
}

impl ModelConfig {
    /// Create a new model config with the default provider (Gemini)
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::Gemini, model)
    }

    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Resolve configuration from `VENTURELAB_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = match non_empty_var("VENTURELAB_PROVIDER") {
            Some(value) => LlmProvider::parse(&value)?,
            None => LlmProvider::default(),
        };
        let model = non_empty_var("VENTURELAB_MODEL")
            .unwrap_or_else(|| provider.default_model().to_string());

        let mut config = Self::with_provider(provider, model);
        config.base_url = non_empty_var("VENTURELAB_BASE_URL");
        if let Some(raw) = non_empty_var("VENTURELAB_TIMEOUT_SECS") {
            config.timeout_secs = raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "VENTURELAB_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
        }
        Ok(config)
    }

    /// Endpoint to call, honouring the override
    pub fn endpoint(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    /// Look up the provider's API key.
    ///
    /// A missing credential is a startup failure, so callers should resolve
    /// this before the first stage ever runs.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.provider
            .api_key_vars()
            .iter()
            .find_map(|var| non_empty_var(var))
            .ok_or(ConfigError::MissingApiKey {
                provider: self.provider.display_name(),
                vars: self.provider.api_key_vars(),
            })
    }
}

/// Create the AI collaborator for the configured provider
pub fn create_collaborator(config: &ModelConfig) -> anyhow::Result<Arc<dyn AiCollaborator>> {
    let api_key = config.api_key()?;
    let collaborator: Arc<dyn AiCollaborator> = match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiCollaborator::new(config, api_key)?),
        LlmProvider::OpenAI => Arc::new(OpenAiCollaborator::new(config, api_key)?),
    };
    Ok(collaborator)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
