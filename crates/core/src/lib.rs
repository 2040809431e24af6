//! # VentureLab Core
//!
//! The "Brain" of VentureLab - contains the research pipeline, prompt
//! composition, response validation, and the AI collaborator plumbing.
//!
//! ## Architecture
//!
//! - `models` - LLM provider configuration
//! - `llm/` - The `AiCollaborator` seam and its providers
//! - `skills/` - Stage skills, prompt composer, executor, validator
//! - `pipeline/` - Stage topology, session state, orchestrator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use venturelab_core::models::{create_collaborator, ModelConfig};
//! use venturelab_core::pipeline::{Orchestrator, OrchestratorConfig, StageRequest};
//!
//! let collaborator = create_collaborator(&ModelConfig::from_env()?)?;
//! let orchestrator = Orchestrator::new(collaborator, OrchestratorConfig::default());
//! let trends = orchestrator.run_stage(StageRequest::trend("pet tech")).await?;
//! ```

pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod skills;
