//! # Blueprint Skill
//!
//! Stage 4. Turns the full chain of research into an implementation plan:
//! features, stack, roadmap, risks, and ethics.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A feature of the proposed product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoreFeature {
    /// Name of the feature.
    pub feature: String,
    /// What the feature does.
    pub description: String,
    /// Which researched pain point this feature solves.
    pub user_problem_solved: String,
}

/// One recommended technology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TechChoice {
    /// One of 'Frontend', 'Backend', 'Database', 'AI / ML Model', 'Deployment'.
    pub category: String,
    /// The recommended tool, framework, or service.
    pub tool: String,
    /// Why this tool fits the product and the team.
    pub justification: String,
}

/// A phase of the roadmap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapPhase {
    /// Name of the phase (e.g., 'Phase 1: MVP').
    pub phase: String,
    /// Expected duration (e.g., '4-6 weeks').
    pub duration: String,
    /// Concrete milestones that close the phase.
    pub milestones: Vec<String>,
}

/// A risk and how to handle it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RiskMitigation {
    /// The risk.
    pub risk: String,
    /// How to reduce or absorb it.
    pub mitigation: String,
}

/// Output of the blueprint stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SolutionBlueprint {
    /// A short overview of the proposed digital product.
    pub solution_overview: String,
    /// The features of the first release, each tied to a researched pain point.
    pub core_features: Vec<CoreFeature>,
    /// The recommended technology stack.
    pub tech_stack: Vec<TechChoice>,
    /// Phased implementation plan.
    pub implementation_roadmap: Vec<RoadmapPhase>,
    /// Main risks with mitigations.
    pub risks_and_mitigations: Vec<RiskMitigation>,
    /// Ethical considerations the team must address.
    pub ethical_considerations: String,
}

/// Stage directive tying the plan to the original area and industry
pub fn directive(area_of_interest: &str, industry: &str) -> String {
    format!(
        "Design an implementation blueprint for a digital product in the \"{industry}\" industry, \
         which emerged from research into \"{area_of_interest}\". \
         Use every finding below: solve the verified pain points, exploit the market gaps, \
         target the validated audience, and respect the red flags. \
         Search the web to confirm that the recommended tools are current."
    )
}
