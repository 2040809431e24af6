//! # Market Skill
//!
//! Stage 1. Verifies the market for an industry: recurring pain points,
//! why current solutions fall short, and who is underserved. Supports a
//! "deeper" re-run that asks for a more nuanced pass over the same industry.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Extra directive clause for the deeper re-run
pub const DEEPER_CLAUSE: &str = "Please perform a deeper, more nuanced analysis, uncovering subtle trends and less obvious pain points.";

/// A pain point people in the industry express online
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PainPoint {
    /// A concise summary of the pain point.
    pub point: String,
    /// A realistic, representative quote from a persona expressing this need.
    pub example_quote: String,
    /// The emotional toll or frustration this problem causes.
    pub emotional_impact: String,
    /// The current, often inefficient, method people use to solve this.
    pub workaround: String,
    /// The estimated time or money this problem costs the individual or business.
    pub cost: String,
}

/// Output of the market verification stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalysis {
    /// Top 5 pain points that people in the specified industry express online.
    pub pain_points: Vec<PainPoint>,
    /// An analysis of existing solutions, explaining why they are insufficient.
    pub insufficient_solutions: String,
    /// A specific audience segment that is most overlooked or underserved.
    pub undervalued_segment: String,
    /// A description of what an ideal digital product would look like for this audience.
    pub ideal_solution: String,
    /// Actionable steps to confirm the existence of this market gap before building.
    pub confirmation_methods: String,
}

impl MarketAnalysis {
    /// All the free text of the pain points, space separated, for keyword extraction
    pub fn pain_point_text(&self) -> String {
        self.pain_points
            .iter()
            .map(|p| {
                format!(
                    "{} {} {} {}",
                    p.point, p.example_quote, p.emotional_impact, p.workaround
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// One-line list of the pain point summaries
    pub fn problem_summary(&self) -> String {
        self.pain_points
            .iter()
            .map(|p| p.point.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Stage directive for an industry
pub fn directive(industry: &str, deeper: bool) -> String {
    let mut text = format!(
        "Analyze the market for the \"{industry}\" industry. \
         Provide a detailed report following the specified JSON format. \
         For each pain point, create a realistic, representative quote of someone expressing this need and present it in quote format."
    );
    if deeper {
        text.push(' ');
        text.push_str(DEEPER_CLAUSE);
    }
    text
}
