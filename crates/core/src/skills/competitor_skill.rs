//! # Competitor Skill
//!
//! Stage 2. Dissects the top competitors solving a specific problem in an
//! industry and extracts exploitable market gaps.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A competing product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    /// The name of the competing product.
    pub name: String,
    /// Their unique selling proposition.
    pub usp: String,
    /// Price structure and market positioning.
    pub pricing: String,
    /// The key features they heavily focus on.
    pub key_features: String,
    /// What customers praise, based on reviews/testimonials.
    pub customer_likes: String,
    /// What they fall short of; common customer complaints.
    pub customer_complaints: String,
    /// Their content and marketing strategy.
    pub marketing_strategy: String,
    /// A numerical score from 1 to 100 representing how complete their feature set is for solving the target problem.
    pub feature_completeness: f64,
}

/// A gap left open by the competitors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarketGap {
    /// A concise summary of the market gap (e.g., 'Lack of a mobile-first solution', 'No entry-level pricing tier').
    pub gap: String,
    /// A detailed explanation of the gap, citing weaknesses in competitor offerings.
    pub description: String,
}

/// Output of the competitor analysis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorAnalysis {
    /// The top 5 competing products that solve the specified problem.
    pub competitors: Vec<Competitor>,
    /// 3 specific, actionable gaps in the market based on the competitor analysis.
    pub market_gaps: Vec<MarketGap>,
}

/// One bar of the feature-completeness chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessBar {
    pub name: String,
    pub completeness: f64,
}

impl CompetitorAnalysis {
    /// Chart data with scores clamped into the 0..=100 axis
    pub fn completeness_chart(&self) -> Vec<CompletenessBar> {
        self.competitors
            .iter()
            .map(|c| CompletenessBar {
                name: c.name.clone(),
                completeness: if c.feature_completeness.is_finite() {
                    c.feature_completeness.clamp(0.0, 100.0)
                } else {
                    0.0
                },
            })
            .collect()
    }
}

/// Stage directive for an industry and the problem the product targets
pub fn directive(industry: &str, problem: &str) -> String {
    format!(
        "You are a business analyst conducting competitor analysis for a digital product in the \"{industry}\" industry. \
         The product is meant to solve this specific problem: \"{problem}\". \
         Provide a strategic analysis, including a numerical 'featureCompleteness' score from 1-100 for each competitor. \
         Adhere strictly to the JSON schema."
    )
}
